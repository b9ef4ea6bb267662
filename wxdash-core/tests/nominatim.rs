//! Integration tests for the Nominatim geocoder using wiremock.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxdash_core::{
    Coordinates, Geocoder, NominatimGeocoder, PlaceDirectory, PlaceSearch, config::GeocoderConfig,
};

fn geocoder(server: &MockServer) -> NominatimGeocoder {
    NominatimGeocoder::new(&GeocoderConfig {
        base_url: server.uri(),
        ..GeocoderConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn reverse_builds_area_and_street_label() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "37.5006"))
        .and(query_param("lon", "127.0364"))
        .and(query_param("zoom", "18"))
        .and(query_param("addressdetails", "1"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display_name": "152, 테헤란로, 역삼동, 강남구, 서울특별시, 대한민국",
            "address": {
                "road": "테헤란로",
                "house_number": "152",
                "borough": "강남구",
                "neighbourhood": "역삼동",
                "city": "서울특별시",
                "country": "대한민국"
            }
        })))
        .mount(&server)
        .await;

    let name = geocoder(&server).reverse(Coordinates::new(37.5006, 127.0364)).await;
    assert_eq!(name.as_deref(), Some("서울특별시 강남구 역삼동 테헤란로 152"));
}

#[tokio::test]
async fn reverse_falls_back_to_display_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display_name": "  Somewhere at sea  ",
            "address": {}
        })))
        .mount(&server)
        .await;

    let name = geocoder(&server).reverse(Coordinates::new(0.0, 0.0)).await;
    assert_eq!(name.as_deref(), Some("Somewhere at sea"));
}

#[tokio::test]
async fn reverse_failure_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_eq!(geocoder(&server).reverse(Coordinates::new(1.0, 1.0)).await, None);
}

#[tokio::test]
async fn forward_parses_first_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "대한민국 부산광역시 해운대구"))
        .and(query_param("limit", "1"))
        .and(query_param("countrycodes", "kr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "lat": "35.1631", "lon": "129.1636", "display_name": "해운대구, 부산광역시" },
            { "lat": "0", "lon": "0" }
        ])))
        .mount(&server)
        .await;

    let hit = geocoder(&server).forward("대한민국 부산광역시 해운대구").await.unwrap();
    assert_eq!(hit.coords, Coordinates::new(35.1631, 129.1636));
    assert_eq!(hit.display_name.as_deref(), Some("해운대구, 부산광역시"));
}

#[tokio::test]
async fn forward_rejects_unusable_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lat": "north", "lon": "1" }])))
        .mount(&server)
        .await;

    let geocoder = geocoder(&server);
    assert!(geocoder.forward("empty").await.is_none());
    assert!(geocoder.forward("garbage").await.is_none());
    assert!(geocoder.forward("   ").await.is_none());
}

#[tokio::test]
async fn search_resolves_through_the_geocoder() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "대한민국 서울특별시 강남구"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "lat": "37.5172", "lon": "127.0473", "display_name": "강남구" }
        ])))
        .mount(&server)
        .await;

    let search = PlaceSearch::new(
        Arc::new(PlaceDirectory::bundled().clone()),
        Arc::new(geocoder(&server)),
        "대한민국",
    );

    let place = search.resolve("강남").await.unwrap();
    assert_eq!(place.place_name, "서울특별시 강남구");
    assert_eq!(place.lat, 37.5172);
}
