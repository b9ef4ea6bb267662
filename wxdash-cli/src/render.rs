//! Terminal rendering of views and lists.

use chrono::Local;
use wxdash_core::{
    FavoriteError, FavoritePlace, FavoriteWeatherSummary, Suggestion, WeatherError, WeatherView,
    format::{NO_DATA_MESSAGE, format_coordinates, format_hour, format_temp_c},
};

const BAR_WIDTH: f64 = 30.0;

pub fn weather(view: &WeatherView) {
    println!("{}", view.place_name);
    println!(
        "  now {}   min {}   max {}",
        format_temp_c(view.temp_now_c),
        format_temp_c(view.temp_min_today_c),
        format_temp_c(view.temp_max_today_c),
    );
    println!();

    let lo = view
        .hourly_today
        .iter()
        .map(|p| p.temp_c)
        .fold(f64::INFINITY, f64::min);
    let hi = view
        .hourly_today
        .iter()
        .map(|p| p.temp_c)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = (hi - lo).max(1.0);

    for point in &view.hourly_today {
        let width = (((point.temp_c - lo) / span) * BAR_WIDTH).round() as usize + 1;
        println!(
            "  {}  {:>5}  {}",
            format_hour(&point.time),
            format_temp_c(point.temp_c),
            "▇".repeat(width)
        );
    }
}

/// Failed fetches degrade to a "no data" panel instead of an error exit.
pub fn weather_unavailable(title: &str, err: &WeatherError) {
    println!("{title}");
    println!("  {NO_DATA_MESSAGE}");
    println!("  {}", err.user_message());
    tracing::debug!("Weather unavailable for {}: {}", title, err);
}

pub fn suggestions(list: &[Suggestion]) {
    if list.is_empty() {
        println!("No matching places.");
        return;
    }
    for (i, s) in list.iter().enumerate() {
        println!("{:>3}. {}", i + 1, s.label);
    }
}

pub fn favorites(items: &[(FavoritePlace, Option<FavoriteWeatherSummary>)], limit: usize) {
    if items.is_empty() {
        println!("No favorites yet. Save one with `wxdash search <place> --save`.");
        return;
    }

    println!("Favorites ({}/{limit})", items.len());
    for (fav, summary) in items {
        let weather = match summary {
            Some(FavoriteWeatherSummary::Success {
                temp_now_c,
                temp_min_today_c,
                temp_max_today_c,
            }) => format!(
                "{} ({} / {})",
                format_temp_c(*temp_now_c),
                format_temp_c(*temp_min_today_c),
                format_temp_c(*temp_max_today_c)
            ),
            Some(FavoriteWeatherSummary::Error { .. }) => "no data".to_string(),
            None => String::new(),
        };
        println!(
            "  {:<22} {:<24} {:<18} saved {}",
            fav.id,
            fav.place_name,
            weather,
            fav.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        );
    }
}

pub fn favorite_rejected(err: FavoriteError) {
    println!("{} ({})", err.user_message(), err.reason());
}

pub fn coordinates(lat: f64, lon: f64) -> String {
    format_coordinates(lat, lon)
}
