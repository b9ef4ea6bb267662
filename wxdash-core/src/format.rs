//! Display helpers shared by front ends.

pub const NO_DATA_MESSAGE: &str = "No information is available for this place.";

/// Round to whole degrees, e.g. `-0.4` becomes `0°` and `12.5` becomes `13°`.
pub fn format_temp_c(value: f64) -> String {
    let rounded = value.round();
    // Avoid printing "-0°".
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded}°")
}

/// `HH:00` from a `YYYY-MM-DDTHH:MM` timestamp, or the input if it is too short.
pub fn format_hour(iso: &str) -> String {
    match iso.get(11..13) {
        Some(hh) => format!("{hh}:00"),
        None => iso.to_string(),
    }
}

/// `lat, lon` with four decimals, used when no place name is known.
pub fn format_coordinates(lat: f64, lon: f64) -> String {
    format!("{lat:.4}, {lon:.4}")
}
