//! Turns a raw weather-provider payload into a [`WeatherView`].

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::{
    error::WeatherError,
    model::{HourlyTemperaturePoint, WeatherView},
};

pub const HOURS_PER_DAY: usize = 24;

/// Calendar date of `now` in `tz`.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// `YYYY-MM-DD`, the form the provider uses for dates.
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Validate and reshape a provider response for `today`.
///
/// Requires `current.temperature_2m`, `daily.temperature_2m_min[0]`,
/// `daily.temperature_2m_max[0]` as numbers and `hourly.time` /
/// `hourly.temperature_2m` as arrays. Hourly pairs outside `today` or with a
/// malformed field are dropped; exactly 24 must remain.
pub fn normalize(raw: &Value, today: NaiveDate, place_name: &str) -> Result<WeatherView, WeatherError> {
    let temp_now = number_at(raw, &["current", "temperature_2m"])
        .ok_or_else(|| missing("current.temperature_2m"))?;
    let min_today = first_number(raw, "temperature_2m_min")
        .ok_or_else(|| missing("daily.temperature_2m_min"))?;
    let max_today = first_number(raw, "temperature_2m_max")
        .ok_or_else(|| missing("daily.temperature_2m_max"))?;
    let hourly_time = array_at(raw, &["hourly", "time"]).ok_or_else(|| missing("hourly.time"))?;
    let hourly_temp = array_at(raw, &["hourly", "temperature_2m"])
        .ok_or_else(|| missing("hourly.temperature_2m"))?;

    let hourly_today = hourly_for_day(hourly_time, hourly_temp, today);
    if hourly_today.len() != HOURS_PER_DAY {
        return Err(WeatherError::HourlyIncomplete {
            found: hourly_today.len(),
        });
    }

    Ok(WeatherView {
        place_name: place_name.to_string(),
        temp_now_c: temp_now,
        temp_min_today_c: min_today,
        temp_max_today_c: max_today,
        hourly_today,
    })
}

/// Same-day points, ascending, at most 24.
///
/// Lexicographic order equals chronological order for same-day ISO timestamps.
fn hourly_for_day(times: &[Value], temps: &[Value], day: NaiveDate) -> Vec<HourlyTemperaturePoint> {
    let prefix = format!("{}T", iso_date(day));

    let mut points: Vec<HourlyTemperaturePoint> = times
        .iter()
        .zip(temps)
        .filter_map(|(time, temp)| {
            let time = time.as_str()?;
            let temp_c = temp.as_f64()?;
            time.starts_with(&prefix).then(|| HourlyTemperaturePoint {
                time: time.to_string(),
                temp_c,
            })
        })
        .collect();

    points.sort_by(|a, b| a.time.cmp(&b.time));
    points.truncate(HOURS_PER_DAY);
    points
}

fn missing(field: &str) -> WeatherError {
    WeatherError::DataMissing(format!("missing or mistyped `{field}`"))
}

fn value_at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |v, key| v.get(key))
}

fn number_at(raw: &Value, path: &[&str]) -> Option<f64> {
    value_at(raw, path)?.as_f64()
}

fn array_at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a [Value]> {
    value_at(raw, path)?.as_array().map(Vec::as_slice)
}

fn first_number(raw: &Value, daily_field: &str) -> Option<f64> {
    array_at(raw, &["daily", daily_field])?.first()?.as_f64()
}
