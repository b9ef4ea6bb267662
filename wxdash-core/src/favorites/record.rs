use serde_json::Value;
use std::collections::HashSet;

use crate::model::FavoritePlace;

use super::FAVORITES_LIMIT;

/// Decode the durable record, dropping entries that are malformed or mistyped.
///
/// Anything that is not a JSON array decodes to an empty list. The result is
/// ordered by `created_at`, free of duplicate ids and capped at the limit.
pub fn decode(raw: &str) -> Vec<FavoritePlace> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Ignoring unreadable favorites record: {}", e);
            return Vec::new();
        }
    };

    let Value::Array(entries) = parsed else {
        tracing::warn!("Ignoring favorites record that is not an array");
        return Vec::new();
    };

    let mut out: Vec<FavoritePlace> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<FavoritePlace>(entry) {
            Ok(fav) if fav.lat.is_finite() && fav.lon.is_finite() => Some(fav),
            Ok(fav) => {
                tracing::warn!("Dropping favorite {} with non-finite coordinates", fav.id);
                None
            }
            Err(e) => {
                tracing::warn!("Dropping malformed favorite: {}", e);
                None
            }
        })
        .collect();

    out.sort_by_key(|f| f.created_at);

    let mut seen = HashSet::new();
    out.retain(|f| seen.insert(f.id.clone()));
    out.truncate(FAVORITES_LIMIT);
    out
}

pub fn encode(items: &[FavoritePlace]) -> serde_json::Result<String> {
    let capped = &items[..items.len().min(FAVORITES_LIMIT)];
    serde_json::to_string(capped)
}
