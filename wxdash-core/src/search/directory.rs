//! In-memory place-name directory and autocomplete.
//!
//! Raw entries separate administrative levels with `-`
//! (`서울특별시-강남구-역삼동`); labels show them space-separated.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::{fs, path::Path, sync::OnceLock};

pub const MIN_QUERY_CHARS: usize = 2;
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

const BUNDLED: &str = include_str!("../../data/korea_districts.json");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub raw: String,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct PlaceDirectory {
    entries: Vec<String>,
}

/// Lowercase and strip whitespace and `-` so `"강남 구"` matches `"강남구"`.
pub fn normalize_for_search(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn label_from_raw(raw: &str) -> String {
    raw.replace('-', " ")
}

impl PlaceDirectory {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// The directory shipped with the crate, parsed once per process.
    pub fn bundled() -> &'static PlaceDirectory {
        static DIRECTORY: OnceLock<PlaceDirectory> = OnceLock::new();
        DIRECTORY.get_or_init(|| Self::from_json(BUNDLED).unwrap_or_default())
    }

    /// Load a JSON array of names; non-string entries are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read place directory: {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse place directory: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let Value::Array(items) = serde_json::from_str::<Value>(json)? else {
            return Err(anyhow!("place directory must be a JSON array"));
        };

        let entries = items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose normalized label contains the normalized query.
    ///
    /// Ranked by match position, then label length (both in characters); ties
    /// keep directory order. Queries under two characters match nothing.
    pub fn autocomplete(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }
        let needle = normalize_for_search(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(usize, usize, Suggestion)> = self
            .entries
            .iter()
            .filter_map(|raw| {
                let label = label_from_raw(raw);
                let haystack = normalize_for_search(&label);
                let byte_idx = haystack.find(&needle)?;
                let position = haystack[..byte_idx].chars().count();
                let length = label.chars().count();
                Some((
                    position,
                    length,
                    Suggestion {
                        raw: raw.clone(),
                        label,
                    },
                ))
            })
            .collect();

        hits.sort_by_key(|(position, length, _)| (*position, *length));
        hits.into_iter().take(limit).map(|(_, _, s)| s).collect()
    }
}
