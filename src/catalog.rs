use anyhow::{Result, anyhow};

use crate::api::{ApiClient, Transport};
use crate::error::ApiError;
use crate::models::{Category, Location};

/// Minimum Jaro-Winkler similarity for a typo to still count as a match.
pub const MATCH_THRESHOLD: f64 = 0.85;

pub trait Named {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

impl Named for Category {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Location {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive exact match first, then the closest name above the threshold.
pub fn resolve<'a, T: Named>(entries: &'a [T], query: &str) -> Option<&'a T> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some(exact) = entries.iter().find(|e| e.name().to_lowercase() == needle) {
        return Some(exact);
    }

    entries
        .iter()
        .map(|e| (e, strsim::jaro_winkler(&needle, &e.name().to_lowercase())))
        .filter(|(_, score)| *score >= MATCH_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(e, _)| e)
}

/// Entries whose name contains `query`, in catalog order. With no substring
/// hit, falls back to the closest fuzzy match.
pub fn search<'a, T: Named>(entries: &'a [T], query: &str) -> Vec<&'a T> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return entries.iter().collect();
    }
    let hits: Vec<&T> = entries
        .iter()
        .filter(|e| e.name().to_lowercase().contains(&needle))
        .collect();
    if hits.is_empty() {
        resolve(entries, query).into_iter().collect()
    } else {
        hits
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
}

impl Catalog {
    pub fn fetch<T: Transport>(api: &ApiClient<T>) -> Result<Self, ApiError> {
        let categories = api.categories()?;
        let locations = api.locations()?;
        tracing::debug!("Loaded {} categories, {} locations", categories.len(), locations.len());
        Ok(Self { categories, locations })
    }

    pub fn category(&self, name: &str) -> Result<&Category> {
        resolve(&self.categories, name).ok_or_else(|| unknown("category", name, &self.categories))
    }

    pub fn location(&self, name: &str) -> Result<&Location> {
        resolve(&self.locations, name).ok_or_else(|| unknown("location", name, &self.locations))
    }
}

fn unknown<T: Named>(what: &str, name: &str, entries: &[T]) -> anyhow::Error {
    let available: Vec<&str> = entries.iter().map(Named::name).collect();
    anyhow!("Unknown {} '{}'. Available: {}", what, name, available.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        ["Keys", "Documents", "Pets", "Phones"]
            .iter()
            .enumerate()
            .map(|(i, name)| Category {
                id: i as i64 + 1,
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_resolve_exact_ignores_case() {
        let cats = categories();
        assert_eq!(resolve(&cats, "  pets ").unwrap().id, 3);
    }

    #[test]
    fn test_resolve_tolerates_typo() {
        let cats = categories();
        assert_eq!(resolve(&cats, "kyes").unwrap().name, "Keys");
        assert_eq!(resolve(&cats, "documnets").unwrap().name, "Documents");
    }

    #[test]
    fn test_resolve_rejects_distant_names() {
        let cats = categories();
        assert!(resolve(&cats, "umbrella").is_none());
        assert!(resolve(&cats, "").is_none());
    }

    #[test]
    fn test_search_by_substring_then_fuzzy() {
        let cats = categories();
        let names = |hits: Vec<&Category>| hits.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(search(&cats, "").len(), 4);
        assert_eq!(names(search(&cats, "p")), vec!["Pets", "Phones"]);
        assert_eq!(names(search(&cats, "kyes")), vec!["Keys"]);
        assert!(search(&cats, "umbrella").is_empty());
    }

    #[test]
    fn test_unknown_lists_available_names() {
        let catalog = Catalog {
            categories: categories(),
            locations: vec![],
        };
        let err = catalog.category("bicycle").unwrap_err().to_string();
        assert!(err.contains("Unknown category 'bicycle'"));
        assert!(err.contains("Keys, Documents, Pets, Phones"));
    }
}
