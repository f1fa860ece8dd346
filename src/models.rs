use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Boolean that also accepts `0`/`1`, `"0"`/`"1"` and `null`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(value)) => value,
        Some(Flag::Int(value)) => value != 0,
        Some(Flag::Text(value)) => matches!(value.as_str(), "1" | "true"),
    })
}

/// Which side of the board a listing belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum ListingKind {
    /// Someone lost the item and is looking for it.
    #[default]
    #[serde(rename = "i_looking_for")]
    #[value(name = "seeking")]
    Seeking,
    /// Someone found the item and is looking for the owner.
    #[serde(rename = "i_find")]
    #[value(name = "found")]
    Found,
}

impl ListingKind {
    pub const ALL: [ListingKind; 2] = [ListingKind::Seeking, ListingKind::Found];

    pub fn label(self) -> &'static str {
        match self {
            ListingKind::Seeking => "Seeking",
            ListingKind::Found => "Found",
        }
    }

    /// Value used for the `type` field on the wire.
    pub fn as_param(self) -> &'static str {
        match self {
            ListingKind::Seeking => "i_looking_for",
            ListingKind::Found => "i_find",
        }
    }

    pub fn other(self) -> Self {
        match self {
            ListingKind::Seeking => ListingKind::Found,
            ListingKind::Found => ListingKind::Seeking,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecencyWindow {
    Week,
    Month,
}

impl RecencyWindow {
    pub fn label(self) -> &'static str {
        match self {
            RecencyWindow::Week => "last week",
            RecencyWindow::Month => "last month",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
}

/// Everything the listing query can be narrowed by.
///
/// Equality is structural: two filters are equal when every field is equal,
/// which is what favorite-filter reconciliation relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: ListingKind,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(rename = "action_at_from", default)]
    pub date_from: Option<NaiveDate>,
    #[serde(rename = "action_at_to", default)]
    pub date_to: Option<NaiveDate>,
    #[serde(rename = "last", default)]
    pub recency: Option<RecencyWindow>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub q: String,
    #[serde(rename = "withPhoto", default, deserialize_with = "flag")]
    pub with_photo: bool,
    #[serde(rename = "withBody", default, deserialize_with = "flag")]
    pub with_body: bool,
}

impl ListingFilter {
    pub fn for_kind(kind: ListingKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Short human labels for every narrowing currently applied.
    pub fn chips(&self) -> Vec<String> {
        let mut chips = Vec::new();
        if let Some(category) = &self.category {
            chips.push(category.name.clone());
        }
        if let Some(location) = &self.location {
            chips.push(location.name.clone());
        }
        if let Some(from) = self.date_from {
            chips.push(format!("from {}", from.format("%d.%m.%Y")));
        }
        if let Some(to) = self.date_to {
            chips.push(format!("to {}", to.format("%d.%m.%Y")));
        }
        if let Some(recency) = self.recency {
            chips.push(recency.label().to_string());
        }
        if self.with_body {
            chips.push("with description".to_string());
        }
        if self.with_photo {
            chips.push("with photo".to_string());
        }
        chips
    }
}

/// Query parameters of the listing endpoint. References are flattened to ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListParams {
    #[serde(rename = "type")]
    pub kind: ListingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_at_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_at_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<RecencyWindow>,
    pub q: String,
    #[serde(rename = "withPhoto", skip_serializing_if = "is_false")]
    pub with_photo: bool,
    #[serde(rename = "withBody", skip_serializing_if = "is_false")]
    pub with_body: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ListParams {
    /// The first page is requested without an explicit page number.
    pub fn from_filter(filter: &ListingFilter, page: u32) -> Self {
        Self {
            kind: filter.kind,
            category: filter.category.as_ref().map(|c| c.id),
            location: filter.location.as_ref().map(|l| l.id),
            action_at_from: filter.date_from,
            action_at_to: filter.date_to,
            last: filter.recency,
            q: filter.q.clone(),
            with_photo: filter.with_photo,
            with_body: filter.with_body,
            page: (page > 1).then_some(page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub action_at: Option<String>, // as sent by the server, displayed verbatim
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "flag")]
    pub for_remuneration: bool,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: ListingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub data: Vec<Item>,
    pub meta: PageMeta,
}

/// One fetched page of listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub page: u32,
    pub items: Vec<Item>,
    pub has_more_pages: bool,
}

impl From<ListResponse> for ListingPage {
    fn from(response: ListResponse) -> Self {
        Self {
            page: response.meta.current_page,
            has_more_pages: response.meta.current_page < response.meta.last_page,
            items: response.data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteFilter {
    pub id: i64,
    #[serde(alias = "filter")]
    pub filters: ListingFilter,
}

/// Parameters the browse screen is entered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavParams {
    pub filters: Option<ListingFilter>,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub favorite_id: Option<i64>,
}

impl NavParams {
    pub fn from_favorite(favorite: FavoriteFilter) -> Self {
        Self {
            filters: Some(favorite.filters),
            favorite_id: Some(favorite.id),
            ..Self::default()
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys() -> Category {
        Category {
            id: 3,
            name: "Keys".to_string(),
        }
    }

    #[test]
    fn test_filter_equality_is_structural() {
        let a = ListingFilter {
            category: Some(keys()),
            q: "blue".to_string(),
            ..ListingFilter::for_kind(ListingKind::Found)
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.with_photo = true;
        assert_ne!(a, b);

        // same id, different display name is still a different snapshot
        let mut c = a.clone();
        c.category = Some(Category {
            id: 3,
            name: "Keychains".to_string(),
        });
        assert_ne!(a, c);
    }

    #[test]
    fn test_filter_equality_ignores_json_key_order() {
        let a: ListingFilter = serde_json::from_str(
            r#"{"type":"i_find","q":"wallet","category":{"id":3,"name":"Keys"},"withPhoto":true}"#,
        )
        .unwrap();
        let b: ListingFilter = serde_json::from_str(
            r#"{"withPhoto":true,"category":{"name":"Keys","id":3},"q":"wallet","type":"i_find"}"#,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_list_params_flatten_refs_to_ids() {
        let filter = ListingFilter {
            category: Some(keys()),
            location: Some(Location {
                id: 9,
                name: "Lviv".to_string(),
            }),
            recency: Some(RecencyWindow::Week),
            q: "phone".to_string(),
            ..ListingFilter::for_kind(ListingKind::Seeking)
        };

        let params = ListParams::from_filter(&filter, 1);
        assert_eq!(params.category, Some(3));
        assert_eq!(params.location, Some(9));
        assert_eq!(params.page, None);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "i_looking_for",
                "category": 3,
                "location": 9,
                "last": "week",
                "q": "phone",
            })
        );

        let params = ListParams::from_filter(&filter, 4);
        assert_eq!(params.page, Some(4));
    }

    #[test]
    fn test_listing_page_has_more_from_meta() {
        let page: ListingPage = ListResponse {
            data: vec![],
            meta: PageMeta {
                current_page: 2,
                last_page: 2,
            },
        }
        .into();
        assert!(!page.has_more_pages);

        let page: ListingPage = ListResponse {
            data: vec![],
            meta: PageMeta {
                current_page: 1,
                last_page: 2,
            },
        }
        .into();
        assert!(page.has_more_pages);
    }

    #[test]
    fn test_item_tolerates_missing_optional_fields() {
        let item: Item = serde_json::from_str(r#"{"id":1,"name":"Umbrella","type":"i_find"}"#).unwrap();
        assert_eq!(item.kind, ListingKind::Found);
        assert!(item.photos.is_empty());
        assert!(!item.for_remuneration);
    }

    #[test]
    fn test_saved_filter_with_cleared_fields_decodes() {
        let saved: FavoriteFilter = serde_json::from_str(
            r#"{"id":5,"filters":{"type":null,"q":null,"category":null,"location":null,
                "action_at_from":null,"action_at_to":null,"last":null,"withPhoto":null,"withBody":null}}"#,
        )
        .unwrap();
        assert_eq!(saved.id, 5);
        assert_eq!(saved.filters, ListingFilter::default());

        let saved: FavoriteFilter = serde_json::from_str(
            r#"{"id":6,"filter":{"type":"i_find","q":"bag","withPhoto":1,"withBody":"0"}}"#,
        )
        .unwrap();
        assert_eq!(saved.filters.kind, ListingKind::Found);
        assert!(saved.filters.with_photo);
        assert!(!saved.filters.with_body);
    }

    #[test]
    fn test_item_accepts_integer_flags_and_null_lists() {
        let item: Item = serde_json::from_str(
            r#"{"id":2,"name":"Scarf","type":null,"photos":null,"for_remuneration":1}"#,
        )
        .unwrap();
        assert_eq!(item.kind, ListingKind::Seeking);
        assert!(item.photos.is_empty());
        assert!(item.for_remuneration);

        let item: Item = serde_json::from_str(r#"{"id":3,"name":"Ring","for_remuneration":0}"#).unwrap();
        assert!(!item.for_remuneration);
    }

    #[test]
    fn test_chips_list_applied_narrowings() {
        let filter = ListingFilter {
            category: Some(keys()),
            date_from: NaiveDate::from_ymd_opt(2024, 5, 1),
            recency: Some(RecencyWindow::Month),
            with_photo: true,
            ..ListingFilter::default()
        };
        assert_eq!(
            filter.chips(),
            vec!["Keys", "from 01.05.2024", "last month", "with photo"]
        );
    }
}
