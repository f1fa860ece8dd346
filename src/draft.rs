use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use crate::api::Part;
use crate::models::{Category, ListingKind, Location};

const PHOTO_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "heic"];

// 10-digit local number, optionally with the country code in front
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+?38)?(0\d{9})$").expect("valid phone pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("name is required")]
    MissingName,
    #[error("date is required")]
    MissingDate,
    #[error("date {0} is in the future")]
    FutureDate(NaiveDate),
    #[error("'{0}' is not a valid phone number (expected 0XX XXX XX XX)")]
    InvalidPhone(String),
    #[error("category is required")]
    MissingCategory,
    #[error("location is required")]
    MissingLocation,
    #[error("photo not found: {}", .0.display())]
    MissingPhoto(PathBuf),
    #[error("unsupported photo format: {} (use jpg, png or heic)", .0.display())]
    UnsupportedPhoto(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoDraft {
    pub path: PathBuf,
    pub cover: bool,
}

/// The item posting form. Photos keep exactly one cover while non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub kind: ListingKind,
    pub name: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub for_remuneration: bool,
    pub phone: String,
    pub category: Option<Category>,
    pub location: Option<Location>,
    photos: Vec<PhotoDraft>,
}

impl ItemDraft {
    pub fn new(kind: ListingKind) -> Self {
        Self {
            kind,
            name: String::new(),
            description: String::new(),
            date: None,
            for_remuneration: false,
            phone: String::new(),
            category: None,
            location: None,
            photos: Vec::new(),
        }
    }

    pub fn photos(&self) -> &[PhotoDraft] {
        &self.photos
    }

    pub fn add_photo(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.photos.iter().any(|p| p.path == path) {
            return;
        }
        let cover = self.photos.is_empty();
        self.photos.push(PhotoDraft { path, cover });
    }

    /// Returns false when the photo is not part of the draft.
    pub fn set_cover(&mut self, path: &Path) -> bool {
        if !self.photos.iter().any(|p| p.path == path) {
            return false;
        }
        for photo in &mut self.photos {
            photo.cover = photo.path == path;
        }
        true
    }

    pub fn remove_photo(&mut self, path: &Path) {
        let was_cover = self.photos.iter().any(|p| p.path == path && p.cover);
        self.photos.retain(|p| p.path != path);
        if was_cover {
            if let Some(first) = self.photos.first_mut() {
                first.cover = true;
            }
        }
    }

    /// Checks every field and reports all problems at once.
    pub fn validate(&self, today: NaiveDate) -> Result<NewItem, Vec<DraftError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(DraftError::MissingName);
        }

        match self.date {
            None => errors.push(DraftError::MissingDate),
            Some(date) if date > today => errors.push(DraftError::FutureDate(date)),
            Some(_) => {}
        }

        let phone = normalize_phone(&self.phone);
        if phone.is_none() {
            errors.push(DraftError::InvalidPhone(self.phone.clone()));
        }

        if self.category.is_none() {
            errors.push(DraftError::MissingCategory);
        }
        if self.location.is_none() {
            errors.push(DraftError::MissingLocation);
        }

        for photo in &self.photos {
            if !photo.path.is_file() {
                errors.push(DraftError::MissingPhoto(photo.path.clone()));
            } else if !has_photo_extension(&photo.path) {
                errors.push(DraftError::UnsupportedPhoto(photo.path.clone()));
            }
        }

        let (Some(date), Some(phone), Some(category), Some(location)) =
            (self.date, phone, self.category.as_ref(), self.location.as_ref())
        else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        let description = self.description.trim();
        Ok(NewItem {
            kind: self.kind,
            name: name.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            date,
            phone,
            for_remuneration: self.for_remuneration,
            category_id: category.id,
            location_id: location.id,
            cover: self.photos.iter().position(|p| p.cover),
            photos: self.photos.iter().map(|p| p.path.clone()).collect(),
        })
    }
}

/// Strips separators and returns the 10-digit local form, or `None` if the
/// number does not look like one.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '_'))
        .collect();
    PHONE_RE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn has_photo_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PHOTO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A validated draft, ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub kind: ListingKind,
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub phone: String,
    pub for_remuneration: bool,
    pub category_id: i64,
    pub location_id: i64,
    pub photos: Vec<PathBuf>,
    pub cover: Option<usize>,
}

impl NewItem {
    pub fn to_parts(&self) -> Vec<Part> {
        let text = |name: &str, value: String| Part::Text {
            name: name.to_string(),
            value,
        };

        let mut parts = vec![
            text("type", self.kind.as_param().to_string()),
            text("name", self.name.clone()),
            text("action_at", self.date.format("%Y-%m-%d").to_string()),
            text("phone", self.phone.clone()),
            text("for_remuneration", (if self.for_remuneration { "1" } else { "0" }).to_string()),
            text("category", self.category_id.to_string()),
            text("location", self.location_id.to_string()),
        ];
        if let Some(description) = &self.description {
            parts.push(text("description", description.clone()));
        }
        for path in &self.photos {
            parts.push(Part::File {
                name: "photos[]".to_string(),
                path: path.clone(),
            });
        }
        if let Some(cover) = self.cover {
            parts.push(text("cover", cover.to_string()));
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn filled() -> ItemDraft {
        let mut draft = ItemDraft::new(ListingKind::Found);
        draft.name = "  Black backpack ".to_string();
        draft.date = NaiveDate::from_ymd_opt(2024, 6, 14);
        draft.phone = "050 123 45 67".to_string();
        draft.category = Some(Category {
            id: 4,
            name: "Bags".to_string(),
        });
        draft.location = Some(Location {
            id: 8,
            name: "Odesa".to_string(),
        });
        draft
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("050 123 45 67").as_deref(), Some("0501234567"));
        assert_eq!(normalize_phone("+38 (067) 000-11-22").as_deref(), Some("0670001122"));
        assert_eq!(normalize_phone("380931112233").as_deref(), Some("0931112233"));
        assert_eq!(normalize_phone("___ ___ __ __"), None);
        assert_eq!(normalize_phone("12345"), None);
    }

    #[test]
    fn test_validate_ok() {
        let item = filled().validate(today()).unwrap();
        assert_eq!(item.name, "Black backpack");
        assert_eq!(item.phone, "0501234567");
        assert_eq!(item.description, None);
        assert_eq!(item.category_id, 4);
        assert_eq!(item.cover, None);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut draft = ItemDraft::new(ListingKind::Seeking);
        draft.date = NaiveDate::from_ymd_opt(2024, 7, 1);
        draft.phone = "123".to_string();

        let errors = draft.validate(today()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                DraftError::MissingName,
                DraftError::FutureDate(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()),
                DraftError::InvalidPhone("123".to_string()),
                DraftError::MissingCategory,
                DraftError::MissingLocation,
            ]
        );
    }

    #[test]
    fn test_cover_follows_first_photo_and_removal() {
        let mut draft = filled();
        draft.add_photo("a.jpg");
        draft.add_photo("b.png");
        draft.add_photo("a.jpg");
        assert_eq!(draft.photos().len(), 2);
        assert!(draft.photos()[0].cover);

        assert!(draft.set_cover(Path::new("b.png")));
        assert!(!draft.photos()[0].cover);
        assert!(draft.photos()[1].cover);
        assert!(!draft.set_cover(Path::new("missing.jpg")));

        draft.remove_photo(Path::new("b.png"));
        assert_eq!(draft.photos().len(), 1);
        assert!(draft.photos()[0].cover);
    }

    #[test]
    fn test_photos_must_exist_with_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("wallet.JPG");
        let odd = dir.path().join("wallet.gif");
        std::fs::write(&good, b"jpg").unwrap();
        std::fs::write(&odd, b"gif").unwrap();
        let missing = dir.path().join("gone.png");

        let mut draft = filled();
        draft.add_photo(&good);
        draft.add_photo(&odd);
        draft.add_photo(&missing);
        let errors = draft.validate(today()).unwrap_err();
        assert_eq!(
            errors,
            vec![DraftError::UnsupportedPhoto(odd.clone()), DraftError::MissingPhoto(missing.clone())]
        );

        draft.remove_photo(&odd);
        draft.remove_photo(&missing);
        let item = draft.validate(today()).unwrap();
        assert_eq!(item.photos, vec![good]);
        assert_eq!(item.cover, Some(0));
    }

    #[test]
    fn test_parts_carry_ids_and_files() {
        let mut draft = filled();
        draft.description = "Near the fountain".to_string();
        draft.for_remuneration = true;
        let item = draft.validate(today()).unwrap();
        let parts = item.to_parts();

        let value = |key: &str| {
            parts.iter().find_map(|p| match p {
                Part::Text { name, value } if name == key => Some(value.clone()),
                _ => None,
            })
        };
        assert_eq!(value("type").as_deref(), Some("i_find"));
        assert_eq!(value("action_at").as_deref(), Some("2024-06-14"));
        assert_eq!(value("for_remuneration").as_deref(), Some("1"));
        assert_eq!(value("category").as_deref(), Some("4"));
        assert_eq!(value("description").as_deref(), Some("Near the fountain"));
        assert_eq!(value("cover"), None);
    }
}
