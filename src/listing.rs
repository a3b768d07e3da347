//! Listing records read from the document store.
//!
//! Documents arrive as loosely-shaped JSON. [`Listing::from_document`] is the
//! single boundary where they become typed records: shape errors surface as
//! [`ListingError::Malformed`], rule violations as [`ListingError::Invalid`].
//! Nothing downstream casts raw JSON.
//!
//! Field names follow the store's camelCase (`imagePaths`, `createdAt`).
//! Older listings carry a single `photo` file name instead of `imagePaths`.
//! That file lives under [`LEGACY_PHOTO_PREFIX`]; [`Listing::image_keys`]
//! resolves both forms to object keys.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Oldest model year accepted for a listing.
pub const MIN_YEAR: i32 = 1900;

/// Directory holding photos referenced by the legacy `photo` field.
pub const LEGACY_PHOTO_PREFIX: &str = "images";

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Malformed listing document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Listing document without an id")]
    MissingId,
    #[error("Invalid listing {id}: {reason}")]
    Invalid { id: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
    #[serde(other)]
    Other,
}

/// A car listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Document id. Lives outside the document body in the store.
    #[serde(default)]
    pub id: String,
    /// Owner's user id
    pub uid: String,
    pub name: String,
    /// Asking price in rupees
    pub price: f64,
    pub year: i32,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub tel: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub featured: bool,
    /// Object keys of uploaded photos, in display order.
    #[serde(default)]
    pub image_paths: Vec<String>,
    /// Single photo file name used by older listings, relative to
    /// [`LEGACY_PHOTO_PREFIX`].
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub views: u64,
    /// RFC 3339 timestamp; anything else is a malformed document.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Parse and validate one document body.
    pub fn from_document(id: &str, document: Value) -> Result<Self, ListingError> {
        let mut listing: Listing = serde_json::from_value(document)?;
        listing.id = id.to_string();
        listing.validate(current_year())?;
        Ok(listing)
    }

    /// Check listing rules. `current_year` bounds the model year (+1 for
    /// next year's models).
    pub fn validate(&self, current_year: i32) -> Result<(), ListingError> {
        let invalid = |reason: String| ListingError::Invalid {
            id: self.id.clone(),
            reason,
        };
        if self.uid.trim().is_empty() {
            return Err(invalid("missing owner uid".into()));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("missing name".into()));
        }
        if !(self.price.is_finite() && self.price >= 0.0) {
            return Err(invalid(format!("price {} is not a valid amount", self.price)));
        }
        let max_year = current_year + 1;
        if !(MIN_YEAR..=max_year).contains(&self.year) {
            return Err(invalid(format!(
                "year {} outside {}..={}",
                self.year, MIN_YEAR, max_year
            )));
        }
        Ok(())
    }

    /// Every object key this listing references: the legacy `photo` first,
    /// as `images/{photo}`, then `imagePaths` as stored. Empty entries and
    /// duplicates are dropped.
    pub fn image_keys(&self) -> Vec<String> {
        let legacy = self
            .photo
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| format!("{LEGACY_PHOTO_PREFIX}/{name}"));
        let mut keys: Vec<String> = Vec::new();
        for key in legacy.chain(self.image_paths.iter().cloned()) {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Parse an export of several documents.
///
/// Accepts either an object mapping id → document, or an array of documents
/// that each carry an `"id"` string.
pub fn listings_from_json(text: &str) -> Result<Vec<Listing>, ListingError> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(id, doc)| Listing::from_document(&id, doc))
            .collect(),
        Value::Array(docs) => docs
            .into_iter()
            .map(|doc| {
                let id = doc
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or(ListingError::MissingId)?;
                Listing::from_document(&id, doc)
            })
            .collect(),
        other => Err(ListingError::Malformed(serde::de::Error::custom(format!(
            "expected an object or array of listings, found {}",
            json_kind(&other)
        )))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Current calendar year (UTC).
pub fn current_year() -> i32 {
    Utc::now().year()
}
