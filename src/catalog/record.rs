//! Event records as supplied by a catalog source.
//!
//! Field names on the wire follow the catalog's JSON shape (`_id`,
//! `startDateTime`, `isFree`, ...) so exported catalog dumps load as-is.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Category reference carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// Person organising an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organizer {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Organizer {
    /// "First Last", trimmed when either part is missing.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// One event as the catalog knows it at pull time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Stable, unique identifier
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(
        rename = "startDateTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<NaiveDateTime>,

    #[serde(
        rename = "endDateTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<NaiveDateTime>,

    #[serde(default)]
    pub is_free: bool,

    /// Display price, e.g. "50" or "TBD"
    #[serde(default)]
    pub price: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub image_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Organizer>,

    /// Owning user for private events; `None` means visible to everyone
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl EventRecord {
    /// Minimal record with only the required fields set.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            location: String::new(),
            category: None,
            start_time: None,
            end_time: None,
            is_free: false,
            price: String::new(),
            tags: Vec::new(),
            url: String::new(),
            image_url: String::new(),
            created_at: None,
            organizer: None,
            owner: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_category(mut self, name: impl Into<String>) -> Self {
        self.category = Some(Category {
            id: None,
            name: name.into(),
        });
        self
    }

    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_free(mut self, is_free: bool) -> Self {
        self.is_free = is_free;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Category name, or "" when the event is uncategorised.
    pub fn category_name(&self) -> &str {
        self.category.as_ref().map_or("", |c| c.name.as_str())
    }

    /// Organizer display name, or "" when unknown.
    pub fn organizer_name(&self) -> String {
        self.organizer
            .as_ref()
            .map(Organizer::display_name)
            .unwrap_or_default()
    }

    /// Text fed to the encoder for this record.
    ///
    /// Fields are always rendered in the same order so the same record
    /// produces the same embedding across refreshes.
    pub fn document_text(&self) -> String {
        let fmt_time =
            |t: &Option<NaiveDateTime>| t.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string());

        format!(
            "Title: {}. Description: {}. Category: {}. Location: {}. Tags: {}. Organizer: {}. Start: {}. End: {}. Price: {}. Free: {}. URL: {}",
            self.title,
            self.description,
            self.category_name(),
            self.location,
            self.tags.join(", "),
            self.organizer_name(),
            fmt_time(&self.start_time).unwrap_or_default(),
            fmt_time(&self.end_time).unwrap_or_default(),
            self.price,
            if self.is_free { "Yes" } else { "No" },
            self.url,
        )
    }
}
