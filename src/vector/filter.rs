//! Metadata pre-filters applied before similarity ranking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::EventMetadata;

/// Constraints a snapshot entry must satisfy to be ranked at all.
///
/// Every field is optional; an empty filter admits every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Requesting user. When set, only global entries and entries owned by
    /// this user are visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free: Option<bool>,

    /// Case-insensitive substring of the entry location, so "Austin"
    /// matches "Austin, TX"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Case-insensitive exact match on the category name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Start date must fall on this day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl QueryFilters {
    pub fn for_requester(requester: impl Into<String>) -> Self {
        Self {
            requester: Some(requester.into()),
            ..Self::default()
        }
    }

    /// True when no constraint beyond visibility is set.
    pub fn is_unconstrained(&self) -> bool {
        self.is_free.is_none()
            && self.location.is_none()
            && self.category.is_none()
            && self.date.is_none()
    }

    pub fn matches(&self, meta: &EventMetadata) -> bool {
        if let (Some(requester), Some(owner)) = (&self.requester, &meta.owner) {
            if requester != owner {
                return false;
            }
        }
        if self.requester.is_none() && meta.owner.is_some() {
            return false;
        }
        if self.is_free.is_some_and(|free| free != meta.is_free) {
            return false;
        }
        if let Some(location) = &self.location {
            if !meta
                .location
                .to_lowercase()
                .contains(&location.to_lowercase())
            {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !meta.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(date) = self.date {
            if meta.start_time.map(|t| t.date()) != Some(date) {
                return false;
            }
        }
        true
    }
}
