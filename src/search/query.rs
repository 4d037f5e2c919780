//! Pulls structured hints out of a free-text query.
//!
//! Recognised hints are removed from the text before it is encoded:
//! `free`/`paid`, relative dates (`today`, `tomorrow`, `this weekend`,
//! `next week`), a known category name, and `in <place>`.
//!
//! A relative date is resolved into [`ParsedQuery::date`] but is not added
//! to the filters; the caller decides whether to restrict by it.

use chrono::{Datelike, Days, Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::vector::QueryFilters;

/// Categories recognised in queries, in their canonical spelling.
pub const KNOWN_CATEGORIES: &[&str] = &[
    "Technology",
    "Music",
    "Business",
    "Sports",
    "Education",
    "Food & Drink",
    "Gaming",
    "Health & Wellness",
];

static FREE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfree\b").expect("Invalid regex"));
static PAID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpaid\b").expect("Invalid regex"));
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bin\s+([a-z][a-z\s]*)").expect("Invalid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

#[derive(Debug, Clone, Copy)]
enum RelativeDate {
    Today,
    Tomorrow,
    ThisWeekend,
    NextWeek,
}

impl RelativeDate {
    fn resolve(self, today: NaiveDate) -> Option<NaiveDate> {
        let offset = match self {
            Self::Today => 0,
            Self::Tomorrow => 1,
            // Upcoming Saturday, or today if it is Saturday
            Self::ThisWeekend => (12 - today.weekday().num_days_from_monday()) % 7,
            Self::NextWeek => 7,
        };
        today.checked_add_days(Days::new(u64::from(offset)))
    }
}

static DATE_PHRASES: LazyLock<Vec<(Regex, RelativeDate)>> = LazyLock::new(|| {
    [
        (r"(?i)\btoday\b", RelativeDate::Today),
        (r"(?i)\btomorrow\b", RelativeDate::Tomorrow),
        (r"(?i)\bthis\s+weekend\b", RelativeDate::ThisWeekend),
        (r"(?i)\bnext\s+week\b", RelativeDate::NextWeek),
    ]
    .into_iter()
    .map(|(pattern, date)| (Regex::new(pattern).expect("Invalid regex"), date))
    .collect()
});

static CATEGORY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    KNOWN_CATEGORIES
        .iter()
        .map(|name| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
            (Regex::new(&pattern).expect("Invalid regex"), *name)
        })
        .collect()
});

/// Query text to encode plus the filters found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub text: String,
    pub filters: QueryFilters,
    /// Start date named by a relative date phrase
    pub date: Option<NaiveDate>,
}

/// Extract filters relative to the local calendar date.
pub fn extract_filters(query: &str) -> ParsedQuery {
    extract_filters_on(query, Local::now().date_naive())
}

/// Extract filters, resolving relative dates against `today`.
///
/// If stripping the hints leaves nothing to encode, the original query text
/// is kept so the search still has something to rank by.
pub fn extract_filters_on(query: &str, today: NaiveDate) -> ParsedQuery {
    let mut filters = QueryFilters::default();
    let mut date = None;
    let mut text = query.to_string();

    if FREE.is_match(&text) {
        filters.is_free = Some(true);
        text = FREE.replace_all(&text, " ").into_owned();
    }
    if PAID.is_match(&text) {
        filters.is_free = Some(false);
        text = PAID.replace_all(&text, " ").into_owned();
    }

    for (pattern, phrase) in DATE_PHRASES.iter() {
        if pattern.is_match(&text) {
            date = phrase.resolve(today);
            text = pattern.replace_all(&text, " ").into_owned();
        }
    }

    // Before location, which would otherwise swallow a trailing category word
    if let Some((pattern, name)) = CATEGORY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&text))
    {
        filters.category = Some((*name).to_string());
        text = pattern.replace_all(&text, " ").into_owned();
    }

    if let Some(caps) = LOCATION.captures(&text) {
        let place = title_case(caps[1].trim());
        if !place.is_empty() {
            filters.location = Some(place);
            text = LOCATION.replace(&text, " ").into_owned();
        }
    }

    let residual = WHITESPACE.replace_all(text.trim(), " ").into_owned();
    let text = if residual.is_empty() && (date.is_some() || !filters.is_unconstrained()) {
        WHITESPACE.replace_all(query.trim(), " ").into_owned()
    } else {
        residual
    };

    ParsedQuery {
        text,
        filters,
        date,
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A Wednesday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn parse(query: &str) -> ParsedQuery {
        extract_filters_on(query, today())
    }

    #[test]
    fn test_plain_query_untouched() {
        let parsed = parse("  jazz   festival ");
        assert_eq!(parsed.text, "jazz festival");
        assert_eq!(parsed.filters, QueryFilters::default());
        assert_eq!(parsed.date, None);
    }

    #[test]
    fn test_free_and_paid() {
        let parsed = parse("free workshop");
        assert_eq!(parsed.filters.is_free, Some(true));
        assert_eq!(parsed.text, "workshop");

        let parsed = parse("paid conference");
        assert_eq!(parsed.filters.is_free, Some(false));
        assert_eq!(parsed.text, "conference");

        // Whole words only
        let parsed = parse("freedom rally");
        assert_eq!(parsed.filters.is_free, None);
        assert_eq!(parsed.text, "freedom rally");
    }

    #[test]
    fn test_location() {
        let parsed = parse("startup pitch in san francisco");
        assert_eq!(parsed.filters.location.as_deref(), Some("San Francisco"));
        assert_eq!(parsed.text, "startup pitch");

        // "in" inside a word is not a location marker
        let parsed = parse("cabin retreat");
        assert_eq!(parsed.filters.location, None);
    }

    #[test]
    fn test_relative_dates() {
        let cases = [
            ("concerts today", 14),
            ("concerts tomorrow", 15),
            ("concerts this weekend", 17),
            ("concerts next week", 21),
        ];
        for (query, day) in cases {
            let parsed = parse(query);
            assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 10, day), "{query}");
            // Stripped from the text but never a filter on its own
            assert_eq!(parsed.filters, QueryFilters::default());
            assert_eq!(parsed.text, "concerts");
        }

        let saturday = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let parsed = extract_filters_on("brunch this weekend", saturday);
        assert_eq!(parsed.date, Some(saturday));

        let parsed = parse("today");
        assert_eq!(parsed.text, "today");
    }

    #[test]
    fn test_category() {
        let parsed = parse("food & drink tasting");
        assert_eq!(parsed.filters.category.as_deref(), Some("Food & Drink"));
        assert_eq!(parsed.text, "tasting");

        let parsed = parse("events in austin music");
        assert_eq!(parsed.filters.category.as_deref(), Some("Music"));
        assert_eq!(parsed.filters.location.as_deref(), Some("Austin"));
        assert_eq!(parsed.text, "events");
    }

    #[test]
    fn test_combined_hints() {
        let parsed = parse("free technology meetup in austin tomorrow");
        assert_eq!(parsed.filters.is_free, Some(true));
        assert_eq!(parsed.filters.category.as_deref(), Some("Technology"));
        assert_eq!(parsed.filters.location.as_deref(), Some("Austin"));
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 10, 15));
        assert_eq!(parsed.filters.date, None);
        assert_eq!(parsed.text, "meetup");
    }

    #[test]
    fn test_only_hints_keeps_original_text() {
        let parsed = parse("free music");
        assert_eq!(parsed.filters.is_free, Some(true));
        assert_eq!(parsed.filters.category.as_deref(), Some("Music"));
        assert_eq!(parsed.text, "free music");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("new YORK"), "New York");
        assert_eq!(title_case(""), "");
    }
}
