//! Turning a user query into ranked events.

mod engine;
mod query;

pub use engine::{QueryEngine, SearchHit};
pub use query::{KNOWN_CATEGORIES, ParsedQuery, extract_filters, extract_filters_on};
