//! Terminal rendering for the CLI.

pub mod tables;

pub use tables::{TableBuilder, create_events_table, create_health_table, create_search_table};
