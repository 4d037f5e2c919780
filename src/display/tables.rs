//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::refresh::RefreshStatus;
use crate::search::SearchHit;
use crate::service::Health;
use crate::vector::EventMetadata;

const MAX_TITLE_WIDTH: usize = 40;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        Self { table }
    }

    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Ranked search results.
pub fn create_search_table(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .fold(
            TableBuilder::new().set_headers(vec![
                "#", "Score", "Title", "Category", "Location", "Start", "Free",
            ]),
            |table, (rank, hit)| {
                table.add_row(vec![
                    (rank + 1).to_string(),
                    format!("{:.3}", hit.score),
                    truncate(&hit.event.title, MAX_TITLE_WIDTH),
                    hit.event.category.clone(),
                    hit.event.location.clone(),
                    format_start(&hit.event),
                    yes_no(hit.event.is_free),
                ])
            },
        )
        .build()
}

/// Indexed events in catalog order.
pub fn create_events_table(events: &[EventMetadata]) -> String {
    events
        .iter()
        .fold(
            TableBuilder::new().set_headers(vec![
                "ID", "Title", "Category", "Location", "Start", "Price", "Free",
            ]),
            |table, event| {
                table.add_row(vec![
                    event.id.clone(),
                    truncate(&event.title, MAX_TITLE_WIDTH),
                    event.category.clone(),
                    event.location.clone(),
                    format_start(event),
                    event.price.clone(),
                    yes_no(event.is_free),
                ])
            },
        )
        .build()
}

/// Health plus full refresh status.
pub fn create_health_table(health: &Health, status: &RefreshStatus) -> String {
    let last_refresh = health
        .last_refresh
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["Index ready".to_string(), yes_no(health.index_ready)])
        .add_row(vec!["Last refresh".to_string(), last_refresh])
        .add_row(vec!["Refresh running".to_string(), yes_no(status.running)])
        .add_row(vec![
            "Entries".to_string(),
            status.last_entry_count.to_string(),
        ])
        .add_row(vec!["Skipped".to_string(), status.last_skipped.to_string()])
        .add_row(vec![
            "Last error".to_string(),
            status.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ])
        .build()
}

fn format_start(event: &EventMetadata) -> String {
    event
        .start_time
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn yes_no(value: bool) -> String {
    let s = if value { "yes" } else { "no" };
    s.to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}
