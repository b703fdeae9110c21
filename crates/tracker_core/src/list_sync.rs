//! Incremental merge of externally updated sites into a table kept in
//! descending `updated_at` order.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::SiteId;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteRecord {
    pub id: SiteId,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Answer of the updated-sites endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SiteUpdates {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub updated_sites: Vec<SiteRecord>,
    #[serde(default)]
    pub server_time: Option<String>,
}

/// Transient marker on a row touched by list sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Added,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRow {
    pub record: SiteRecord,
    pub updated: Option<DateTime<Utc>>,
    pub highlight: Option<Highlight>,
}

impl SiteRow {
    pub fn new(record: SiteRecord) -> Self {
        let updated = parse_timestamp(record.updated_at.as_deref());
        Self {
            record,
            updated,
            highlight: None,
        }
    }

    pub fn site_id(&self) -> SiteId {
        self.record.id
    }

    fn refresh(&mut self, record: SiteRecord) {
        self.updated = parse_timestamp(record.updated_at.as_deref());
        self.record = record;
    }
}

/// Parses RFC 3339 stamps; offset-less stamps are read as UTC.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Cursor for incremental fetches: the last `server_time` seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncCursor {
    since: Option<String>,
}

impl SyncCursor {
    pub fn since(&self) -> Option<&str> {
        self.since.as_deref()
    }

    /// Called only after a successful fetch.
    pub fn advance(&mut self, server_time: Option<String>) {
        if let Some(time) = server_time {
            self.since = Some(time);
        }
    }
}

/// Row touched by one merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowChange {
    pub site_id: SiteId,
    pub highlight: Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiteTable {
    rows: Vec<SiteRow>,
    displayed: HashSet<SiteId>,
}

impl SiteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the table with rows in the order they were rendered.
    pub fn from_records(records: Vec<SiteRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            if table.displayed.insert(record.id) {
                table.rows.push(SiteRow::new(record));
            }
        }
        table
    }

    pub fn rows(&self) -> &[SiteRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_displayed(&self, site_id: SiteId) -> bool {
        self.displayed.contains(&site_id)
    }

    pub fn row(&self, site_id: SiteId) -> Option<&SiteRow> {
        self.rows.iter().find(|row| row.site_id() == site_id)
    }

    /// Inserts before the first row whose own timestamp is strictly earlier.
    /// Rows without a parsable timestamp go to the end and never displace
    /// an ordered row.
    pub fn insert_row_in_order(&mut self, row: SiteRow) {
        let Some(stamp) = row.updated else {
            self.rows.push(row);
            return;
        };
        let position = self
            .rows
            .iter()
            .position(|existing| matches!(existing.updated, Some(other) if stamp > other));
        match position {
            Some(index) => self.rows.insert(index, row),
            None => self.rows.push(row),
        }
    }

    /// Applies a batch of updated sites and reports the rows it touched.
    pub fn merge(&mut self, mut updates: Vec<SiteRecord>) -> Vec<RowChange> {
        updates.sort_by(|a, b| {
            let a = parse_timestamp(a.updated_at.as_deref());
            let b = parse_timestamp(b.updated_at.as_deref());
            match (a, b) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });

        let mut changes = Vec::with_capacity(updates.len());
        for record in updates {
            let site_id = record.id;
            let existing = self.rows.iter().position(|row| row.site_id() == site_id);
            let highlight = match existing {
                Some(index) if self.displayed.contains(&site_id) => {
                    let mut row = self.rows.remove(index);
                    row.refresh(record);
                    row.highlight = Some(Highlight::Updated);
                    self.insert_row_in_order(row);
                    Highlight::Updated
                }
                _ => {
                    let mut row = SiteRow::new(record);
                    row.highlight = Some(Highlight::Added);
                    self.insert_row_in_order(row);
                    self.displayed.insert(site_id);
                    Highlight::Added
                }
            };
            changes.push(RowChange { site_id, highlight });
        }
        changes
    }

    /// Clears a highlight unless a newer one replaced it.
    pub fn clear_highlight(&mut self, site_id: SiteId, highlight: Highlight) -> bool {
        match self.rows.iter_mut().find(|row| row.site_id() == site_id) {
            Some(row) if row.highlight == Some(highlight) => {
                row.highlight = None;
                true
            }
            _ => false,
        }
    }
}
