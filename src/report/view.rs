//! Presentation ordering and filtering of report records.
//!
//! Aggregation keeps registry order. Views sort with a stable sort, so
//! records that compare equal keep their registry order.

use crate::model::ReportRecord;
use std::cmp::Ordering;

/// Field to order records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Status,
}

impl SortKey {
    /// Direction used when the caller does not pick one.
    ///
    /// Sizes default to largest first; everything else ascending.
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortKey::Size => SortOrder::Desc,
            SortKey::Name | SortKey::Status => SortOrder::Asc,
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "status" => Ok(SortKey::Status),
            _ => Err(format!("Unknown sort key: {}. Use 'name', 'size', or 'status'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Unknown sort order: {}. Use 'asc' or 'desc'", s)),
        }
    }
}

/// Which records to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
    NeedsUpdate,
}

impl StatusFilter {
    pub fn matches(&self, record: &ReportRecord) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => record.is_active,
            StatusFilter::Inactive => !record.is_active,
            StatusFilter::NeedsUpdate => record.update_available(),
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "inactive" => Ok(StatusFilter::Inactive),
            "update" | "needs-update" | "outdated" => Ok(StatusFilter::NeedsUpdate),
            _ => Err(format!(
                "Unknown status filter: {}. Use 'all', 'active', 'inactive', or 'update'",
                s
            )),
        }
    }
}

/// Sorts records in place. `order` falls back to [`SortKey::default_order`].
pub fn sort_records(records: &mut [ReportRecord], key: SortKey, order: Option<SortOrder>) {
    let order = order.unwrap_or_else(|| key.default_order());

    records.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn compare(a: &ReportRecord, b: &ReportRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a
            .plugin
            .name
            .to_lowercase()
            .cmp(&b.plugin.name.to_lowercase()),
        SortKey::Size => a.size_bytes().cmp(&b.size_bytes()),
        // Active before inactive when ascending.
        SortKey::Status => b.is_active.cmp(&a.is_active),
    }
}

/// Keeps only the records matching `filter`, preserving their order.
pub fn filter_records(records: Vec<ReportRecord>, filter: StatusFilter) -> Vec<ReportRecord> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}
