use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Plugin, SizeInfo, Status, UpdateInfo};
use crate::size::{human_readable, ScanError};

/// One merged row of the report.
///
/// The optional blocks are present only when the aggregation asked for them,
/// so exporters branch on [`has_update_info`](Self::has_update_info) and
/// [`has_size_info`](Self::has_size_info) rather than on key presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub plugin: Plugin,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeInfo>,
}

impl ReportRecord {
    pub fn new(plugin: Plugin, is_active: bool) -> Self {
        Self {
            plugin,
            is_active,
            update: None,
            size: None,
        }
    }

    pub fn with_update(mut self, update: UpdateInfo) -> Self {
        self.update = Some(update);
        self
    }

    pub fn with_size(mut self, size: SizeInfo) -> Self {
        self.size = Some(size);
        self
    }

    pub fn status(&self) -> Status {
        Status::from_active(self.is_active)
    }

    pub fn has_update_info(&self) -> bool {
        self.update.is_some()
    }

    pub fn has_size_info(&self) -> bool {
        self.size.is_some()
    }

    pub fn update_available(&self) -> bool {
        self.update
            .as_ref()
            .map(|u| u.update_available)
            .unwrap_or(false)
    }

    /// Total size in bytes, 0 when size info was not collected.
    pub fn size_bytes(&self) -> u64 {
        self.size.as_ref().map(|s| s.total_size_bytes).unwrap_or(0)
    }
}

/// Counts and totals over a full record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_count: usize,
    pub active_count: usize,
    pub inactive_count: usize,
    pub update_count: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
}

impl Summary {
    pub fn from_records(records: &[ReportRecord]) -> Self {
        let active_count = records.iter().filter(|r| r.is_active).count();
        let update_count = records.iter().filter(|r| r.update_available()).count();
        let total_size_bytes: u64 = records.iter().map(ReportRecord::size_bytes).sum();

        Self {
            total_count: records.len(),
            active_count,
            inactive_count: records.len() - active_count,
            update_count,
            total_size_bytes,
            total_size_human: human_readable(total_size_bytes),
        }
    }
}

/// A size scan failure attributed to one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub plugin_id: String,
    pub error: ScanError,
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub records: Vec<ReportRecord>,
    pub summary: Summary,
    pub include_update: bool,
    pub include_size: bool,
    pub generated_at: DateTime<Utc>,
    /// Scan failures behind any partial sizes in `records`.
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new(records: Vec<ReportRecord>, include_update: bool, include_size: bool) -> Self {
        let summary = Summary::from_records(&records);
        Self {
            records,
            summary,
            include_update,
            include_size,
            generated_at: Utc::now(),
            diagnostics: Vec::new(),
        }
    }
}
