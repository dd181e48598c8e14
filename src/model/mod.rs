//! Core data types for plugins, update and size information, and reports.
//!
//! This module contains the fundamental types used throughout plugin-reporter:
//!
//! - [`Plugin`] - An installed plugin as declared by its header
//! - [`UpdateInfo`] - Current vs. latest version for one plugin
//! - [`SizeInfo`] - On-disk footprint of one plugin
//! - [`ReportRecord`] - The merged, exportable unit
//! - [`Report`] - Records plus [`Summary`] statistics
//!
//! # Example
//!
//! ```
//! use plugin_reporter::{Plugin, ReportRecord, Summary};
//!
//! let plugin = Plugin::new("akismet/akismet.php", "Akismet", "5.3");
//! let record = ReportRecord::new(plugin, true);
//! let summary = Summary::from_records(&[record]);
//!
//! assert_eq!(summary.active_count, 1);
//! ```

mod plugin;
mod report;

pub use plugin::*;
pub use report::*;
