//! Report rendering.
//!
//! [`to_csv`] and [`to_json`] are the export serializers; both are pure
//! functions of the record sequence, so identical input yields identical
//! bytes. [`print_table`] is the human-readable terminal view.

mod csv;
mod json;
mod table;

pub use csv::to_csv;
pub use json::to_json;
pub use table::print_table;

use crate::model::Report;
use anyhow::Result;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table with summary
    Table,
    /// JSON array, one object per plugin
    Json,
    /// CSV with a header row
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Table => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!(
                "Unknown format: {}. Use 'table', 'json', or 'csv'",
                s
            )),
        }
    }
}

pub fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_table(report),
        OutputFormat::Json | OutputFormat::Csv => {
            print!("{}", format_report_to_string(report, format)?);
            Ok(())
        }
    }
}

/// Format a report's records to a string for file output
pub fn format_report_to_string(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(to_csv(&report.records, report.include_size)),
        OutputFormat::Json => to_json(&report.records, report.include_size),
        // The table is terminal-only; files get JSON.
        OutputFormat::Table => to_json(&report.records, report.include_size),
    }
}
