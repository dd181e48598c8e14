use crate::model::{Report, ReportRecord};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct PluginRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Update")]
    update: String,
    #[tabled(rename = "Size")]
    size: String,
}

impl PluginRow {
    fn from_record(record: &ReportRecord) -> Self {
        let (latest, update) = match &record.update {
            Some(u) if u.update_available => (u.latest_version.clone(), "yes".to_string()),
            Some(u) => (u.latest_version.clone(), "no".to_string()),
            None => ("-".to_string(), "-".to_string()),
        };

        Self {
            name: truncate(&record.plugin.name, 40),
            status: record.status().label().to_string(),
            version: format_version(&record.plugin.version),
            latest,
            update,
            size: record
                .size
                .as_ref()
                .map(|s| s.human_readable.clone())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn print_table(report: &Report) -> Result<()> {
    println!();
    println!(
        "Report generated at: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.records.is_empty() {
        println!("No plugins found.");
    } else {
        let rows: Vec<PluginRow> = report.records.iter().map(PluginRow::from_record).collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    println!();
    print_summary(report);

    Ok(())
}

fn print_summary(report: &Report) {
    let summary = &report.summary;

    println!("Summary:");
    println!(
        "  Total plugins: {} ({} active, {} inactive)",
        summary.total_count, summary.active_count, summary.inactive_count
    );

    if report.include_update {
        println!("  Updates available: {}", summary.update_count);
    }

    if report.include_size {
        println!("  Total size: {}", summary.total_size_human);
    }

    if !report.diagnostics.is_empty() {
        println!(
            "  Warning: {} plugin(s) could not be fully scanned; their sizes are partial",
            report.diagnostics.len()
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn format_version(version: &str) -> String {
    if version.is_empty() {
        "-".to_string()
    } else {
        version.to_string()
    }
}
