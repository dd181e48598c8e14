use crate::model::ReportRecord;
use std::borrow::Cow;

const DELIMITER: char = ',';
const QUOTE: char = '"';

const BASE_HEADERS: [&str; 7] = [
    "Name",
    "Version",
    "Status",
    "Description",
    "Author",
    "Plugin URI",
    "Plugin Path",
];
const UPDATE_HEADERS: [&str; 2] = ["Update Available", "Latest Version"];
const SIZE_HEADER: &str = "Size";

/// Serializes records as CSV with one header row.
///
/// Update columns are added when the records carry update info, then the
/// size column when `include_size` is set. Every row has as many fields as
/// the header; a record missing an optional block gets empty cells.
pub fn to_csv(records: &[ReportRecord], include_size: bool) -> String {
    let include_update = records.iter().any(ReportRecord::has_update_info);

    let mut headers: Vec<&str> = BASE_HEADERS.to_vec();
    if include_update {
        headers.extend(UPDATE_HEADERS);
    }
    if include_size {
        headers.push(SIZE_HEADER);
    }

    let mut out = String::new();
    write_row(&mut out, &headers);

    for record in records {
        let plugin = &record.plugin;
        let mut row: Vec<&str> = vec![
            plugin.name.as_str(),
            plugin.version.as_str(),
            record.status().label(),
            plugin.description.as_str(),
            plugin.author.as_str(),
            plugin.uri.as_deref().unwrap_or(""),
            plugin.id.as_str(),
        ];

        if include_update {
            match &record.update {
                Some(update) => {
                    row.push(if update.update_available { "Yes" } else { "No" });
                    row.push(update.latest_version.as_str());
                }
                None => row.extend(["", ""]),
            }
        }

        if include_size {
            row.push(record.size.as_ref().map(|s| s.human_readable.as_str()).unwrap_or(""));
        }

        write_row(&mut out, &row);
    }

    out
}

fn write_row(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&escape_field(field));
    }
    out.push('\n');
}

/// Quotes a field containing the delimiter, a quote or a line break,
/// doubling embedded quotes.
fn escape_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\n' || c == '\r');

    if !needs_quotes {
        return Cow::Borrowed(field);
    }

    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push(QUOTE);
    for c in field.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    Cow::Owned(quoted)
}
