use crate::model::{ReportRecord, SubdirectorySize};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct JsonRecord<'a> {
    id: &'a str,
    name: &'a str,
    version: &'a str,
    status: &'static str,
    is_active: bool,
    description: &'a str,
    author: &'a str,
    uri: Option<&'a str>,
    #[serde(flatten)]
    update: Option<JsonUpdate<'a>>,
    #[serde(flatten)]
    size: Option<JsonSize<'a>>,
}

#[derive(Serialize)]
struct JsonUpdate<'a> {
    update_available: bool,
    current_version: &'a str,
    latest_version: &'a str,
}

#[derive(Serialize)]
struct JsonSize<'a> {
    size_bytes: u64,
    size_human: &'a str,
    subdirectory_sizes: &'a [SubdirectorySize],
}

impl<'a> JsonRecord<'a> {
    fn new(record: &'a ReportRecord, include_size: bool) -> Self {
        let plugin = &record.plugin;
        Self {
            id: &plugin.id,
            name: &plugin.name,
            version: &plugin.version,
            status: record.status().as_str(),
            is_active: record.is_active,
            description: &plugin.description,
            author: &plugin.author,
            uri: plugin.uri.as_deref(),
            update: record.update.as_ref().map(|u| JsonUpdate {
                update_available: u.update_available,
                current_version: &u.current_version,
                latest_version: &u.latest_version,
            }),
            size: record.size.as_ref().filter(|_| include_size).map(|s| JsonSize {
                size_bytes: s.total_size_bytes,
                size_human: &s.human_readable,
                subdirectory_sizes: &s.subdirectory_sizes,
            }),
        }
    }
}

/// Serializes records as a pretty-printed JSON array.
///
/// Keys appear in a fixed order. Update keys are present for records that
/// carry update info; size keys only when `include_size` is set.
pub fn to_json(records: &[ReportRecord], include_size: bool) -> Result<String> {
    let rows: Vec<JsonRecord<'_>> = records
        .iter()
        .map(|r| JsonRecord::new(r, include_size))
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Plugin, SizeInfo, UpdateInfo};
    use serde_json::Value;

    fn records() -> Vec<ReportRecord> {
        vec![
            ReportRecord::new(
                Plugin::new("akismet/akismet.php", "Akismet", "5.3").with_uri("https://akismet.com/"),
                true,
            )
            .with_update(UpdateInfo::pending("5.3", "5.4"))
            .with_size(SizeInfo {
                total_size_bytes: 2048,
                subdirectory_sizes: vec![SubdirectorySize {
                    path: "/".to_string(),
                    size_bytes: 2048,
                }],
                human_readable: "2.00 KB".to_string(),
            }),
            ReportRecord::new(Plugin::new("hello.php", "Hello Dolly", "1.7.2"), false)
                .with_update(UpdateInfo::up_to_date("1.7.2"))
                .with_size(SizeInfo::empty()),
        ]
    }

    #[test]
    fn test_json_round_trip_with_size() {
        let json = to_json(&records(), true).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        let rows = parsed.as_array().unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0]["size_bytes"].is_u64());
        assert_eq!(rows[0]["size_bytes"], 2048);
        assert_eq!(rows[0]["size_human"], "2.00 KB");
        assert_eq!(rows[0]["status"], "active");
        assert_eq!(rows[0]["update_available"], true);
        assert_eq!(rows[0]["latest_version"], "5.4");
        assert_eq!(rows[1]["size_bytes"], 0);
        assert!(rows[1]["uri"].is_null());
    }

    #[test]
    fn test_json_without_size() {
        let json = to_json(&records(), false).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert!(parsed[0].get("size_bytes").is_none());
        assert!(parsed[0].get("subdirectory_sizes").is_none());
        assert!(parsed[0].get("update_available").is_some());
    }

    #[test]
    fn test_json_plain_records_have_only_plugin_fields() {
        let plain = vec![ReportRecord::new(Plugin::new("a/a.php", "A", "1"), false)];
        let parsed: Value = serde_json::from_str(&to_json(&plain, true).unwrap()).unwrap();
        let keys: Vec<_> = parsed[0].as_object().unwrap().keys().cloned().collect();

        let mut expected = vec![
            "author", "description", "id", "is_active", "name", "status", "uri", "version",
        ];
        expected.sort_unstable();
        let mut keys = keys;
        keys.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_json_is_byte_stable() {
        assert_eq!(to_json(&records(), true).unwrap(), to_json(&records(), true).unwrap());
    }

    #[test]
    fn test_json_empty() {
        assert_eq!(to_json(&[], true).unwrap(), "[]");
    }
}
