use super::{RemoteUpdate, UpdateSnapshot, UpdateSource};
use crate::model::Plugin;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// The WordPress.org plugin update-check endpoint.
pub const UPDATE_CHECK_URL: &str = "https://api.wordpress.org/plugins/update-check/1.1/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Checks the WordPress.org plugin directory for pending updates.
///
/// The whole installed set is sent in a single request, the same way
/// WordPress core's own update check does it.
pub struct WordPressOrgSource {
    client: reqwest::Client,
    endpoint: String,
}

impl WordPressOrgSource {
    pub fn new() -> Self {
        Self::with_endpoint(UPDATE_CHECK_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WordPressOrgSource {
    fn default() -> Self {
        Self::new()
    }
}

// Request payload, keyed the way plugin headers are named in WordPress.
#[derive(Serialize)]
struct CheckPayload<'a> {
    plugins: BTreeMap<&'a str, CheckedPlugin<'a>>,
    active: Vec<&'a str>,
}

#[derive(Serialize)]
struct CheckedPlugin<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Version")]
    version: &'a str,
    #[serde(rename = "Author")]
    author: &'a str,
    #[serde(rename = "PluginURI")]
    plugin_uri: &'a str,
}

fn build_payload<'a>(installed: &'a [Plugin], active: &'a HashSet<String>) -> CheckPayload<'a> {
    let plugins = installed
        .iter()
        .map(|p| {
            (
                p.id.as_str(),
                CheckedPlugin {
                    name: &p.name,
                    version: &p.version,
                    author: &p.author,
                    plugin_uri: p.uri.as_deref().unwrap_or(""),
                },
            )
        })
        .collect();

    let mut active: Vec<&str> = active.iter().map(String::as_str).collect();
    active.sort_unstable();

    CheckPayload { plugins, active }
}

/// Reads pending updates out of an update-check response body.
///
/// Every entry under `plugins` is a pending update. A missing or non-string
/// `new_version` becomes an empty version rather than an error.
pub fn parse_update_response(body: &Value) -> UpdateSnapshot {
    let Some(plugins) = body.get("plugins").and_then(Value::as_object) else {
        // An empty PHP array is encoded as `[]`.
        return UpdateSnapshot::new();
    };

    plugins
        .iter()
        .map(|(id, entry)| {
            let new_version = entry
                .get("new_version")
                .and_then(Value::as_str)
                .unwrap_or_default();
            (id.clone(), RemoteUpdate::new(new_version))
        })
        .collect()
}

#[async_trait]
impl UpdateSource for WordPressOrgSource {
    fn name(&self) -> &'static str {
        "WordPress.org"
    }

    async fn fetch(&self, installed: &[Plugin], active: &HashSet<String>) -> Result<UpdateSnapshot> {
        if installed.is_empty() {
            return Ok(UpdateSnapshot::new());
        }

        let payload = serde_json::to_string(&build_payload(installed, active))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                "User-Agent",
                concat!("plugin-reporter/", env!("CARGO_PKG_VERSION")),
            )
            .timeout(REQUEST_TIMEOUT)
            .form(&[
                ("plugins", payload.as_str()),
                ("translations", "[]"),
                ("locale", "[]"),
                ("all", "true"),
            ])
            .send()
            .await
            .context("Failed to reach the plugin update service")?
            .error_for_status()?;

        let body: Value = response
            .json()
            .await
            .context("Failed to parse update-check response")?;

        Ok(parse_update_response(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_update_response() {
        let body = json!({
            "plugins": {
                "akismet/akismet.php": {"slug": "akismet", "new_version": "5.4"},
                "broken/broken.php": {"slug": "broken"},
                "odd/odd.php": {"new_version": 7}
            },
            "no_update": {
                "hello.php": {"new_version": "1.7.2"}
            }
        });

        let snapshot = parse_update_response(&body);

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("akismet/akismet.php"), Some(&RemoteUpdate::new("5.4")));
        assert_eq!(snapshot.get("broken/broken.php"), Some(&RemoteUpdate::new("")));
        assert_eq!(snapshot.get("odd/odd.php"), Some(&RemoteUpdate::new("")));
        assert!(snapshot.get("hello.php").is_none());
    }

    #[test]
    fn test_parse_empty_php_array() {
        let snapshot = parse_update_response(&json!({"plugins": [], "no_update": []}));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_build_payload() {
        let installed = vec![Plugin::new("a/a.php", "A", "1.0").with_uri("https://a.example")];
        let active: HashSet<String> = ["a/a.php".to_string()].into_iter().collect();

        let payload = serde_json::to_value(build_payload(&installed, &active)).unwrap();

        assert_eq!(payload["plugins"]["a/a.php"]["Version"], "1.0");
        assert_eq!(payload["plugins"]["a/a.php"]["PluginURI"], "https://a.example");
        assert_eq!(payload["active"], json!(["a/a.php"]));
    }

    #[tokio::test]
    async fn test_fetch_with_nothing_installed_skips_request() {
        let source = WordPressOrgSource::with_endpoint("http://127.0.0.1:9/unreachable");
        let snapshot = source.fetch(&[], &HashSet::new()).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
