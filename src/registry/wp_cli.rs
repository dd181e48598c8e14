use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

/// `active_plugins` is a PHP array; WP-CLI prints it as a JSON list, or as
/// an object when the array keys are not sequential.
#[derive(Deserialize)]
#[serde(untagged)]
enum ActivePluginsOption {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

/// Reads the `active_plugins` option of the install at `wp_root` via WP-CLI.
pub(crate) fn read_active_plugins(wp_root: &Path) -> Result<Vec<String>> {
    let wp_cmd = if cfg!(target_os = "windows") { "wp.bat" } else { "wp" };

    let output = Command::new(wp_cmd)
        .arg("option")
        .arg("get")
        .arg("active_plugins")
        .arg("--format=json")
        .arg("--skip-plugins")
        .arg("--skip-themes")
        .arg(format!("--path={}", wp_root.display()))
        .output()
        .context("Failed to execute wp. Is WP-CLI installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("wp option get active_plugins failed: {}", stderr.trim());
    }

    parse_active_plugins(&String::from_utf8_lossy(&output.stdout))
}

/// Parses WP-CLI's JSON rendering of the `active_plugins` option.
///
/// ```
/// use plugin_reporter::registry::parse_active_plugins;
///
/// let ids = parse_active_plugins(r#"["akismet/akismet.php"]"#).unwrap();
/// assert_eq!(ids, vec!["akismet/akismet.php"]);
/// ```
pub fn parse_active_plugins(stdout: &str) -> Result<Vec<String>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "false" {
        return Ok(Vec::new());
    }

    let option: ActivePluginsOption =
        serde_json::from_str(trimmed).context("Failed to parse active_plugins option")?;

    Ok(match option {
        ActivePluginsOption::List(ids) => ids,
        ActivePluginsOption::Map(ids) => ids.into_values().collect(),
    })
}
