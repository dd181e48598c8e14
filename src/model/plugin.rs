use serde::{Deserialize, Serialize};

/// An installed plugin, as declared by its main file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Path of the main file relative to the plugins directory, e.g. `akismet/akismet.php`.
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Plugin {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            uri: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

/// Activation state of a plugin at aggregation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub fn from_active(is_active: bool) -> Self {
        if is_active {
            Status::Active
        } else {
            Status::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
        }
    }

    /// Human label used by the CSV export and the report table.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Inactive => "Inactive",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Update state of one plugin, resolved against the remote snapshot.
///
/// When no pending update exists, `latest_version` equals `current_version`
/// and `update_available` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
}

impl UpdateInfo {
    pub fn up_to_date(current_version: impl Into<String>) -> Self {
        let current_version = current_version.into();
        Self {
            latest_version: current_version.clone(),
            current_version,
            update_available: false,
        }
    }

    pub fn pending(current_version: impl Into<String>, latest_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            latest_version: latest_version.into(),
            update_available: true,
        }
    }
}

/// Bytes attributed to one directory of a plugin, relative to the plugin root.
///
/// The plugin root itself is keyed as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdirectorySize {
    pub path: String,
    pub size_bytes: u64,
}

/// On-disk footprint of one plugin.
///
/// `total_size_bytes` always equals the sum of `subdirectory_sizes`, which are
/// ordered largest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeInfo {
    pub total_size_bytes: u64,
    pub subdirectory_sizes: Vec<SubdirectorySize>,
    pub human_readable: String,
}

impl SizeInfo {
    /// Size of a plugin whose directory is missing.
    pub fn empty() -> Self {
        Self {
            total_size_bytes: 0,
            subdirectory_sizes: Vec::new(),
            human_readable: crate::size::human_readable(0),
        }
    }
}

impl Default for SizeInfo {
    fn default() -> Self {
        Self::empty()
    }
}
