//! Guarded CSV/JSON export.
//!
//! Every export is checked by an [`ExportGate`] before the report is built:
//! the caller must present an authenticity token scoped to the export action
//! and must be one of the configured administrators. A refused export
//! computes nothing, so no size scan runs and no cache entry is written.
//!
//! Tokens are `sha256(secret | action | user | tick)` in lowercase hex, where
//! a tick is a 12 hour window. A token verifies during the tick it was
//! issued in and the one after it.

use crate::error::ExportError;
use crate::output::{to_csv, to_json};
use crate::report::view::{filter_records, sort_records};
use crate::report::{Aggregator, SortKey, SortOrder, StatusFilter};
use chrono::{DateTime, Local, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Length of one token window.
pub const TICK_HOURS: i64 = 12;

/// Entry in `administrators` that admits every user.
pub const ANY_USER: &str = "*";

/// The two export operations. Each has its own token scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportAction {
    Csv,
    Json,
}

impl ExportAction {
    /// Token scope of this action.
    pub fn action_name(&self) -> &'static str {
        match self {
            ExportAction::Csv => "plugin_reporter_export_csv",
            ExportAction::Json => "plugin_reporter_export_json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportAction::Csv => "csv",
            ExportAction::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportAction::Csv => "text/csv; charset=utf-8",
            ExportAction::Json => "application/json; charset=utf-8",
        }
    }
}

impl std::str::FromStr for ExportAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportAction::Csv),
            "json" => Ok(ExportAction::Json),
            _ => Err(format!("Unknown export format: {}. Use 'csv' or 'json'", s)),
        }
    }
}

/// Issues and verifies export tokens and checks administrator membership.
#[derive(Debug, Clone)]
pub struct ExportGate {
    secret: String,
    administrators: Vec<String>,
}

impl ExportGate {
    pub fn new(secret: impl Into<String>, administrators: Vec<String>) -> Self {
        Self {
            secret: secret.into(),
            administrators,
        }
    }

    /// Token for `action` on behalf of `user`, valid from now.
    pub fn issue_token(&self, action: ExportAction, user: &str) -> String {
        self.token_at(action, user, current_tick(Utc::now()))
    }

    fn token_at(&self, action: ExportAction, user: &str, tick: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"|");
        hasher.update(action.action_name().as_bytes());
        hasher.update(b"|");
        hasher.update(user.as_bytes());
        hasher.update(b"|");
        hasher.update(tick.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn verify_token(&self, action: ExportAction, user: &str, token: &str) -> bool {
        self.verify_token_at(action, user, token, Utc::now())
    }

    fn verify_token_at(
        &self,
        action: ExportAction,
        user: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> bool {
        // Without a secret every token would be forgeable.
        if self.secret.is_empty() || token.is_empty() {
            return false;
        }

        let tick = current_tick(now);
        [tick, tick - 1]
            .iter()
            .any(|&t| constant_time_eq(self.token_at(action, user, t).as_bytes(), token.as_bytes()))
    }

    pub fn is_administrator(&self, user: &str) -> bool {
        self.administrators
            .iter()
            .any(|admin| admin == ANY_USER || (!user.is_empty() && admin == user))
    }

    /// Runs both checks for `request`. The token is checked first.
    pub fn authorize(&self, action: ExportAction, request: &ExportRequest) -> Result<(), ExportError> {
        let token = request.token.as_deref().unwrap_or_default();
        if !self.verify_token(action, &request.user, token) {
            warn!(action = action.action_name(), user = %request.user, "export token rejected");
            return Err(ExportError::SecurityCheckFailed);
        }

        if !self.is_administrator(&request.user) {
            warn!(action = action.action_name(), user = %request.user, "export by non-administrator refused");
            return Err(ExportError::InsufficientPrivileges);
        }

        Ok(())
    }
}

fn current_tick(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(3600 * TICK_HOURS)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// One inbound export request.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub token: Option<String>,
    pub user: String,
    pub include_size: bool,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub status: StatusFilter,
}

impl ExportRequest {
    pub fn new(user: impl Into<String>, token: Option<String>) -> Self {
        Self {
            token,
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, include_size: bool) -> Self {
        self.include_size = include_size;
        self
    }

    pub fn with_sort(mut self, key: SortKey, order: Option<SortOrder>) -> Self {
        self.sort = Some(key);
        self.order = order;
        self
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }
}

/// A serialized export ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

impl ExportDocument {
    /// `plugin-report-YYYY-MM-DD.<ext>`
    pub fn filename_for(action: ExportAction, date: NaiveDate) -> String {
        format!("plugin-report-{}.{}", date.format("%Y-%m-%d"), action.extension())
    }

    /// Download headers for serving the document over HTTP.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", self.content_type.to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ),
            ("Cache-Control", "no-cache, no-store, must-revalidate".to_string()),
            ("Pragma", "no-cache".to_string()),
            ("Expires", "0".to_string()),
        ]
    }
}

/// Authorizes `request`, then builds and serializes the report.
///
/// Exports always carry update information; sizes only when requested.
pub async fn run_export(
    gate: &ExportGate,
    action: ExportAction,
    request: &ExportRequest,
    aggregator: &Aggregator<'_>,
) -> Result<ExportDocument, ExportError> {
    gate.authorize(action, request)?;

    let report = aggregator.build(true, request.include_size).await?;

    let mut records = filter_records(report.records, request.status);
    if let Some(key) = request.sort {
        sort_records(&mut records, key, request.order);
    }
    debug!(records = records.len(), action = action.action_name(), "exporting report");

    let body = match action {
        ExportAction::Csv => to_csv(&records, request.include_size),
        ExportAction::Json => to_json(&records, request.include_size)?,
    };

    Ok(ExportDocument {
        filename: ExportDocument::filename_for(action, Local::now().date_naive()),
        content_type: action.content_type(),
        body,
    })
}
