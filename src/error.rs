use thiserror::Error;

/// Errors that can end an export request.
///
/// The two denial variants are raised before any report data is computed;
/// [`Report`](ExportError::Report) covers failures while building it.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Missing, expired or wrongly scoped authenticity token
    #[error("Security check failed")]
    SecurityCheckFailed,

    /// The requesting user is not an administrator
    #[error("Insufficient privileges")]
    InsufficientPrivileges,

    /// Aggregation or serialization failed
    #[error(transparent)]
    Report(#[from] anyhow::Error),
}

impl ExportError {
    /// True for the two access denials.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            ExportError::SecurityCheckFailed | ExportError::InsufficientPrivileges
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_messages() {
        assert_eq!(ExportError::SecurityCheckFailed.to_string(), "Security check failed");
        assert_eq!(ExportError::InsufficientPrivileges.to_string(), "Insufficient privileges");
        assert!(ExportError::InsufficientPrivileges.is_denial());
        assert!(!ExportError::from(anyhow::anyhow!("disk full")).is_denial());
    }
}
