//! Error taxonomy for the backup pipeline.
//!
//! Every stage converts its failures into a [`BackupError`] so the
//! orchestrator can report a typed outcome instead of an opaque fault.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    /// Malformed or missing configuration. No pipeline run is attempted.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to create archive: {reason}")]
    ArchiveCreation {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    /// The final archive name is already taken; the existing file is left intact.
    #[error("`{0}` already exists, refusing to overwrite")]
    NameCollision(PathBuf),

    #[error("missing credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("bucket `{0}` does not exist")]
    BucketNotFound(String),

    /// The store refused the object for a reason retrying cannot fix.
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("upload failed after {attempts} attempt(s): {reason}")]
    TransientNetwork { attempts: u32, reason: String },

    #[error("failed to read artifact `{path}`: {source}")]
    ArtifactUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pipeline cancelled")]
    Cancelled,
}

impl BackupError {
    pub fn archive(reason: impl Into<String>, source: io::Error) -> Self {
        BackupError::ArchiveCreation {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub fn archive_msg(reason: impl Into<String>) -> Self {
        BackupError::ArchiveCreation {
            reason: reason.into(),
            source: None,
        }
    }

    /// Transient failures; a later run may succeed without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackupError::TransientNetwork { .. })
    }

    /// Errors that end the run without any further attempt.
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    /// Process exit status when this error ends the program.
    pub fn exit_code(&self) -> i32 {
        match self {
            BackupError::Config(_) => 1,
            BackupError::ArchiveCreation { .. } | BackupError::NameCollision(_) => 2,
            BackupError::Cancelled => 130,
            _ => 3,
        }
    }

    /// Short machine-friendly name, used in events and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            BackupError::Config(_) => "ConfigError",
            BackupError::ArchiveCreation { .. } => "ArchiveCreationError",
            BackupError::NameCollision(_) => "NameCollisionError",
            BackupError::MissingCredentials(_) => "MissingCredentialsError",
            BackupError::Authentication(_) => "AuthenticationError",
            BackupError::BucketNotFound(_) => "BucketNotFoundError",
            BackupError::UploadRejected(_) => "UploadRejectedError",
            BackupError::TransientNetwork { .. } => "TransientNetworkError",
            BackupError::ArtifactUnreadable { .. } => "ArtifactUnreadableError",
            BackupError::Cancelled => "Cancelled",
        }
    }
}

impl From<anyhow::Error> for BackupError {
    fn from(error: anyhow::Error) -> Self {
        BackupError::Config(format!("{:#}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_message_lists_fields() {
        let err = BackupError::MissingCredentials(vec!["access_key_id", "bucket_name"]);
        assert_eq!(err.to_string(), "missing credentials: access_key_id, bucket_name");
    }

    #[test]
    fn test_only_transient_errors_are_retryable() {
        let transient = BackupError::TransientNetwork {
            attempts: 3,
            reason: "connection reset".to_string(),
        };
        assert!(!transient.is_terminal());
        assert!(transient.is_retryable());
        assert!(BackupError::BucketNotFound("b".to_string()).is_terminal());
        assert!(BackupError::Authentication("denied".to_string()).is_terminal());
    }

    #[test]
    fn test_exit_codes_by_stage() {
        assert_eq!(BackupError::Config("x".to_string()).exit_code(), 1);
        assert_eq!(BackupError::archive_msg("disk full").exit_code(), 2);
        assert_eq!(BackupError::MissingCredentials(vec!["bucket_name"]).exit_code(), 3);
        assert_eq!(BackupError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_anyhow_context_becomes_config_error() {
        let err: BackupError = anyhow::anyhow!("bad json").context("Failed to parse config").into();
        match err {
            BackupError::Config(msg) => {
                assert!(msg.contains("Failed to parse config"));
                assert!(msg.contains("bad json"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
