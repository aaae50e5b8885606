use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::archive::ArchiveFormat;

/// What to back up and where to publish the archive.
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub sources: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: ArchiveFormat,
}

impl BackupRequest {
    pub fn new<I, P>(sources: I, output_dir: impl Into<PathBuf>, format: ArchiveFormat) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        BackupRequest {
            sources: sources.into_iter().map(Into::into).collect(),
            output_dir: output_dir.into(),
            format,
        }
    }
}

/// A published archive in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
    pub sha256: String,
    pub size: u64,
    pub entries: usize,
}

impl ArchiveArtifact {
    /// File name of the artifact, which doubles as its object key.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// Credentials for the object store. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
}

impl ObjectStoreCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        ObjectStoreCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket_name: bucket_name.into(),
        }
    }

    /// Names of the fields that are empty or whitespace only.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.access_key_id.trim().is_empty() {
            missing.push("access_key_id");
        }
        if self.secret_access_key.trim().is_empty() {
            missing.push("secret_access_key");
        }
        if self.bucket_name.trim().is_empty() {
            missing.push("bucket_name");
        }
        missing
    }
}

impl fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// Returned by the uploader once the object is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub bucket: String,
    pub attempts: u32,
}
