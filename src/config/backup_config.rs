use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveFormat;
use crate::cloud::RetryPolicy;
use crate::config::env_vars::{expand_env_vars, EnvOverrides};
use crate::constants::{
    MAX_UPLOAD_ATTEMPTS, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_SECS, UPLOAD_ATTEMPT_TIMEOUT_SECS,
};
use crate::error::BackupError;
use crate::models::{BackupRequest, ObjectStoreCredentials};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: MAX_UPLOAD_ATTEMPTS,
            base_delay_ms: RETRY_BASE_DELAY_MS,
            max_delay_secs: RETRY_MAX_DELAY_SECS,
            attempt_timeout_secs: UPLOAD_ATTEMPT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub directories: Vec<String>,
    pub aws: AwsConfig,
    pub backup_output_dir: String,
    #[serde(default)]
    pub archive_format: ArchiveFormat,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Serialization used for a config file, chosen by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                FileFormat::Yaml
            }
            _ => FileFormat::Json,
        }
    }
}

impl BackupConfig {
    /// Read, merge, expand and validate the configuration at `path`, then make
    /// sure the output directory exists.
    pub fn load(path: &Path, overrides: &EnvOverrides) -> Result<Self> {
        let config = Self::from_file(path)?;
        let config = overrides
            .merge(config)
            .expand_paths(|name| std::env::var(name).ok());

        config.validate()?;
        config.ensure_output_dir()?;

        info!(
            "Loaded configuration from {}: {} director{}, bucket {}",
            path.display(),
            config.directories.len(),
            if config.directories.len() == 1 { "y" } else { "ies" },
            config.aws.bucket_name
        );
        Ok(config)
    }

    /// [`load`](Self::load) for callers outside the config layer: any failure
    /// becomes [`BackupError::Config`] with the full context chain.
    pub fn load_checked(path: &Path, overrides: &EnvOverrides) -> crate::error::Result<Self> {
        Self::load(path, overrides).map_err(BackupError::from)
    }

    /// Parse a configuration file without validating it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config = match FileFormat::for_path(path) {
            FileFormat::Yaml => serde_yaml::from_str(&content).context("Failed to parse YAML config")?,
            FileFormat::Json => serde_json::from_str(&content).context("Failed to parse JSON config")?,
        };

        debug!("Parsed configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration, as JSON or YAML depending on the extension.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = match FileFormat::for_path(path) {
            FileFormat::Yaml => serde_yaml::to_string(self).context("Failed to serialize config to YAML")?,
            FileFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?
            }
        };

        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Starting point written by `init-config`.
    pub fn template() -> Self {
        BackupConfig {
            directories: vec!["/path/to/dir1".to_string(), "/path/to/dir2".to_string()],
            aws: AwsConfig {
                access_key_id: String::new(),
                secret_access_key: String::new(),
                bucket_name: "my-backup-bucket".to_string(),
                region: Some("us-east-1".to_string()),
                endpoint: None,
            },
            backup_output_dir: "/path/to/backup/folder".to_string(),
            archive_format: ArchiveFormat::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Write [`BackupConfig::template`] to `path`, refusing to replace a file.
    pub fn write_template(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        Self::template().save_to_file(path)
    }

    /// Expand `$VAR`/`${VAR}` in the directory and output paths.
    pub fn expand_paths<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for dir in &mut self.directories {
            *dir = expand_env_vars(dir, &lookup);
        }
        self.backup_output_dir = expand_env_vars(&self.backup_output_dir, &lookup);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.directories.is_empty() {
            bail!("`directories` must list at least one directory");
        }
        if let Some(index) = self.directories.iter().position(|dir| dir.trim().is_empty()) {
            bail!("`directories[{}]` is empty", index);
        }
        if self.backup_output_dir.trim().is_empty() {
            bail!("`backup_output_dir` is empty");
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            bail!("`retry.max_attempts` must be at least 1");
        }
        if retry.base_delay_ms > retry.max_delay_secs.saturating_mul(1000) {
            bail!(
                "`retry.base_delay_ms` ({}) exceeds `retry.max_delay_secs` ({}s)",
                retry.base_delay_ms,
                retry.max_delay_secs
            );
        }
        if retry.attempt_timeout_secs == 0 {
            bail!("`retry.attempt_timeout_secs` must be greater than 0");
        }
        Ok(())
    }

    /// Create the output directory if it is missing.
    pub fn ensure_output_dir(&self) -> Result<PathBuf> {
        let dir = self.output_dir();
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .context(format!("Failed to create output directory: {}", dir.display()))?;
            info!("Created output directory {}", dir.display());
        }
        Ok(dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.backup_output_dir)
    }

    /// The backup request for this configuration. `format` overrides the
    /// configured archive format.
    pub fn to_request(&self, format: Option<ArchiveFormat>) -> BackupRequest {
        BackupRequest::new(
            &self.directories,
            self.output_dir(),
            format.unwrap_or(self.archive_format),
        )
    }

    pub fn credentials(&self) -> ObjectStoreCredentials {
        ObjectStoreCredentials::new(
            self.aws.access_key_id.clone(),
            self.aws.secret_access_key.clone(),
            self.aws.bucket_name.clone(),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
            attempt_timeout: Duration::from_secs(self.retry.attempt_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ENV_ACCESS_KEY_ID, ENV_BUCKET_NAME};
    use tempfile::TempDir;

    const SAMPLE_JSON: &str = r#"{
        "directories": ["/data/app", "/data/db"],
        "aws": {
            "access_key_id": "AKIAFILEKEY",
            "secret_access_key": "file-secret",
            "bucket_name": "file-bucket"
        },
        "backup_output_dir": "/backups"
    }"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_json_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", SAMPLE_JSON);

        let config = BackupConfig::from_file(&path).unwrap();
        assert_eq!(config.directories, vec!["/data/app", "/data/db"]);
        assert_eq!(config.archive_format, ArchiveFormat::TarGz);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.aws.region, None);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_parse_yaml_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.yml",
            r#"
directories: ["/srv/www"]
aws:
  access_key_id: AKIAFILEKEY
  secret_access_key: file-secret
  bucket_name: file-bucket
  region: eu-west-1
backup_output_dir: /backups
archive_format: zip
retry:
  max_attempts: 5
"#,
        );

        let config = BackupConfig::from_file(&path).unwrap();
        assert_eq!(config.archive_format, ArchiveFormat::Zip);
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, RETRY_BASE_DELAY_MS);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{"directories": ["/a"], "backup_output_dir": "/b"}"#,
        );

        let err = BackupConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("aws"));
    }

    #[test]
    fn test_unreadable_file_mentions_path() {
        let err = BackupConfig::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.json"));
    }

    #[test]
    fn test_env_overrides_win_when_set() {
        let config: BackupConfig = serde_json::from_str(SAMPLE_JSON).unwrap();
        let overrides = EnvOverrides::from_lookup(|name| match name {
            ENV_ACCESS_KEY_ID => Some("AKIAENVKEY".to_string()),
            ENV_BUCKET_NAME => Some(String::new()),
            _ => None,
        });

        let merged = overrides.merge(config);
        assert_eq!(merged.aws.access_key_id, "AKIAENVKEY");
        assert_eq!(merged.aws.secret_access_key, "file-secret");
        assert_eq!(merged.aws.bucket_name, "file-bucket");
    }

    #[test]
    fn test_validation_rules() {
        let valid: BackupConfig = serde_json::from_str(SAMPLE_JSON).unwrap();
        assert!(valid.validate().is_ok());

        let mut config = valid.clone();
        config.directories.clear();
        assert!(config.validate().is_err());

        let mut config = valid.clone();
        config.directories.push("  ".to_string());
        assert!(config.validate().unwrap_err().to_string().contains("directories[2]"));

        let mut config = valid.clone();
        config.backup_output_dir = String::new();
        assert!(config.validate().is_err());

        let mut config = valid.clone();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid;
        config.retry.base_delay_ms = 60_000;
        config.retry.max_delay_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested/backups");
        let content = SAMPLE_JSON.replace("/backups", output.to_str().unwrap());
        let path = write(&dir, "config.json", &content);

        let config = BackupConfig::load(&path, &EnvOverrides::default()).unwrap();
        assert!(output.is_dir());
        assert_eq!(config.output_dir(), output);
    }

    #[test]
    fn test_request_and_credentials() {
        let config: BackupConfig = serde_json::from_str(SAMPLE_JSON).unwrap();

        let request = config.to_request(None);
        assert_eq!(request.sources, vec![PathBuf::from("/data/app"), PathBuf::from("/data/db")]);
        assert_eq!(request.output_dir, PathBuf::from("/backups"));
        assert_eq!(request.format, ArchiveFormat::TarGz);
        assert_eq!(config.to_request(Some(ArchiveFormat::Zip)).format, ArchiveFormat::Zip);

        let creds = config.credentials();
        assert!(creds.missing_fields().is_empty());
        assert_eq!(creds.bucket_name, "file-bucket");
    }

    #[test]
    fn test_expand_paths() {
        let config: BackupConfig = serde_json::from_str(
            &SAMPLE_JSON.replace("/data/db", "${DATA}/db").replace("/backups", "$OUT"),
        )
        .unwrap();

        let config = config.expand_paths(|name| match name {
            "DATA" => Some("/mnt/data".to_string()),
            "OUT" => Some("/mnt/backups".to_string()),
            _ => None,
        });
        assert_eq!(config.directories[1], "/mnt/data/db");
        assert_eq!(config.backup_output_dir, "/mnt/backups");
    }

    #[test]
    fn test_template_round_trips_and_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        BackupConfig::write_template(&path).unwrap();
        let loaded = BackupConfig::from_file(&path).unwrap();
        assert_eq!(loaded, BackupConfig::template());
        assert!(BackupConfig::write_template(&path).is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config: BackupConfig = serde_json::from_str(SAMPLE_JSON).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("AKIAFILEKEY"));
        assert!(!debug.contains("file-secret"));
    }
}
