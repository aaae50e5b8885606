//! Configuration file handling.
//!
//! The configuration is a JSON (or YAML) file naming the directories to back
//! up, the output directory and the S3 credentials. Credential fields can be
//! overridden from the environment through [`EnvOverrides`].

mod backup_config;
mod env_vars;

pub use backup_config::{AwsConfig, BackupConfig, RetryConfig};
pub use env_vars::{expand_env_vars, EnvOverrides};
