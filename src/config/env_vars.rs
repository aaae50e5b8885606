use std::fmt;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex};

use crate::config::backup_config::BackupConfig;
use crate::constants::{ENV_ACCESS_KEY_ID, ENV_BUCKET_NAME, ENV_SECRET_ACCESS_KEY};

lazy_static! {
    // ${VAR} or $VAR
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Credential values taken from the environment.
///
/// Only non-empty variables are kept, and a kept value always wins over the
/// configuration file when merged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket_name: Option<String>,
}

impl EnvOverrides {
    /// Read the overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build overrides from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        EnvOverrides {
            access_key_id: non_empty(ENV_ACCESS_KEY_ID),
            secret_access_key: non_empty(ENV_SECRET_ACCESS_KEY),
            bucket_name: non_empty(ENV_BUCKET_NAME),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_key_id.is_none() && self.secret_access_key.is_none() && self.bucket_name.is_none()
    }

    /// Apply the overrides on top of `config`.
    pub fn merge(&self, mut config: BackupConfig) -> BackupConfig {
        if let Some(value) = &self.access_key_id {
            debug!("Using {} from the environment", ENV_ACCESS_KEY_ID);
            config.aws.access_key_id = value.clone();
        }
        if let Some(value) = &self.secret_access_key {
            debug!("Using {} from the environment", ENV_SECRET_ACCESS_KEY);
            config.aws.secret_access_key = value.clone();
        }
        if let Some(value) = &self.bucket_name {
            debug!("Using {} from the environment", ENV_BUCKET_NAME);
            config.aws.bucket_name = value.clone();
        }
        config
    }
}

impl fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("EnvOverrides")
            .field("access_key_id", &redacted(&self.access_key_id))
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// Expand `$VAR` and `${VAR}` references in a path using `lookup`.
///
/// Unknown variables are left as written.
pub fn expand_env_vars<F>(path: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !path.contains('$') {
        return path.to_string();
    }

    ENV_VAR_PATTERN
        .replace_all(path, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match lookup(name) {
                Some(value) => value,
                None => {
                    warn!("Environment variable {} is not set, leaving it unexpanded", name);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
