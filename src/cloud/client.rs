use log::warn;
use rusoto_core::{HttpClient, Region};
use rusoto_credential::StaticProvider;
use rusoto_s3::S3Client;

use crate::error::{BackupError, Result};
use crate::models::ObjectStoreCredentials;

/// Resolve the region to talk to.
///
/// A custom endpoint (S3-compatible servers) wins over the region name; an
/// unparsable region name falls back to the default region.
pub fn resolve_region(region_name: Option<&str>, endpoint: Option<&str>) -> Region {
    if let Some(endpoint) = endpoint {
        return Region::Custom {
            name: region_name.unwrap_or("us-east-1").to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        };
    }

    match region_name {
        Some(name) => match name.parse::<Region>() {
            Ok(r) => r,
            Err(_) => {
                warn!("Invalid region '{}', using default", name);
                Region::default()
            }
        },
        None => Region::default(),
    }
}

/// Create an S3 client that signs with exactly the supplied key pair.
///
/// No credential chain is consulted, so a missing key can never be papered
/// over by ambient credentials from the environment or instance metadata.
pub fn create_s3_client(
    credentials: &ObjectStoreCredentials,
    region_name: Option<&str>,
    endpoint: Option<&str>,
) -> Result<S3Client> {
    let missing = credentials.missing_fields();
    if !missing.is_empty() {
        return Err(BackupError::MissingCredentials(missing));
    }

    let provider = StaticProvider::new_minimal(
        credentials.access_key_id.clone(),
        credentials.secret_access_key.clone(),
    );
    let http_client = HttpClient::new()
        .map_err(|e| BackupError::Config(format!("failed to create HTTP client: {}", e)))?;

    Ok(S3Client::new_with(
        http_client,
        provider,
        resolve_region(region_name, endpoint),
    ))
}
