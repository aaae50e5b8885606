use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use log::debug;
use rusoto_core::{ByteStream, RusotoError};
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedMultipartUpload,
    CompletedPart, CreateMultipartUploadRequest, PutObjectRequest, S3Client, UploadPartRequest, S3,
};
use tokio::sync::OnceCell;

use crate::cloud::client::create_s3_client;
use crate::cloud::store::{ObjectStore, StoreError, UploadedPart};
use crate::error::BackupError;
use crate::models::ObjectStoreCredentials;
use crate::security::safe_error_message;

/// S3 error codes that mean the caller is not who it claims to be.
const AUTH_ERROR_CODES: &[&str] = &[
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "AccessDenied",
    "ExpiredToken",
    "InvalidToken",
    "AuthorizationHeaderMalformed",
];

/// S3 error codes worth another attempt. `NoSuchUpload` means the multipart
/// upload expired or was aborted; the next attempt starts a fresh one.
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "RequestTimeout",
    "RequestTimeTooSkewed",
    "SlowDown",
    "InternalError",
    "ServiceUnavailable",
    "NoSuchUpload",
];

/// [`ObjectStore`] backed by Amazon S3 or an S3-compatible server.
///
/// The client is built on first use, so a store can be handed to the
/// pipeline before its credentials have been checked.
pub struct S3ObjectStore {
    credentials: ObjectStoreCredentials,
    region_name: Option<String>,
    endpoint: Option<String>,
    client: OnceCell<S3Client>,
}

impl S3ObjectStore {
    pub fn new(
        credentials: &ObjectStoreCredentials,
        region_name: Option<&str>,
        endpoint: Option<&str>,
    ) -> Self {
        S3ObjectStore {
            credentials: credentials.clone(),
            region_name: region_name.map(str::to_string),
            endpoint: endpoint.map(str::to_string),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&S3Client, StoreError> {
        self.client
            .get_or_try_init(|| async {
                create_s3_client(
                    &self.credentials,
                    self.region_name.as_deref(),
                    self.endpoint.as_deref(),
                )
                .map_err(|e| {
                    let message = safe_error_message("Failed to set up S3 client", &e, &self.credentials);
                    match e {
                        BackupError::MissingCredentials(_) => StoreError::Authentication(message),
                        _ => StoreError::Rejected(message),
                    }
                })
            })
            .await
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let size = body.len();
        let start = Instant::now();

        let request = PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_length: Some(size as i64),
            body: Some(ByteStream::from(body)),
            metadata: Some(metadata),
            ..Default::default()
        };

        self.client()
            .await?
            .put_object(request)
            .await
            .map_err(classify_error)?;

        debug!(
            "PUT s3://{}/{} ({} bytes) in {:?}",
            bucket,
            key,
            size,
            start.elapsed()
        );
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, StoreError> {
        let output = self
            .client()
            .await?
            .create_multipart_upload(CreateMultipartUploadRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                metadata: Some(metadata),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;

        let upload_id = output
            .upload_id
            .ok_or_else(|| StoreError::Transient("no upload id returned".to_string()))?;
        debug!("Started multipart upload {} for s3://{}/{}", upload_id, bucket, key);
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i64,
        body: Vec<u8>,
    ) -> Result<String, StoreError> {
        let size = body.len();
        let output = self
            .client()
            .await?
            .upload_part(UploadPartRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                part_number,
                content_length: Some(size as i64),
                body: Some(ByteStream::from(body)),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;

        debug!("Uploaded part {} ({} bytes) of {}", part_number, size, key);
        output
            .e_tag
            .ok_or_else(|| StoreError::Transient(format!("no ETag returned for part {}", part_number)))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<(), StoreError> {
        let parts = parts
            .into_iter()
            .map(|part| CompletedPart {
                e_tag: Some(part.e_tag),
                part_number: Some(part.part_number),
            })
            .collect();

        self.client()
            .await?
            .complete_multipart_upload(CompleteMultipartUploadRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                multipart_upload: Some(CompletedMultipartUpload { parts: Some(parts) }),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;

        debug!("Completed multipart upload {} for s3://{}/{}", upload_id, bucket, key);
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        self.client()
            .await?
            .abort_multipart_upload(AbortMultipartUploadRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                ..Default::default()
            })
            .await
            .map_err(classify_error)?;
        Ok(())
    }
}

/// Map a rusoto failure onto the uploader's retry classes.
pub fn classify_error<E>(error: RusotoError<E>) -> StoreError
where
    E: std::error::Error + 'static,
{
    match error {
        RusotoError::Unknown(response) => {
            classify_response(response.status.as_u16(), response.body_as_str())
        }
        RusotoError::Credentials(e) => StoreError::Authentication(e.to_string()),
        RusotoError::HttpDispatch(e) => StoreError::Transient(e.to_string()),
        RusotoError::Validation(msg) => StoreError::Rejected(msg),
        RusotoError::Service(e) => StoreError::Rejected(e.to_string()),
        other => StoreError::Transient(other.to_string()),
    }
}

/// Classify a raw S3 error response by status and error code.
pub fn classify_response(status: u16, body: &str) -> StoreError {
    let code = error_code(body);
    let reason = match code {
        Some(code) => format!("{} (HTTP {})", code, status),
        None => format!("HTTP {}", status),
    };

    match code {
        Some("NoSuchBucket") => return StoreError::BucketNotFound(reason),
        Some(code) if AUTH_ERROR_CODES.contains(&code) => {
            return StoreError::Authentication(reason)
        }
        Some(code) if TRANSIENT_ERROR_CODES.contains(&code) => {
            return StoreError::Transient(reason)
        }
        _ => {}
    }

    match status {
        401 | 403 => StoreError::Authentication(reason),
        // PUT object only 404s when the bucket is missing
        404 => StoreError::BucketNotFound(reason),
        408 | 429 | 500..=599 => StoreError::Transient(reason),
        _ => StoreError::Rejected(reason),
    }
}

/// Pull `<Code>...</Code>` out of an S3 XML error body.
fn error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let end = body[start..].find("</Code>")? + start;
    Some(body[start..end].trim())
}
