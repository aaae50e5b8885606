use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Classified failure of a single store request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The bucket does not exist. Terminal.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// Credentials were rejected. Terminal.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The request was refused for another reason; retrying will not help.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network trouble, throttling or server-side errors. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// One finished part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i64,
    pub e_tag: String,
}

/// Object-storage surface the uploader depends on.
///
/// Small objects go through [`put_object`](ObjectStore::put_object). Large
/// ones are sent as a multipart upload: create, upload the parts in order,
/// then complete. The object only becomes visible on complete; an aborted
/// upload leaves nothing behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Start a multipart upload and return its upload id.
    async fn create_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<String, StoreError> {
        Err(StoreError::Rejected("multipart upload not supported".to_string()))
    }

    /// Upload one part and return its ETag.
    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        _part_number: i64,
        _body: Vec<u8>,
    ) -> Result<String, StoreError> {
        Err(StoreError::Rejected("multipart upload not supported".to_string()))
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        _parts: Vec<UploadedPart>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Rejected("multipart upload not supported".to_string()))
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
