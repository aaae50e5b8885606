use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::io::AsyncReadExt;
use tokio::time::{sleep, timeout};

use crate::cloud::retry::RetryPolicy;
use crate::cloud::store::{ObjectStore, StoreError, UploadedPart};
use crate::constants::{MAX_MULTIPART_PARTS, MULTIPART_THRESHOLD, S3_UPLOAD_CHUNK_SIZE, SHA256_METADATA_KEY};
use crate::error::{BackupError, Result};
use crate::events::{AttemptOutcome, BackupEvent, EventSink};
use crate::models::{ArchiveArtifact, ObjectStoreCredentials, UploadReceipt};
use crate::security::scrub_known_secrets;

/// Outcome of one attempt: local I/O failures end the upload, store
/// failures go through the retry policy.
type AttemptResult = Result<std::result::Result<(), StoreError>>;

/// Uploads published artifacts, retrying transient failures.
///
/// Every attempt produces exactly one [`BackupEvent::UploadAttempt`]. Archives
/// above the multipart threshold are streamed from disk one part at a time;
/// a failed multipart attempt is aborted so no partial object remains. The
/// local artifact is never removed.
pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    policy: RetryPolicy,
    events: &'a dyn EventSink,
    multipart_threshold: u64,
    part_size: u64,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn ObjectStore, policy: RetryPolicy, events: &'a dyn EventSink) -> Self {
        Uploader {
            store,
            policy,
            events,
            multipart_threshold: MULTIPART_THRESHOLD,
            part_size: S3_UPLOAD_CHUNK_SIZE,
        }
    }

    /// Override when multipart kicks in and how large each part is.
    pub fn with_multipart(mut self, threshold: u64, part_size: u64) -> Self {
        self.multipart_threshold = threshold;
        self.part_size = part_size.max(1);
        self
    }

    /// Upload `artifact` to the credentials' bucket under its file name.
    ///
    /// Blank credentials fail with [`BackupError::MissingCredentials`]
    /// before the store is touched.
    pub async fn upload(
        &self,
        artifact: &ArchiveArtifact,
        credentials: &ObjectStoreCredentials,
    ) -> Result<UploadReceipt> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            return Err(BackupError::MissingCredentials(missing));
        }

        let key = artifact
            .file_name()
            .ok_or_else(|| unreadable(&artifact.path, io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name")))?
            .to_string();

        let size = tokio::fs::metadata(&artifact.path)
            .await
            .map_err(|e| unreadable(&artifact.path, e))?
            .len();

        let mut metadata = HashMap::new();
        metadata.insert(SHA256_METADATA_KEY.to_string(), artifact.sha256.clone());

        let bucket = credentials.bucket_name.as_str();
        let max_attempts = self.policy.attempts();
        let multipart = size > self.multipart_threshold;
        debug!(
            "Uploading {} ({} bytes{}) to s3://{}/{}",
            artifact.path.display(),
            size,
            if multipart { ", multipart" } else { "" },
            bucket,
            key
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = Instant::now();
            let result = if multipart {
                self.put_multipart(&artifact.path, bucket, &key, size, &metadata).await?
            } else {
                self.put_single(&artifact.path, bucket, &key, &metadata).await?
            };
            let latency = start.elapsed();

            let error = match result {
                Ok(()) => {
                    self.record(&key, attempt, AttemptOutcome::Succeeded, latency);
                    return Ok(UploadReceipt {
                        key,
                        bucket: bucket.to_string(),
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            let reason = scrub_known_secrets(&error.to_string(), credentials);

            if let StoreError::Transient(_) = error {
                if attempt < max_attempts {
                    let retry_in = self.policy.delay_after(attempt);
                    self.record(
                        &key,
                        attempt,
                        AttemptOutcome::Retrying { reason, retry_in },
                        latency,
                    );
                    sleep(retry_in).await;
                    continue;
                }
            }

            self.record(
                &key,
                attempt,
                AttemptOutcome::Failed {
                    reason: reason.clone(),
                },
                latency,
            );

            return Err(match error {
                StoreError::BucketNotFound(_) => BackupError::BucketNotFound(bucket.to_string()),
                StoreError::Authentication(_) => BackupError::Authentication(reason),
                StoreError::Rejected(_) => BackupError::UploadRejected(reason),
                StoreError::Transient(_) => BackupError::TransientNetwork {
                    attempts: attempt,
                    reason,
                },
            });
        }
    }

    /// One PUT with the whole file, read fresh for this attempt.
    async fn put_single(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        metadata: &HashMap<String, String>,
    ) -> AttemptResult {
        let body = tokio::fs::read(path).await.map_err(|e| unreadable(path, e))?;
        Ok(self
            .bounded(self.store.put_object(bucket, key, body, metadata.clone()))
            .await)
    }

    /// Create, send every part in order, complete. Any failure after the
    /// upload was created aborts it.
    async fn put_multipart(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        size: u64,
        metadata: &HashMap<String, String>,
    ) -> AttemptResult {
        let upload_id = match self
            .bounded(self.store.create_multipart_upload(bucket, key, metadata.clone()))
            .await
        {
            Ok(upload_id) => upload_id,
            Err(e) => return Ok(Err(e)),
        };

        let completed = match self.send_parts(path, bucket, key, &upload_id, size).await {
            Ok(Ok(parts)) => {
                self.bounded(self.store.complete_multipart_upload(bucket, key, &upload_id, parts))
                    .await
            }
            Ok(Err(e)) => Err(e),
            Err(e) => {
                self.abort(bucket, key, &upload_id).await;
                return Err(e);
            }
        };

        if completed.is_err() {
            self.abort(bucket, key, &upload_id).await;
        }
        Ok(completed)
    }

    async fn send_parts(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<std::result::Result<Vec<UploadedPart>, StoreError>> {
        let part_size = part_size_for(size, self.part_size);
        let mut file = tokio::fs::File::open(path).await.map_err(|e| unreadable(path, e))?;
        let mut parts = Vec::new();
        let mut offset = 0;
        let mut part_number = 1;

        while offset < size {
            let len = part_size.min(size - offset) as usize;
            let mut buffer = vec![0u8; len];
            file.read_exact(&mut buffer).await.map_err(|e| unreadable(path, e))?;

            match self
                .bounded(self.store.upload_part(bucket, key, upload_id, part_number, buffer))
                .await
            {
                Ok(e_tag) => parts.push(UploadedPart { part_number, e_tag }),
                Err(e) => return Ok(Err(e)),
            }
            offset += len as u64;
            part_number += 1;
        }

        debug!("Sent {} part(s) of {}", parts.len(), key);
        Ok(Ok(parts))
    }

    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(e) = self
            .bounded(self.store.abort_multipart_upload(bucket, key, upload_id))
            .await
        {
            warn!("Failed to abort multipart upload of {}: {}", key, e);
        }
    }

    /// Apply the per-request timeout; a timeout counts as transient.
    async fn bounded<T, F>(&self, request: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match timeout(self.policy.attempt_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "request timed out after {:?}",
                self.policy.attempt_timeout
            ))),
        }
    }

    fn record(&self, key: &str, attempt: u32, outcome: AttemptOutcome, latency: Duration) {
        self.events.emit(BackupEvent::UploadAttempt {
            key: key.to_string(),
            attempt,
            max_attempts: self.policy.attempts(),
            outcome,
            latency,
        });
    }
}

/// Smallest part size that keeps `size` within the part-count limit.
fn part_size_for(size: u64, preferred: u64) -> u64 {
    preferred.max((size + MAX_MULTIPART_PARTS - 1) / MAX_MULTIPART_PARTS)
}

fn unreadable(path: &Path, source: io::Error) -> BackupError {
    BackupError::ArtifactUnreadable {
        path: path.to_path_buf(),
        source,
    }
}
