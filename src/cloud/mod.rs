//! Object-storage upload.
//!
//! The uploader only depends on the [`ObjectStore`] trait: "store these bytes
//! under this key in this bucket". [`S3ObjectStore`] implements it for
//! Amazon S3 and S3-compatible servers, signing with the configured static
//! key pair only.
//!
//! ## Failure classes
//!
//! - **Bucket not found** and **authentication** errors end the upload at once
//! - **Transient** errors (network, throttling, 5xx, request timeout) are
//!   retried with exponential backoff, see [`RetryPolicy`]
//! - **Rejected** requests (other 4xx) are not retried
//!
//! Archives above [`MULTIPART_THRESHOLD`](crate::constants::MULTIPART_THRESHOLD)
//! are streamed as a multipart upload, aborted if any part fails.
//!
//! ```no_run
//! use rust_backup::cloud::{RetryPolicy, S3ObjectStore, Uploader};
//! use rust_backup::events::LogSink;
//! # use rust_backup::models::{ArchiveArtifact, ObjectStoreCredentials};
//!
//! # async fn example(artifact: ArchiveArtifact, creds: ObjectStoreCredentials) -> rust_backup::error::Result<()> {
//! let store = S3ObjectStore::new(&creds, Some("eu-west-1"), None);
//! let receipt = Uploader::new(&store, RetryPolicy::default(), &LogSink)
//!     .upload(&artifact, &creds)
//!     .await?;
//! println!("stored as {}", receipt.key);
//! # Ok(())
//! # }
//! ```

/// S3 client construction with static credentials
pub mod client;

/// Backoff policy for upload retries
pub mod retry;

/// Amazon S3 implementation of the object store
pub mod s3;

/// Object store abstraction and failure classes
pub mod store;

/// Retrying uploader
pub mod uploader;

pub use retry::RetryPolicy;
pub use s3::S3ObjectStore;
pub use store::{ObjectStore, StoreError, UploadedPart};
pub use uploader::Uploader;
