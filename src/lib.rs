//! # rust-backup
//!
//! Scheduled filesystem backups: archive a set of directories into one
//! compressed file, publish it atomically in an output directory and upload
//! it to an S3 bucket.
//!
//! ## Overview
//!
//! A run goes through three stages, driven by [`pipeline::Pipeline`]:
//!
//! 1. **Archive** — every configured directory is walked into a single
//!    `tar.gz` (or `zip`) file, hidden in the output directory while it is
//!    being written
//! 2. **Stage** — the finished file is renamed to
//!    `backup_YYYYMMDD_HHMMSS.<ext>`, never replacing an existing backup
//! 3. **Upload** — the archive is stored in the bucket under its file name,
//!    with transient failures retried
//!
//! The local archive is kept whatever the upload outcome.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_backup::archive::ArchiveFormat;
//! use rust_backup::cloud::{RetryPolicy, S3ObjectStore};
//! use rust_backup::events::LogSink;
//! use rust_backup::models::{BackupRequest, ObjectStoreCredentials};
//! use rust_backup::pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> rust_backup::error::Result<()> {
//! let creds = ObjectStoreCredentials::new("AKIA...", "secret", "my-backup-bucket");
//! let store = S3ObjectStore::new(&creds, Some("eu-west-1"), None);
//! let request = BackupRequest::new(["/data/app"], "/backups", ArchiveFormat::TarGz);
//!
//! let result = Pipeline::new(Arc::new(store), RetryPolicy::default(), Arc::new(LogSink))
//!     .run(&request, &creds, &CancellationToken::new())
//!     .await;
//! std::process::exit(result.exit_code());
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`archive`]: Archive formats, the archiver and the stager
//! - [`cloud`]: Object store abstraction, S3 implementation and retrying uploader
//! - [`pipeline`]: Stage sequencing and run outcomes
//! - [`config`]: Configuration file loading and environment overrides
//! - [`events`]: Structured events and their sinks
//! - [`security`]: Credential scrubbing for error text
//! - [`error`]: Error types
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models shared by the stages
pub mod models;

/// Archive creation and atomic publication
pub mod archive;

/// Object-storage upload (S3)
pub mod cloud;

/// Stage sequencing
pub mod pipeline;

/// Configuration management
pub mod config;

/// Structured pipeline events
pub mod events;

/// Error taxonomy
pub mod error;

/// Utility functions for hashing
pub mod utils;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
