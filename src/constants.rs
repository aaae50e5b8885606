//! Global constants for the rust-backup application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Archive constants
/// Prefix of every published archive name
pub const ARCHIVE_NAME_PREFIX: &str = "backup_";

/// chrono format for the timestamp part of an archive name (second resolution)
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Prefix of in-progress archives inside the output directory
pub const STAGING_FILE_PREFIX: &str = ".backup_";

/// Suffix of in-progress archives inside the output directory
pub const STAGING_FILE_SUFFIX: &str = ".partial";

/// Chunk size for streaming file contents into an archive (512KB)
pub const COPY_CHUNK_SIZE: usize = 512 * 1024;

/// Buffer size used when hashing a finished archive (1MB)
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Large file threshold for zip compression decisions (100MB)
pub const LARGE_FILE_COMPRESSION_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Extensions whose content is already compressed; stored at the fastest level
pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "xz", "bz2", "7z", "rar", "jpg", "jpeg", "png", "gif", "mp3", "mp4", "avi", "mov",
    "mpg", "mpeg",
];

// Timeout and retry constants
/// Maximum upload attempts (first try included)
pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Base retry delay in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Maximum retry delay in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 30;

/// Timeout for a single store request in seconds
pub const UPLOAD_ATTEMPT_TIMEOUT_SECS: u64 = 60;

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "config.json";
pub const DEFAULT_LOG_FILE_NAME: &str = "backup.log";

// Upload constants
/// Archives larger than this are sent as a multipart upload (50MB)
pub const MULTIPART_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Part size for multipart uploads (8MB); S3 requires at least 5MB per part
pub const S3_UPLOAD_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// S3 limit on the number of parts in one multipart upload
pub const MAX_MULTIPART_PARTS: u64 = 10_000;

/// Object metadata key carrying the archive digest
pub const SHA256_METADATA_KEY: &str = "sha256";

// Environment variables that override configured credentials
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_BUCKET_NAME: &str = "AWS_BUCKET_NAME";
