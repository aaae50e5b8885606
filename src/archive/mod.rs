//! Archive creation and publication.
//!
//! The [`Archiver`] writes every configured source tree into one compressed
//! file hidden in the output directory; the [`Stager`] then gives that file
//! its final timestamped name without ever overwriting an existing backup.
//!
//! ```text
//! sources ──▶ Archiver ──▶ .backup_XXXX.partial ──▶ Stager ──▶ backup_YYYYMMDD_HHMMSS.tar.gz
//! ```

mod archiver;
mod format;
mod stager;

pub use archiver::{Archiver, StagedArchive};
pub use format::{get_compression_options, ArchiveFormat, ArchiveWriter};
pub use stager::{archive_file_name, list_published, Stager};
