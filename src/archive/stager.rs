use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

use crate::archive::archiver::StagedArchive;
use crate::archive::format::ArchiveFormat;
use crate::constants::{ARCHIVE_NAME_PREFIX, ARCHIVE_TIMESTAMP_FORMAT};
use crate::error::{BackupError, Result};
use crate::events::{BackupEvent, EventSink};
use crate::models::ArchiveArtifact;

/// Final file name for an archive created at `created_at`,
/// e.g. `backup_20240115_143052.tar.gz`.
pub fn archive_file_name(created_at: &DateTime<Local>, format: ArchiveFormat) -> String {
    format!(
        "{}{}.{}",
        ARCHIVE_NAME_PREFIX,
        created_at.format(ARCHIVE_TIMESTAMP_FORMAT),
        format.extension()
    )
}

/// Publishes staged archives into the output directory.
///
/// Publishing never replaces an existing file: the temporary archive is
/// linked under its final name only if that name is free, so readers either
/// see a complete archive or nothing.
pub struct Stager<'a> {
    events: &'a dyn EventSink,
}

impl<'a> Stager<'a> {
    pub fn new(events: &'a dyn EventSink) -> Self {
        Stager { events }
    }

    /// Move `staged` into `output_dir` under its timestamped name.
    ///
    /// The staged file must live on the same filesystem as `output_dir`.
    /// An existing file with the same name yields
    /// [`BackupError::NameCollision`] and is left untouched.
    pub fn publish(&self, staged: StagedArchive, output_dir: &Path) -> Result<ArchiveArtifact> {
        let final_path = output_dir.join(archive_file_name(&staged.created_at, staged.format));

        let StagedArchive {
            file,
            created_at,
            entries,
            size,
            sha256,
            ..
        } = staged;

        file.persist_noclobber(&final_path).map_err(|e| {
            // the returned NamedTempFile is dropped here, removing the temp copy
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                BackupError::NameCollision(final_path.clone())
            } else {
                BackupError::archive(
                    format!("failed to publish archive as {}", final_path.display()),
                    e.error,
                )
            }
        })?;

        sync_directory(output_dir);

        self.events.emit(BackupEvent::ArtifactStaged {
            path: final_path.clone(),
        });

        Ok(ArchiveArtifact {
            path: final_path,
            created_at,
            sha256,
            size,
            entries,
        })
    }
}

/// Flush the directory entry so the new name survives a crash.
fn sync_directory(dir: &Path) {
    #[cfg(unix)]
    {
        if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
            debug!("Could not sync directory {}: {}", dir.display(), e);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}

/// Published archives in `output_dir`, oldest first.
pub fn list_published(output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archives = fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with(ARCHIVE_NAME_PREFIX))
                    .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    archives.sort();
    Ok(archives)
}
