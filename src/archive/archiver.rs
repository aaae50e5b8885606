use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::archive::format::{ArchiveFormat, ArchiveWriter};
use crate::constants::{STAGING_FILE_PREFIX, STAGING_FILE_SUFFIX};
use crate::error::{BackupError, Result};
use crate::events::{BackupEvent, EventSink};
use crate::utils::hash::sha256_file;

/// A finished archive that has not been published yet.
///
/// The temporary file is removed when this value is dropped, so an archive
/// that never reaches the stager leaves nothing behind.
#[derive(Debug)]
pub struct StagedArchive {
    pub(crate) file: NamedTempFile,
    pub format: ArchiveFormat,
    pub created_at: DateTime<Local>,
    pub entries: usize,
    pub size: u64,
    pub sha256: String,
}

impl StagedArchive {
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }
}

/// A source directory resolved for archiving.
struct SourceRoot {
    /// Canonical directory that is walked.
    root: PathBuf,
    /// Top-level entry name: the configured directory's own basename.
    /// Empty only for the filesystem root.
    prefix: PathBuf,
}

impl SourceRoot {
    /// Entry name for `path`, a path below `root`.
    fn entry_name(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let name = if relative.as_os_str().is_empty() {
            self.prefix.clone()
        } else {
            self.prefix.join(relative)
        };
        (!name.as_os_str().is_empty()).then_some(name)
    }
}

/// Walks source directories into a single compressed archive.
pub struct Archiver<'a> {
    format: ArchiveFormat,
    events: &'a dyn EventSink,
}

impl<'a> Archiver<'a> {
    pub fn new(format: ArchiveFormat, events: &'a dyn EventSink) -> Self {
        Archiver { format, events }
    }

    /// Archive `sources` into a hidden temporary file inside `staging_dir`.
    ///
    /// Missing sources are reported and skipped. Any I/O failure removes the
    /// temporary file and yields [`BackupError::ArchiveCreation`].
    pub fn create(
        &self,
        sources: &[PathBuf],
        staging_dir: &Path,
        created_at: DateTime<Local>,
    ) -> Result<StagedArchive> {
        let start = Instant::now();
        match self.write_archive(sources, staging_dir, created_at) {
            Ok(staged) => {
                info!(
                    "Archived {} entries from {} source(s) in {:?}",
                    staged.entries,
                    sources.len(),
                    start.elapsed()
                );
                self.events.emit(BackupEvent::ArchiveCreated {
                    path: staged.temp_path().to_path_buf(),
                    entries: staged.entries,
                    size: staged.size,
                    sha256: staged.sha256.clone(),
                });
                Ok(staged)
            }
            Err(e) => {
                self.events.emit(BackupEvent::ArchiveFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn write_archive(
        &self,
        sources: &[PathBuf],
        staging_dir: &Path,
        created_at: DateTime<Local>,
    ) -> Result<StagedArchive> {
        let temp = tempfile::Builder::new()
            .prefix(STAGING_FILE_PREFIX)
            .suffix(STAGING_FILE_SUFFIX)
            .tempfile_in(staging_dir)
            .map_err(|e| {
                BackupError::archive(
                    format!("cannot create temporary archive in {}", staging_dir.display()),
                    e,
                )
            })?;

        let handle = temp
            .reopen()
            .map_err(|e| BackupError::archive("cannot open temporary archive", e))?;
        let own_path = fs::canonicalize(temp.path()).unwrap_or_else(|_| temp.path().to_path_buf());

        let mut writer = self.format.writer(handle);
        let mut entries = 0;
        let mut top_level = HashSet::new();

        for source in sources {
            let Some(resolved) = self.resolve_source(source) else {
                continue;
            };

            if !top_level.insert(resolved.prefix.clone()) {
                warn!(
                    "Top-level entry {} appears more than once in the archive",
                    resolved.prefix.display()
                );
            }

            entries += add_tree(writer.as_mut(), &resolved, &own_path)?;
        }

        writer
            .finish()
            .map_err(|e| BackupError::archive("failed to finalize archive", e))?;

        let (sha256, size) = sha256_file(temp.path())
            .map_err(|e| BackupError::archive("failed to hash archive", e))?;

        Ok(StagedArchive {
            file: temp,
            format: self.format,
            created_at,
            entries,
            size,
            sha256,
        })
    }

    /// Canonicalise a source, or report why it is skipped.
    ///
    /// The tree under the canonical path is walked, but entries are named
    /// after the configured path, so a symlinked source keeps its own name.
    fn resolve_source(&self, source: &Path) -> Option<SourceRoot> {
        let skip = |reason: &str| {
            self.events.emit(BackupEvent::DirectorySkipped {
                path: source.to_path_buf(),
                reason: reason.to_string(),
            });
            None
        };

        if !source.exists() {
            return skip("does not exist");
        }
        if !source.is_dir() {
            return skip("is not a directory");
        }

        let root = match fs::canonicalize(source) {
            Ok(root) => root,
            Err(e) => return skip(&format!("cannot be resolved: {}", e)),
        };
        let prefix = configured_basename(source)
            .or_else(|| root.file_name().map(PathBuf::from))
            .unwrap_or_default();

        Some(SourceRoot { root, prefix })
    }
}

/// Last component of `source` as written, when it is a plain name.
///
/// Trailing `/` and `.` are ignored by `components()`; a trailing `..` has
/// no name of its own, so the caller falls back to the resolved directory.
fn configured_basename(source: &Path) -> Option<PathBuf> {
    match source.components().next_back()? {
        Component::Normal(name) => Some(PathBuf::from(name)),
        _ => None,
    }
}

/// Add one source tree. Returns the number of entries written.
fn add_tree(writer: &mut dyn ArchiveWriter, source: &SourceRoot, skip_path: &Path) -> Result<usize> {
    let mut entries = 0;

    for entry in WalkDir::new(&source.root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
            BackupError::archive(format!("failed to walk {}", path), io::Error::from(e))
        })?;
        let path = entry.path();

        if path == skip_path {
            continue;
        }

        let Some(entry_name) = source.entry_name(path) else {
            continue;
        };
        let name = entry_name.as_path();

        let file_type = entry.file_type();
        let result = if file_type.is_dir() {
            writer.add_directory(name, path)
        } else if file_type.is_symlink() {
            writer.add_symlink(name, path)
        } else if file_type.is_file() {
            writer.add_file(name, path)
        } else {
            debug!("Skipping special file {}", path.display());
            continue;
        };

        result.map_err(|e| BackupError::archive(format!("failed to add {}", path.display()), e))?;
        entries += 1;
    }

    Ok(entries)
}
