//! Test utilities for rust-backup
//!
//! This module provides common testing helpers for use across all test
//! modules.

#![cfg(test)]

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use std::fs::{self, File};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

use crate::archive::{archive_file_name, ArchiveFormat};
use crate::models::ArchiveArtifact;
use crate::utils::hash::sha256_file;

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a temporary file with the given content
pub fn create_temp_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    use std::io::Write;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

/// Creates a test file structure under `app/` in a temporary directory
pub fn create_test_file_structure() -> Result<TempDir> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path().join("app");

    // Create directory structure
    fs::create_dir_all(base_path.join("dir1/subdir1"))?;
    fs::create_dir_all(base_path.join("dir2"))?;
    fs::create_dir_all(base_path.join("empty"))?;

    // Create test files
    fs::write(base_path.join("file1.txt"), b"Test content 1")?;
    fs::write(base_path.join("file2.log"), b"Test log content")?;
    fs::write(base_path.join("dir1/file3.txt"), b"Test content 3")?;
    fs::write(base_path.join("dir1/subdir1/file4.txt"), b"Test content 4")?;
    fs::write(base_path.join("dir2/file5.log"), b"Another log file")?;

    Ok(temp_dir)
}

/// Local timestamp for fixed-clock tests
pub fn fixed_time(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("unambiguous local time")
}

/// Member names of an archive in stored order, without trailing `/` on directories
pub fn archive_entry_names(path: &Path, format: ArchiveFormat) -> Vec<String> {
    let file = File::open(path).expect("open archive");
    let names: Vec<String> = match format {
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(file).expect("read zip");
            (0..archive.len())
                .map(|i| archive.by_index(i).expect("zip entry").name().to_string())
                .collect()
        }
        ArchiveFormat::TarGz => {
            let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
            archive
                .entries()
                .expect("read tar")
                .map(|entry| {
                    let entry = entry.expect("tar entry");
                    let path = entry.path().expect("tar entry path");
                    path.to_string_lossy().into_owned()
                })
                .collect()
        }
    };

    names
        .into_iter()
        .map(|name| name.trim_end_matches('/').to_string())
        .collect()
}

/// Writes a small published-looking archive into `dir`
pub fn publish_sample_artifact(dir: &Path) -> ArchiveArtifact {
    let created_at = fixed_time(2024, 1, 15, 14, 30, 52);
    let path = dir.join(archive_file_name(&created_at, ArchiveFormat::TarGz));
    fs::write(&path, b"not really a tarball, but the uploader does not care").expect("write artifact");
    let (sha256, size) = sha256_file(&path).expect("hash artifact");

    ArchiveArtifact {
        path,
        created_at,
        sha256,
        size,
        entries: 1,
    }
}
