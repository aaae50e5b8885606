//! Archive formats and their writers.
//!
//! Both formats sit behind [`ArchiveWriter`], so the archiver walks the
//! source trees once and does not care which container it is filling.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path};
use std::str::FromStr;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::constants::{COMPRESSED_EXTENSIONS, COPY_CHUNK_SIZE, LARGE_FILE_COMPRESSION_THRESHOLD};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// gzip-compressed tarball
    #[default]
    #[serde(rename = "tar.gz", alias = "tgz")]
    TarGz,
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// Wrap `file` in a writer for this format.
    pub fn writer(&self, file: File) -> Box<dyn ArchiveWriter> {
        match self {
            ArchiveFormat::TarGz => Box::new(TarGzWriter::new(file)),
            ArchiveFormat::Zip => Box::new(ZipArchiveWriter::new(file)),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tar.gz" | "tgz" | "tar" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(format!("unknown archive format `{}` (expected tar.gz or zip)", other)),
        }
    }
}

/// Sink for archive members. `name` is the member path inside the archive,
/// always relative.
pub trait ArchiveWriter {
    fn add_directory(&mut self, name: &Path, source: &Path) -> io::Result<()>;

    fn add_file(&mut self, name: &Path, source: &Path) -> io::Result<()>;

    /// Store `source` as a symlink entry without following it.
    fn add_symlink(&mut self, name: &Path, source: &Path) -> io::Result<()>;

    /// Write trailers and flush everything to disk.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

struct TarGzWriter {
    builder: tar::Builder<GzEncoder<File>>,
}

impl TarGzWriter {
    fn new(file: File) -> Self {
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);
        TarGzWriter { builder }
    }
}

impl ArchiveWriter for TarGzWriter {
    fn add_directory(&mut self, name: &Path, source: &Path) -> io::Result<()> {
        self.builder.append_dir(name, source)
    }

    fn add_file(&mut self, name: &Path, source: &Path) -> io::Result<()> {
        let mut file = File::open(source)?;
        self.builder.append_file(name, &mut file)
    }

    fn add_symlink(&mut self, name: &Path, source: &Path) -> io::Result<()> {
        // follow_symlinks(false) makes this record the link itself
        self.builder.append_path_with_name(source, name)
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        let encoder = self.builder.into_inner()?;
        let file = encoder.finish()?;
        file.sync_all()
    }
}

struct ZipArchiveWriter {
    zip: ZipWriter<File>,
}

impl ZipArchiveWriter {
    fn new(file: File) -> Self {
        ZipArchiveWriter {
            zip: ZipWriter::new(file),
        }
    }
}

impl ArchiveWriter for ZipArchiveWriter {
    fn add_directory(&mut self, name: &Path, source: &Path) -> io::Result<()> {
        let options = FileOptions::default().unix_permissions(unix_mode(source).unwrap_or(0o755));
        self.zip.add_directory(format!("{}/", zip_name(name)), options)?;
        Ok(())
    }

    fn add_file(&mut self, name: &Path, source: &Path) -> io::Result<()> {
        let file = File::open(source)?;
        let size = file.metadata()?.len();
        let options = get_compression_options(source, size)
            .unix_permissions(unix_mode(source).unwrap_or(0o644));

        self.zip.start_file(zip_name(name), options)?;
        let mut reader = BufReader::with_capacity(COPY_CHUNK_SIZE, file);
        io::copy(&mut reader, &mut self.zip)?;
        Ok(())
    }

    fn add_symlink(&mut self, name: &Path, source: &Path) -> io::Result<()> {
        let target = fs::read_link(source)?;
        self.zip.add_symlink(
            zip_name(name),
            target.to_string_lossy(),
            FileOptions::default(),
        )?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        let file = self.zip.finish()?;
        file.sync_all()
    }
}

/// Pick zip options for a member.
///
/// Files that are already compressed (like JPEGs, MP3s) or very large files
/// use the fastest deflate level; everything else uses the default level.
/// Members over 4GiB switch on the ZIP64 extension.
pub fn get_compression_options(path: &Path, size: u64) -> FileOptions {
    let low_compression = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => COMPRESSED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    };
    let large_file = size > LARGE_FILE_COMPRESSION_THRESHOLD;

    let level = if low_compression || large_file { 1 } else { 6 };
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level))
        .large_file(size > u64::from(u32::MAX))
}

/// Zip member names always use `/`, whatever the host separator.
fn zip_name(name: &Path) -> String {
    name.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::symlink_metadata(path)
        .ok()
        .map(|metadata| metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_format_parsing_and_extension() {
        assert_eq!("tar.gz".parse::<ArchiveFormat>(), Ok(ArchiveFormat::TarGz));
        assert_eq!("TGZ".parse::<ArchiveFormat>(), Ok(ArchiveFormat::TarGz));
        assert_eq!("zip".parse::<ArchiveFormat>(), Ok(ArchiveFormat::Zip));
        assert!("rar".parse::<ArchiveFormat>().is_err());

        assert_eq!(ArchiveFormat::TarGz.extension(), "tar.gz");
        assert_eq!(ArchiveFormat::Zip.to_string(), "zip");
        assert_eq!(ArchiveFormat::default(), ArchiveFormat::TarGz);
    }

    #[test]
    fn test_format_serde_names() {
        let format: ArchiveFormat = serde_json::from_str("\"tar.gz\"").unwrap();
        assert_eq!(format, ArchiveFormat::TarGz);
        let format: ArchiveFormat = serde_json::from_str("\"zip\"").unwrap();
        assert_eq!(format, ArchiveFormat::Zip);
        assert_eq!(serde_json::to_string(&ArchiveFormat::TarGz).unwrap(), "\"tar.gz\"");
    }

    #[test]
    fn test_zip_name_uses_forward_slashes() {
        let name: PathBuf = ["app", "sub", "a.txt"].iter().collect();
        assert_eq!(zip_name(&name), "app/sub/a.txt");
    }

    #[test]
    fn test_zip_writer_stores_file_and_directory() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        fs::write(&source, b"hello zip").unwrap();

        let archive_path = temp_dir.path().join("out.zip");
        let mut writer = ArchiveFormat::Zip.writer(File::create(&archive_path).unwrap());
        writer.add_directory(Path::new("app"), temp_dir.path()).unwrap();
        writer.add_file(Path::new("app/a.txt"), &source).unwrap();
        writer.finish().unwrap();

        let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(archive.by_name("app/").unwrap().is_dir());

        let mut content = String::new();
        archive
            .by_name("app/a.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello zip");
    }

    #[test]
    fn test_tar_writer_stores_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        fs::write(&source, b"hello tar").unwrap();

        let archive_path = temp_dir.path().join("out.tar.gz");
        let mut writer = ArchiveFormat::TarGz.writer(File::create(&archive_path).unwrap());
        writer.add_file(Path::new("app/a.txt"), &source).unwrap();
        writer.finish().unwrap();

        let decoder = flate2::read::GzDecoder::new(File::open(&archive_path).unwrap());
        let mut archive = tar::Archive::new(decoder);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().as_ref(), Path::new("app/a.txt"));

        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello tar");
    }
}
