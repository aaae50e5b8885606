use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::archive::ArchiveFormat;
use crate::constants::{DEFAULT_CONFIG_NAME, DEFAULT_LOG_FILE_NAME};

/// Command-line arguments for the rust-backup tool.
///
/// Without a subcommand a single backup run is performed, the same as
/// `rust-backup run`.
#[derive(Parser, Debug)]
#[clap(
    name = "rust-backup",
    version,
    about = "Archive directories and upload the backup to S3"
)]
pub struct Args {
    /// Path to the JSON or YAML configuration file
    #[clap(short = 'c', long, default_value = DEFAULT_CONFIG_NAME)]
    pub config: PathBuf,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// File that receives a copy of every log line
    #[clap(long, default_value = DEFAULT_LOG_FILE_NAME)]
    pub log_file: PathBuf,

    /// Archive format, overriding the configuration file
    #[clap(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    pub fn archive_format(&self) -> Option<ArchiveFormat> {
        self.format.map(ArchiveFormat::from)
    }
}

/// Archive formats accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    /// gzip-compressed tarball
    #[value(name = "tar.gz", alias = "tgz")]
    TarGz,
    /// zip archive
    Zip,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::TarGz => ArchiveFormat::TarGz,
            FormatArg::Zip => ArchiveFormat::Zip,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Archive the configured directories and upload the result
    Run,

    /// Load and validate the configuration, then exit
    Validate,

    /// Write a template configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = DEFAULT_CONFIG_NAME)]
        path: PathBuf,
    },
}
