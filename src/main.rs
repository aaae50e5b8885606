use std::fs::OpenOptions;
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use rust_backup::cli::{Args, Commands};
use rust_backup::cloud::S3ObjectStore;
use rust_backup::config::{BackupConfig, EnvOverrides};
use rust_backup::error::BackupError;
use rust_backup::events::LogSink;
use rust_backup::pipeline::{Pipeline, PipelineResult};

/// Exit status when the configuration cannot be loaded.
const EXIT_CONFIG_ERROR: i32 = 1;

fn main() {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if let Err(e) = initialize_logging(args.verbose, &args.log_file) {
        eprintln!("{:#}", e);
        process::exit(EXIT_CONFIG_ERROR);
    }

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<BackupError>() {
            Some(backup_error) => {
                error!("{} [{}]", backup_error, backup_error.kind());
                backup_error.exit_code()
            }
            None => {
                error!("{:#}", e);
                EXIT_CONFIG_ERROR
            }
        },
    };

    log::logger().flush();
    process::exit(code);
}

/// Log to the terminal and append the same lines to `log_file`.
fn initialize_logging(verbose: bool, log_file: &Path) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("rusoto_core")
        .build();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .context(format!("Failed to open log file: {}", log_file.display()))?;

    CombinedLogger::init(vec![
        TermLogger::new(log_level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(log_level, config, file),
    ])
    .context("Failed to initialize logger")?;
    Ok(())
}

fn run(args: &Args) -> Result<i32> {
    match &args.command {
        Some(Commands::InitConfig { path }) => {
            BackupConfig::write_template(path)?;
            info!("Template configuration written to {}", path.display());
            Ok(0)
        }
        Some(Commands::Validate) => {
            BackupConfig::load_checked(&args.config, &EnvOverrides::from_env())?;
            info!("Configuration {} is valid", args.config.display());
            Ok(0)
        }
        Some(Commands::Run) | None => run_backup(args),
    }
}

fn run_backup(args: &Args) -> Result<i32> {
    info!("Starting backup run");

    let config = BackupConfig::load_checked(&args.config, &EnvOverrides::from_env())?;
    let request = config.to_request(args.archive_format());
    let credentials = config.credentials();

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    // the S3 client is built on first request, after the pipeline has
    // checked the credentials
    let store = S3ObjectStore::new(
        &credentials,
        config.aws.region.as_deref(),
        config.aws.endpoint.as_deref(),
    );

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

        let pipeline = Pipeline::new(Arc::new(store), config.retry_policy(), Arc::new(LogSink));
        let result = pipeline.run(&request, &credentials, &cancel).await;

        watcher.abort();
        result
    });

    match &result {
        PipelineResult::Success { artifact, .. } => {
            info!("Backup finished: {}", artifact.path.display())
        }
        PipelineResult::Cancelled {
            artifact: Some(artifact),
            ..
        } => warn!("Backup cancelled before upload, archive kept at {}", artifact.path.display()),
        other => warn!("Backup finished in state: {}", other.state()),
    }
    Ok(result.exit_code())
}

/// Cancel `token` on the first Ctrl-C. The running stage is allowed to finish.
async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, stopping after the current stage");
        token.cancel();
    }
}
