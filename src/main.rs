//! `intake` command-line front end.
//!
//! Resolves configuration once at startup, builds an [`UploadManager`] and runs a single
//! operation against it. Results are printed to stdout as a JSON:API style document;
//! logs go to stderr.

mod response;

use anyhow::Context;
use clap::{Parser, Subcommand};
use intake_files::{
    absolute_paths_from_env_value, file_mode_from_env_value, RawUpload, RootKind, UploadConfig,
    UploadError, UploadManager, UploadResult, UploadedFile, DEFAULT_PERMANENT_DIR,
    DEFAULT_TEMPORARY_DIR,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use response::{Document, PathMeta, Resource};

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Accept, store and promote uploaded files")]
struct Cli {
    /// Temporary root (overrides INTAKE_TEMPORARY_DIR)
    #[arg(long, global = true)]
    temporary_dir: Option<PathBuf>,
    /// Permanent root (overrides INTAKE_PERMANENT_DIR)
    #[arg(long, global = true)]
    permanent_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept a file already received by the transport
    Accept {
        /// Transport-side temporary path of the received bytes
        source: PathBuf,
        /// Original file name as sent by the client (defaults to the source file name)
        #[arg(long)]
        name: Option<String>,
        /// Transport status code (0 = received completely)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        error_code: i64,
        /// Media type claimed by the client
        #[arg(long)]
        media_type: Option<String>,
        /// Size in bytes reported by the transport
        #[arg(long)]
        size: Option<u64>,
    },
    /// Accept an upload record given as JSON (`-` reads stdin)
    AcceptRecord {
        /// JSON file with `name`, `tmp_name`, `error` and optional `type`/`size`
        record: PathBuf,
    },
    /// Accept an inline data URI
    AcceptDataUri {
        /// File name without extension
        base_name: String,
        /// The data URI itself, or `@<file>` to read it from a file
        data_uri: String,
    },
    /// Move a file from the temporary root to the permanent root (or --to)
    Promote {
        /// File name inside the temporary root
        name: String,
        /// Target directory (defaults to the permanent root)
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Show a single stored file
    Get {
        name: String,
        /// Look in the permanent root instead of the temporary one
        #[arg(long)]
        permanent: bool,
    },
    /// List stored files
    List {
        /// List the permanent root instead of the temporary one
        #[arg(long)]
        permanent: bool,
    },
    /// Print a path relative to the first matching registered mount
    DisplayPath { path: PathBuf },
}

/// Main entry point for the intake CLI
///
/// # Environment Variables
/// - `INTAKE_TEMPORARY_DIR`: temporary root (default: "uploads/tmp")
/// - `INTAKE_PERMANENT_DIR`: permanent root (default: "uploads/files")
/// - `INTAKE_ABSOLUTE_PATHS`: ordered mount prefixes for display paths (OS path list)
/// - `INTAKE_FILE_MODE`: octal mode for stored files (default: "0644")
///
/// # Errors
/// Returns an error if configuration is invalid, the roots cannot be initialised or the
/// command input cannot be read. Failed upload operations are reported as an error
/// document with a failure exit code instead.
fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("intake=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.temporary_dir, cli.permanent_dir)?;

    tracing::debug!(
        temporary = %config.temporary_dir().display(),
        permanent = %config.permanent_dir().display(),
        "-- Starting intake"
    );

    let manager =
        UploadManager::from_config(&config).context("failed to initialise upload directories")?;

    let document = match run(&manager, cli.command)? {
        Ok(document) => document,
        Err(err) => {
            tracing::warn!(error = %err, "upload operation failed");
            Document::upload_error(err.to_string())
        }
    };

    println!("{}", serde_json::to_string_pretty(&document)?);

    Ok(if document.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Resolve configuration from flags, then environment, then defaults.
///
/// Root paths are made absolute against the current directory so display paths line up
/// with the registered mounts.
fn resolve_config(
    temporary_flag: Option<PathBuf>,
    permanent_flag: Option<PathBuf>,
) -> anyhow::Result<UploadConfig> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;

    let temporary_dir = cwd.join(dir_setting(
        temporary_flag,
        "INTAKE_TEMPORARY_DIR",
        DEFAULT_TEMPORARY_DIR,
    ));
    let permanent_dir = cwd.join(dir_setting(
        permanent_flag,
        "INTAKE_PERMANENT_DIR",
        DEFAULT_PERMANENT_DIR,
    ));

    let absolute_paths = absolute_paths_from_env_value(
        std::env::var("INTAKE_ABSOLUTE_PATHS").ok(),
        &temporary_dir,
        &permanent_dir,
    )
    .into_iter()
    .map(|p| cwd.join(p))
    .collect();

    let file_mode = file_mode_from_env_value(std::env::var("INTAKE_FILE_MODE").ok())?;

    Ok(UploadConfig::new(
        temporary_dir,
        permanent_dir,
        absolute_paths,
        file_mode,
    )?)
}

fn dir_setting(flag: Option<PathBuf>, var: &str, default: &str) -> PathBuf {
    flag.or_else(|| {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(default))
}

/// Runs one command. The outer result carries CLI input failures, the inner one upload
/// failures that are reported as an error document.
fn run(manager: &UploadManager, command: Commands) -> anyhow::Result<UploadResult<Document>> {
    let outcome = match command {
        Commands::Accept {
            source,
            name,
            error_code,
            media_type,
            size,
        } => {
            let name = name.unwrap_or_else(|| file_name_of(&source));
            let mut upload = UploadedFile::new(name, source, error_code);
            if let Some(media_type) = media_type {
                upload = upload.with_media_type(media_type);
            }
            if let Some(size) = size {
                upload = upload.with_size(size);
            }
            manager
                .accept_upload(&upload)
                .map(|file| single(manager, &file))
        }
        Commands::AcceptRecord { record } => {
            let text = read_input(&record)?;
            let raw: RawUpload = serde_json::from_str(&text)
                .with_context(|| format!("invalid upload record in {}", record.display()))?;
            UploadedFile::try_from(raw)
                .and_then(|upload| manager.accept_upload(&upload))
                .map(|file| single(manager, &file))
        }
        Commands::AcceptDataUri {
            base_name,
            data_uri,
        } => {
            let data_uri = match data_uri.strip_prefix('@') {
                Some(path) => read_input(Path::new(path))?,
                None => data_uri,
            };
            manager
                .accept_data_uri(&base_name, &data_uri)
                .map(|stored| match stored {
                    Some(file) => single(manager, &file),
                    None => Document::no_upload(),
                })
        }
        Commands::Promote { name, to } => manager
            .get_file(RootKind::Temporary, &name)
            .and_then(|found| found.ok_or_else(|| not_found(manager, RootKind::Temporary, &name)))
            .and_then(|file| match to {
                Some(dir) => manager.promote(file, &dir),
                None => manager.promote_to_permanent(file),
            })
            .map(|file| single(manager, &file)),
        Commands::Get { name, permanent } => {
            let kind = root_kind(permanent);
            manager
                .get_file(kind, &name)
                .and_then(|found| found.ok_or_else(|| not_found(manager, kind, &name)))
                .map(|file| single(manager, &file))
        }
        Commands::List { permanent } => {
            manager
                .list_files(root_kind(permanent))
                .map(|files| Document::Collection {
                    data: files
                        .iter()
                        .map(|file| Resource::upload(file, manager.display_path(file.path())))
                        .collect(),
                })
        }
        Commands::DisplayPath { path } => Ok(Document::Meta {
            meta: PathMeta {
                path: manager.display_path(&path),
            },
        }),
    };

    Ok(outcome)
}

fn single(manager: &UploadManager, file: &intake_files::StoredFile) -> Document {
    Document::Resource {
        data: Resource::upload(file, manager.display_path(file.path())),
    }
}

fn root_kind(permanent: bool) -> RootKind {
    if permanent {
        RootKind::Permanent
    } else {
        RootKind::Temporary
    }
}

fn not_found(manager: &UploadManager, kind: RootKind, name: &str) -> UploadError {
    UploadError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!(
            "{} not found in {}",
            name,
            manager.root(kind).path().display()
        ),
    ))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
