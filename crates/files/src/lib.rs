//! Upload Intake
//!
//! This crate accepts file content arriving either as a multipart upload (bytes already
//! parked by the transport in a temporary path) or as an inline data URI, and persists it
//! under a managed directory tree.
//!
//! ## Design Principles
//!
//! - Transfer failures are classified before anything touches the filesystem
//! - Destination names are sanitised to a fixed safe character set
//! - Existing files are never overwritten (a collision suffix is reserved instead)
//! - Data-URI intake is best-effort: a malformed payload yields no file, not an error
//! - Files land in the temporary root and are later moved, never copied, to a permanent place
//!
//! ## Directory Model
//!
//! ```text
//! <mount>/
//! ├── tmp/            # temporary root, every intake lands here
//! │   ├── photo.png
//! │   └── photo-1.png # collision suffix
//! └── files/          # permanent root (or any directory the caller picks)
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use intake_files::{UploadConfig, UploadManager, UploadedFile};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploadConfig::new(
//!     PathBuf::from("/srv/uploads/tmp"),
//!     PathBuf::from("/srv/uploads/files"),
//!     vec![PathBuf::from("/srv/uploads")],
//!     0o644,
//! )?;
//! let manager = UploadManager::from_config(&config)?;
//!
//! let upload = UploadedFile::new("Report 2024.pdf", "/var/spool/transport/a1b2c3", 0);
//! let stored = manager.accept_upload(&upload)?;
//! let promoted = manager.promote_to_permanent(stored)?;
//! println!("{}", manager.display_path(promoted.path()));
//! # Ok(())
//! # }
//! ```

mod config;
mod constants;
mod data_uri;
mod manager;
mod mime;
mod sanitize;
mod store;
mod transfer;

pub use config::{absolute_paths_from_env_value, file_mode_from_env_value, UploadConfig};
pub use constants::{
    DEFAULT_FILE_MODE, DEFAULT_PERMANENT_DIR, DEFAULT_TEMPORARY_DIR, SAFE_NAME_REPLACEMENT,
};
pub use data_uri::{DataUri, DataUriError};
pub use manager::{RootKind, StoredFile, UploadManager, UploadRoot};
pub use mime::{MimeGuessResolver, MimeResolver};
pub use sanitize::{safe_string, sanitize_file_name};
pub use store::{FileStore, LocalFileStore};
pub use transfer::{
    classify, RawUpload, TransferError, TransferErrorCode, TransferErrorKind, UploadedFile,
};

use std::path::PathBuf;

/// Errors that can occur while accepting, storing or promoting uploads
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The upload record handed over by the transport is missing a required field
    #[error("Invalid file structure provided: {0}")]
    InvalidUploadStructure(String),

    /// The transport reported a failed transfer
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Moving bytes from one place to another failed
    #[error("Could not move the uploaded file {} to {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing decoded bytes to disk failed
    #[error("Failed to write file {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A root or destination path exists but is not a directory
    #[error("Could not set upload directory: {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// A root or destination directory could not be created
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Final permissions could not be applied to a stored file
    #[error("Failed to set permissions on {}: {source}", .path.display())]
    PermissionsFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every collision-free candidate name was already taken
    #[error("No free file name left for {name} in {}", .directory.display())]
    ReservationExhausted { directory: PathBuf, name: String },

    /// A data URI could not be decoded
    #[error("Failed to decode data URI: {0}")]
    DecodeFailed(#[from] DataUriError),

    /// Configuration values were rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;
