//! Transfer outcome classification
//!
//! The transport layer reports each upload with a small integer status drawn from a fixed
//! enumeration. [`classify`] turns that status into either success or a [`TransferError`]
//! carrying a stable kind and the human-readable message shown to users.
//!
//! Untyped upload records (for example a JSON body) are parsed into [`RawUpload`] and
//! validated into the typed [`UploadedFile`] at the boundary.

use crate::UploadError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Status code reported by the transport for one uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferErrorCode {
    /// No error, the file was received completely
    Ok,
    /// The file exceeds the server-wide size limit
    IniSize,
    /// The file exceeds the size limit declared by the form
    FormSize,
    /// Only part of the file was received
    Partial,
    /// No file was sent
    NoFile,
    /// The transport had no temporary directory to park the file in
    NoTmpDir,
    /// The transport failed to write the file to its temporary directory
    CantWrite,
    /// A transport extension or hook stopped the upload
    Extension,
    /// Any code outside the known enumeration
    Other(i64),
}

impl TransferErrorCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::IniSize,
            2 => Self::FormSize,
            3 => Self::Partial,
            4 => Self::NoFile,
            6 => Self::NoTmpDir,
            7 => Self::CantWrite,
            8 => Self::Extension,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::IniSize => 1,
            Self::FormSize => 2,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::NoTmpDir => 6,
            Self::CantWrite => 7,
            Self::Extension => 8,
            Self::Other(other) => other,
        }
    }
}

impl From<i64> for TransferErrorCode {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

/// Classified reason for a failed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferErrorKind {
    NoFile,
    SizeExceeded,
    PartialUpload,
    NoTempDir,
    WriteFailed,
    ExtensionStopped,
    Unknown,
}

impl TransferErrorKind {
    /// Message reported to the uploader for this kind
    pub fn message(self) -> &'static str {
        match self {
            Self::NoFile => "No file uploaded",
            Self::SizeExceeded => "The uploaded file exceeds the maximum upload size",
            Self::PartialUpload => "The uploaded file was only partially uploaded",
            Self::NoTempDir => "No temporary directory to upload the file to",
            Self::WriteFailed => "Failed to write file to disk",
            Self::ExtensionStopped | Self::Unknown => "The upload was stopped by an unknown error",
        }
    }
}

/// A transfer that the transport reported as failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransferError {
    kind: TransferErrorKind,
    code: TransferErrorCode,
    message: String,
}

impl TransferError {
    fn new(kind: TransferErrorKind, code: TransferErrorCode) -> Self {
        Self {
            kind,
            code,
            message: kind.message().to_owned(),
        }
    }

    pub fn kind(&self) -> TransferErrorKind {
        self.kind
    }

    /// The raw transport code that produced this error
    pub fn code(&self) -> TransferErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Classifies a transport status code
///
/// Size-limit codes (server-wide and form-level) share [`TransferErrorKind::SizeExceeded`];
/// a partial transfer is reported separately as [`TransferErrorKind::PartialUpload`].
///
/// # Errors
///
/// Returns a [`TransferError`] for every code other than [`TransferErrorCode::Ok`].
pub fn classify(code: TransferErrorCode) -> Result<(), TransferError> {
    let kind = match code {
        TransferErrorCode::Ok => return Ok(()),
        TransferErrorCode::NoFile => TransferErrorKind::NoFile,
        TransferErrorCode::IniSize | TransferErrorCode::FormSize => TransferErrorKind::SizeExceeded,
        TransferErrorCode::Partial => TransferErrorKind::PartialUpload,
        TransferErrorCode::NoTmpDir => TransferErrorKind::NoTempDir,
        TransferErrorCode::CantWrite => TransferErrorKind::WriteFailed,
        TransferErrorCode::Extension => TransferErrorKind::ExtensionStopped,
        TransferErrorCode::Other(_) => TransferErrorKind::Unknown,
    };

    tracing::debug!(code = code.code(), ?kind, "transfer classified as failed");
    Err(TransferError::new(kind, code))
}

/// One file as handed over by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    original_name: String,
    transport_temp_path: PathBuf,
    error_code: TransferErrorCode,
    media_type: Option<String>,
    size: Option<u64>,
}

impl UploadedFile {
    pub fn new(
        original_name: impl Into<String>,
        transport_temp_path: impl Into<PathBuf>,
        error_code: i64,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            transport_temp_path: transport_temp_path.into(),
            error_code: error_code.into(),
            media_type: None,
            size: None,
        }
    }

    /// Attaches the media type claimed by the client
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Attaches the size reported by the transport
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn transport_temp_path(&self) -> &Path {
        &self.transport_temp_path
    }

    pub fn error_code(&self) -> TransferErrorCode {
        self.error_code
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

/// Upload record as received from untyped external input
///
/// Field names follow the conventional multipart upload structure
/// (`name`, `tmp_name`, `error`, `type`, `size`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUpload {
    pub name: Option<String>,
    pub tmp_name: Option<String>,
    pub error: Option<i64>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub size: Option<u64>,
}

impl TryFrom<RawUpload> for UploadedFile {
    type Error = UploadError;

    fn try_from(raw: RawUpload) -> Result<Self, Self::Error> {
        let name = raw.name.ok_or_else(|| missing_field("name"))?;
        let tmp_name = raw.tmp_name.ok_or_else(|| missing_field("tmp_name"))?;
        let error = raw.error.ok_or_else(|| missing_field("error"))?;

        let mut upload = UploadedFile::new(name, tmp_name, error);
        upload.media_type = raw.media_type.filter(|t| !t.trim().is_empty());
        upload.size = raw.size;
        Ok(upload)
    }
}

fn missing_field(field: &str) -> UploadError {
    UploadError::InvalidUploadStructure(format!("missing field `{field}`"))
}

impl fmt::Display for TransferErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
