//! Upload runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! [`UploadManager`](crate::UploadManager). Nothing in this crate reads environment
//! variables while handling an upload; the helpers below take the raw values as
//! `Option<String>` so the caller decides where they come from.

use crate::constants::DEFAULT_FILE_MODE;
use crate::{UploadError, UploadResult};
use std::path::{Path, PathBuf};

/// Upload configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    temporary_dir: PathBuf,
    permanent_dir: PathBuf,
    absolute_paths: Vec<PathBuf>,
    file_mode: u32,
}

impl UploadConfig {
    /// Create a new `UploadConfig`.
    ///
    /// `absolute_paths` is the ordered list of mount prefixes stripped when displaying
    /// stored files; the first match wins.
    pub fn new(
        temporary_dir: PathBuf,
        permanent_dir: PathBuf,
        absolute_paths: Vec<PathBuf>,
        file_mode: u32,
    ) -> UploadResult<Self> {
        if temporary_dir.as_os_str().is_empty() {
            return Err(UploadError::InvalidConfig(
                "temporary directory cannot be empty".into(),
            ));
        }
        if permanent_dir.as_os_str().is_empty() {
            return Err(UploadError::InvalidConfig(
                "permanent directory cannot be empty".into(),
            ));
        }
        if file_mode > 0o7777 {
            return Err(UploadError::InvalidConfig(format!(
                "file mode {file_mode:o} is out of range"
            )));
        }

        Ok(Self {
            temporary_dir,
            permanent_dir,
            absolute_paths,
            file_mode,
        })
    }

    pub fn temporary_dir(&self) -> &Path {
        &self.temporary_dir
    }

    pub fn permanent_dir(&self) -> &Path {
        &self.permanent_dir
    }

    pub fn absolute_paths(&self) -> &[PathBuf] {
        &self.absolute_paths
    }

    pub fn file_mode(&self) -> u32 {
        self.file_mode
    }
}

/// Parse a permission mode from an optional octal string such as `"0644"` or `"640"`.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_FILE_MODE`].
pub fn file_mode_from_env_value(value: Option<String>) -> UploadResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let Some(value) = value else {
        return Ok(DEFAULT_FILE_MODE);
    };

    let digits = value.strip_prefix("0o").unwrap_or(&value);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| UploadError::InvalidConfig(format!("invalid file mode `{value}`: {e}")))?;

    if mode > 0o7777 {
        return Err(UploadError::InvalidConfig(format!(
            "file mode `{value}` is out of range"
        )));
    }

    Ok(mode)
}

/// Parse the absolute-path registry from an optional OS path list (`:` separated on unix).
///
/// If `value` is `None` or empty, the registry defaults to the parent directories of the
/// two roots, in that order, without duplicates.
pub fn absolute_paths_from_env_value(
    value: Option<String>,
    temporary_dir: &Path,
    permanent_dir: &Path,
) -> Vec<PathBuf> {
    let value = value.filter(|v| !v.trim().is_empty());

    let candidates: Vec<PathBuf> = match value {
        Some(list) => std::env::split_paths(&list)
            .filter(|p| !p.as_os_str().is_empty())
            .collect(),
        None => [temporary_dir, permanent_dir]
            .iter()
            .filter_map(|dir| dir.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect(),
    };

    let mut registry: Vec<PathBuf> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !registry.contains(&candidate) {
            registry.push(candidate);
        }
    }
    registry
}
