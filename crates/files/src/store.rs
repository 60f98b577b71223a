//! Filesystem seam used by the upload manager
//!
//! [`FileStore`] lists the handful of filesystem primitives the manager relies on, so the
//! decision logic can be exercised against any backing store. [`LocalFileStore`] is the
//! `std::fs` implementation used in production.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Filesystem primitives consumed by the upload manager
pub trait FileStore {
    fn exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    /// Creates a directory and any missing parents
    fn create_directory(&self, path: &Path) -> io::Result<()>;

    /// Creates an empty file, failing with `AlreadyExists` if anything is at `path`
    fn create_exclusive(&self, path: &Path) -> io::Result<()>;

    /// Moves a file, replacing whatever is at `to`
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Writes `bytes` to `path`, truncating any existing content
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Returns `path` as an absolute path
    fn absolute_path(&self, path: &Path) -> io::Result<PathBuf>;

    /// Returns the length of the file in bytes
    fn size(&self, path: &Path) -> io::Result<u64>;

    /// Reads at most `limit` bytes from the start of the file
    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>>;

    /// Lists the regular files directly inside `dir`
    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Resolves `name` under `dir`
    fn child(&self, dir: &Path, name: &str) -> PathBuf {
        dir.join(name)
    }
}

/// [`FileStore`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so a dangling link still counts as taken
        fs::symlink_metadata(path).is_ok()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_directory(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn create_exclusive(&self, path: &Path) -> io::Result<()> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if !from.is_file() {
                    return Err(rename_err);
                }
                // rename cannot cross filesystems; fall back to copy and remove
                fs::copy(from, to).map_err(|_| rename_err)?;
                fs::remove_file(from)
            }
        }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    #[cfg(unix)]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_permissions(&self, path: &Path, _mode: u32) -> io::Result<()> {
        fs::metadata(path).map(|_| ())
    }

    fn absolute_path(&self, path: &Path) -> io::Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(std::env::current_dir()?.join(path))
        }
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(limit);
        fs::File::open(path)?
            .take(limit as u64)
            .read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                children.push(entry.path());
            }
        }
        children.sort();
        Ok(children)
    }
}
