//! Upload manager implementation
//!
//! [`UploadManager`] owns two directory roots and an ordered registry of mount prefixes,
//! and delegates all filesystem work to a [`FileStore`] and all extension lookups to a
//! [`MimeResolver`].
//!
//! # Intake Pipeline
//!
//! ```text
//! multipart: classify code -> sanitise name -> reserve under tmp -> move bytes -> chmod
//! data URI:  decode (or give up) -> name + .ext -> sanitise -> reserve under tmp -> write -> chmod
//! promote:   reserve under target dir -> move -> chmod
//! ```
//!
//! # Reservation
//!
//! A target name is claimed by creating an empty placeholder with create-new semantics.
//! When the name is taken the next candidate is tried (`name.ext`, `name-1.ext`,
//! `name-2.ext`, ...), so concurrent intakes of the same name never overwrite each other.
//! If the subsequent move or write fails the placeholder is removed again.

use crate::config::UploadConfig;
use crate::constants::{COLLISION_SEPARATOR, MAX_RESERVATION_ATTEMPTS};
use crate::data_uri::DataUri;
use crate::mime::{MimeGuessResolver, MimeResolver};
use crate::sanitize::sanitize_file_name;
use crate::store::{FileStore, LocalFileStore};
use crate::transfer::{classify, UploadedFile};
use crate::{UploadError, UploadResult};
use serde::Serialize;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Bytes read from a stored file when sniffing its media type
const MEDIA_TYPE_SNIFF_LEN: usize = 8192;

/// Which of the two managed roots an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Temporary,
    Permanent,
}

/// A managed directory root; always an existing directory once constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRoot {
    kind: RootKind,
    path: PathBuf,
}

impl UploadRoot {
    pub fn kind(&self) -> RootKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Handle to a file persisted by the manager
///
/// The handle is consumed by [`UploadManager::promote`]: once the bytes have moved the
/// old location is no longer reachable through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    path: PathBuf,
    name: String,
    size_bytes: u64,
    media_type: Option<String>,
}

impl StoredFile {
    /// Absolute path of the stored file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as stored on disk (sanitised, possibly with a collision suffix)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Claimed or detected media type, if any
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }
}

/// Accepts uploads into the temporary root and promotes them elsewhere
#[derive(Debug)]
pub struct UploadManager<S = LocalFileStore, M = MimeGuessResolver> {
    store: S,
    mime: M,
    temporary: UploadRoot,
    permanent: UploadRoot,
    absolute_paths: Vec<PathBuf>,
    file_mode: u32,
}

impl UploadManager {
    /// Creates a manager on the local filesystem with the `mime_guess` resolver
    ///
    /// # Errors
    ///
    /// Returns `UploadError` if either root cannot be created or is not a directory.
    pub fn from_config(config: &UploadConfig) -> UploadResult<Self> {
        Self::new(config, LocalFileStore, MimeGuessResolver)
    }
}

impl<S: FileStore, M: MimeResolver> UploadManager<S, M> {
    /// Creates a manager, initialising both roots
    ///
    /// # Errors
    ///
    /// Returns `UploadError` if:
    /// - a root path exists but is not a directory (`NotADirectory`)
    /// - a root directory cannot be created (`CreateDirectory`)
    pub fn new(config: &UploadConfig, store: S, mime: M) -> UploadResult<Self> {
        let temporary = init_root(&store, RootKind::Temporary, config.temporary_dir())?;
        let permanent = init_root(&store, RootKind::Permanent, config.permanent_dir())?;
        let absolute_paths = config
            .absolute_paths()
            .iter()
            .map(|prefix| store.absolute_path(prefix))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            store,
            mime,
            temporary,
            permanent,
            absolute_paths,
            file_mode: config.file_mode(),
        })
    }

    /// Points one root at a new directory, creating it if absent
    ///
    /// Calling this again with the same valid directory has no side effect. A failure
    /// leaves both roots untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotADirectory` if `path` exists and is not a directory, or
    /// `CreateDirectory` if it cannot be created.
    pub fn set_root(&mut self, kind: RootKind, path: &Path) -> UploadResult<&UploadRoot> {
        let root = init_root(&self.store, kind, path)?;
        let slot = match kind {
            RootKind::Temporary => &mut self.temporary,
            RootKind::Permanent => &mut self.permanent,
        };
        *slot = root;

        let root = &*slot;
        tracing::info!(kind = ?root.kind(), path = %root.path().display(), "upload root changed");
        Ok(root)
    }

    pub fn root(&self, kind: RootKind) -> &UploadRoot {
        match kind {
            RootKind::Temporary => &self.temporary,
            RootKind::Permanent => &self.permanent,
        }
    }

    /// Registered mount prefixes, in match order
    pub fn absolute_paths(&self) -> &[PathBuf] {
        &self.absolute_paths
    }

    /// Returns the file called `name` directly under a root, if it exists
    ///
    /// `name` must be a single plain path component; anything else (separators, `..`)
    /// is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but its metadata cannot be read.
    pub fn get_file(&self, kind: RootKind, name: &str) -> UploadResult<Option<StoredFile>> {
        if !is_plain_file_name(name) {
            tracing::debug!(name, "rejected lookup outside the root");
            return Ok(None);
        }

        let path = self.store.child(self.root(kind).path(), name);
        if !self.store.exists(&path) || self.store.is_directory(&path) {
            return Ok(None);
        }
        self.describe(path, None).map(Some)
    }

    /// Lists the files directly under a root, sorted by path
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be read.
    pub fn list_files(&self, kind: RootKind) -> UploadResult<Vec<StoredFile>> {
        self.store
            .list_children(self.root(kind).path())?
            .into_iter()
            .map(|path| self.describe(path, None))
            .collect()
    }

    /// Accepts a file the transport has already parked in its own temporary location
    ///
    /// # Errors
    ///
    /// Returns `UploadError` if:
    /// - the transport reported a failed transfer (`Transfer`, nothing is touched)
    /// - the sanitised name is empty (`InvalidUploadStructure`)
    /// - no collision-free name can be reserved
    /// - the bytes cannot be moved (`MoveFailed`) or permissions cannot be set
    pub fn accept_upload(&self, upload: &UploadedFile) -> UploadResult<StoredFile> {
        classify(upload.error_code())?;

        let safe_name = sanitize_file_name(upload.original_name());
        if safe_name.is_empty() {
            return Err(UploadError::InvalidUploadStructure(format!(
                "file name `{}` has no usable characters",
                upload.original_name()
            )));
        }

        let target = self.reserve(self.temporary.path(), &safe_name)?;
        let source = upload.transport_temp_path();

        if let Err(source_err) = self.store.move_file(source, &target) {
            self.release(&target);
            return Err(UploadError::MoveFailed {
                from: source.to_path_buf(),
                to: target,
                source: source_err,
            });
        }
        self.finalise_permissions(&target)?;

        let stored = self.describe(target, upload.media_type().map(str::to_owned))?;
        tracing::info!(
            original = upload.original_name(),
            stored = %stored.path.display(),
            size = stored.size_bytes,
            reported_size = ?upload.size(),
            "accepted upload"
        );
        Ok(stored)
    }

    /// Accepts an inline data URI
    ///
    /// The extension resolved from the claimed media type is appended to `base_name`
    /// before sanitising. A payload that does not decode is not an error: the call
    /// returns `Ok(None)` and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `UploadError` only for failures after a successful decode (reservation,
    /// write, permissions).
    pub fn accept_data_uri(
        &self,
        base_name: &str,
        data_uri: &str,
    ) -> UploadResult<Option<StoredFile>> {
        match self.try_accept_data_uri(base_name, data_uri) {
            Ok(stored) => Ok(Some(stored)),
            Err(UploadError::DecodeFailed(err)) => {
                tracing::warn!(base_name, error = %err, "ignoring undecodable data URI");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Accepts an inline data URI, propagating decode failures
    ///
    /// # Errors
    ///
    /// Returns `DecodeFailed` for a malformed data URI, otherwise as
    /// [`Self::accept_data_uri`].
    pub fn try_accept_data_uri(&self, base_name: &str, data_uri: &str) -> UploadResult<StoredFile> {
        let decoded = DataUri::parse(data_uri)?;

        let mut name = base_name.to_owned();
        if let Some(ext) = self.mime.extension_for_media_type(decoded.media_type()) {
            name.push('.');
            name.push_str(&ext);
        }

        let safe_name = sanitize_file_name(&name);
        if safe_name.is_empty() {
            return Err(UploadError::InvalidUploadStructure(format!(
                "file name `{name}` has no usable characters"
            )));
        }

        let target = self.reserve(self.temporary.path(), &safe_name)?;
        let media_type = decoded.media_type().to_owned();
        let charset = decoded.parameter("charset").map(str::to_owned);
        let data = decoded.into_data();

        if let Err(source) = self.store.write(&target, &data) {
            self.release(&target);
            return Err(UploadError::WriteFailed {
                path: target,
                source,
            });
        }
        self.finalise_permissions(&target)?;

        let stored = self.describe(target, Some(media_type))?;
        tracing::info!(
            base_name,
            stored = %stored.path.display(),
            size = stored.size_bytes,
            charset = ?charset,
            "accepted data URI"
        );
        Ok(stored)
    }

    /// Moves a stored file under `target_dir`, keeping its name
    ///
    /// `target_dir` is created if absent. An existing file of the same name is never
    /// replaced; a collision suffix is reserved instead.
    ///
    /// # Errors
    ///
    /// Returns `UploadError` if:
    /// - `target_dir` exists but is not a directory (`NotADirectory`)
    /// - the source no longer exists or cannot be moved (`MoveFailed`)
    pub fn promote(&self, file: StoredFile, target_dir: &Path) -> UploadResult<StoredFile> {
        // source first: a failed promote must not create `target_dir`
        if !self.store.exists(&file.path) {
            return Err(UploadError::MoveFailed {
                to: self.store.child(target_dir, &file.name),
                from: file.path,
                source: io::Error::new(io::ErrorKind::NotFound, "source file no longer exists"),
            });
        }

        let target_dir = ensure_directory(&self.store, target_dir)?;

        let target = self.reserve(&target_dir, &file.name)?;
        if let Err(source) = self.store.move_file(&file.path, &target) {
            self.release(&target);
            return Err(UploadError::MoveFailed {
                from: file.path,
                to: target,
                source,
            });
        }
        self.finalise_permissions(&target)?;

        tracing::info!(
            from = %file.path.display(),
            to = %target.display(),
            "promoted stored file"
        );
        self.describe(target, file.media_type)
    }

    /// Promotes a stored file into the permanent root
    ///
    /// # Errors
    ///
    /// See [`Self::promote`].
    pub fn promote_to_permanent(&self, file: StoredFile) -> UploadResult<StoredFile> {
        let permanent = self.permanent.path.clone();
        self.promote(file, &permanent)
    }

    /// Renders `path` relative to the first registered prefix that contains it
    ///
    /// Prefixes match whole path components only, and the path must extend beyond the
    /// prefix. Without a match the path is returned unchanged.
    pub fn display_path(&self, path: &Path) -> String {
        for prefix in &self.absolute_paths {
            if let Ok(rest) = path.strip_prefix(prefix) {
                if !rest.as_os_str().is_empty() {
                    return rest.to_string_lossy().into_owned();
                }
            }
        }
        path.to_string_lossy().into_owned()
    }

    /// Claims a collision-free path for `safe_name` under `dir`
    fn reserve(&self, dir: &Path, safe_name: &str) -> UploadResult<PathBuf> {
        let (stem, extension) = split_extension(safe_name);

        for attempt in 0..MAX_RESERVATION_ATTEMPTS {
            let candidate_name = if attempt == 0 {
                safe_name.to_owned()
            } else {
                format!("{stem}{COLLISION_SEPARATOR}{attempt}{extension}")
            };
            let candidate = self.store.child(dir, &candidate_name);

            match self.store.create_exclusive(&candidate) {
                Ok(()) => {
                    tracing::debug!(candidate = %candidate.display(), attempt, "reserved file name");
                    return Ok(candidate);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(UploadError::WriteFailed {
                        path: candidate,
                        source,
                    })
                }
            }
        }

        Err(UploadError::ReservationExhausted {
            directory: dir.to_path_buf(),
            name: safe_name.to_owned(),
        })
    }

    /// Drops a placeholder left behind by a failed intake
    fn release(&self, placeholder: &Path) {
        if let Err(err) = self.store.remove(placeholder) {
            tracing::warn!(
                path = %placeholder.display(),
                error = %err,
                "failed to remove reserved placeholder"
            );
        }
    }

    fn finalise_permissions(&self, path: &Path) -> UploadResult<()> {
        self.store
            .set_permissions(path, self.file_mode)
            .map_err(|source| UploadError::PermissionsFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    fn describe(&self, path: PathBuf, media_type: Option<String>) -> UploadResult<StoredFile> {
        let path = self.store.absolute_path(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size_bytes = self.store.size(&path)?;

        // best effort; a claimed type always wins over sniffing
        let media_type = match media_type {
            Some(claimed) => Some(claimed),
            None => self
                .store
                .read_head(&path, MEDIA_TYPE_SNIFF_LEN)
                .ok()
                .and_then(|head| infer::get(&head))
                .map(|kind| kind.mime_type().to_owned()),
        };

        Ok(StoredFile {
            path,
            name,
            size_bytes,
            media_type,
        })
    }
}

fn init_root<S: FileStore>(store: &S, kind: RootKind, path: &Path) -> UploadResult<UploadRoot> {
    let path = ensure_directory(store, path)?;
    tracing::debug!(?kind, path = %path.display(), "upload root ready");
    Ok(UploadRoot { kind, path })
}

/// Creates `path` if absent; fails if something other than a directory is there
fn ensure_directory<S: FileStore>(store: &S, path: &Path) -> UploadResult<PathBuf> {
    let path = store.absolute_path(path)?;

    if !store.exists(&path) {
        store
            .create_directory(&path)
            .map_err(|source| UploadError::CreateDirectory {
                path: path.clone(),
                source,
            })?;
    } else if !store.is_directory(&path) {
        return Err(UploadError::NotADirectory(path));
    }

    Ok(path)
}

/// True when `name` is exactly one normal path component
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Splits `name` into stem and extension (with its dot); dotfiles have no extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Helper to build a manager with roots under `<temp>/uploads`
    fn create_test_manager(temp: &TempDir) -> UploadManager {
        let base = temp.path().join("uploads");
        let config = UploadConfig::new(
            base.join("tmp"),
            base.join("files"),
            vec![base.clone()],
            0o644,
        )
        .unwrap();
        UploadManager::from_config(&config).unwrap()
    }

    /// Local store that resolves relative paths against `base` instead of the cwd
    struct RebasedStore {
        base: PathBuf,
    }

    impl FileStore for RebasedStore {
        fn exists(&self, path: &Path) -> bool {
            LocalFileStore.exists(path)
        }
        fn is_directory(&self, path: &Path) -> bool {
            LocalFileStore.is_directory(path)
        }
        fn create_directory(&self, path: &Path) -> io::Result<()> {
            LocalFileStore.create_directory(path)
        }
        fn create_exclusive(&self, path: &Path) -> io::Result<()> {
            LocalFileStore.create_exclusive(path)
        }
        fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
            LocalFileStore.move_file(from, to)
        }
        fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            LocalFileStore.write(path, bytes)
        }
        fn remove(&self, path: &Path) -> io::Result<()> {
            LocalFileStore.remove(path)
        }
        fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
            LocalFileStore.set_permissions(path, mode)
        }
        fn absolute_path(&self, path: &Path) -> io::Result<PathBuf> {
            Ok(self.base.join(path))
        }
        fn size(&self, path: &Path) -> io::Result<u64> {
            LocalFileStore.size(path)
        }
        fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
            LocalFileStore.read_head(path, limit)
        }
        fn list_children(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            LocalFileStore.list_children(dir)
        }
    }

    /// Writes a file standing in for the transport's parked upload
    fn park_upload(temp: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let incoming = temp.path().join("incoming");
        fs::create_dir_all(&incoming).unwrap();
        let path = incoming.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_roots_created_when_absent() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        assert!(manager.root(RootKind::Temporary).path().is_dir());
        assert!(manager.root(RootKind::Permanent).path().is_dir());
        assert_eq!(
            manager.root(RootKind::Temporary).kind(),
            RootKind::Temporary
        );
    }

    #[test]
    fn test_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let config = UploadConfig::new(
            blocker.clone(),
            temp.path().join("files"),
            vec![],
            0o644,
        )
        .unwrap();
        let result = UploadManager::from_config(&config);

        match result {
            Err(UploadError::NotADirectory(path)) => assert_eq!(path, blocker),
            other => panic!("expected NotADirectory, got {other:?}"),
        }
    }

    #[test]
    fn test_set_root_idempotent_and_isolated() {
        let temp = TempDir::new().unwrap();
        let mut manager = create_test_manager(&temp);
        let marker = manager.root(RootKind::Temporary).path().join("keep.txt");
        fs::write(&marker, b"x").unwrap();

        let tmp = manager.root(RootKind::Temporary).path().to_path_buf();
        manager.set_root(RootKind::Temporary, &tmp).unwrap();
        assert!(marker.exists());

        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let permanent_before = manager.root(RootKind::Permanent).clone();

        let result = manager.set_root(RootKind::Temporary, &blocker);
        assert!(matches!(result, Err(UploadError::NotADirectory(_))));
        assert_eq!(manager.root(RootKind::Temporary).path(), tmp);
        assert_eq!(manager.root(RootKind::Permanent), &permanent_before);

        let elsewhere = temp.path().join("other/perm");
        let root = manager.set_root(RootKind::Permanent, &elsewhere).unwrap();
        assert_eq!(root.path(), elsewhere);
        assert!(elsewhere.is_dir());
    }

    #[test]
    fn test_accept_upload_success() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let parked = park_upload(&temp, "upload-a1", b"Hello, World!");

        let upload = UploadedFile::new("My Report.txt", &parked, 0);
        let stored = manager.accept_upload(&upload).unwrap();

        assert_eq!(stored.name(), "My_Report.txt");
        assert_eq!(stored.size_bytes(), 13);
        assert!(stored.path().starts_with(manager.root(RootKind::Temporary).path()));
        assert_eq!(fs::read(stored.path()).unwrap(), b"Hello, World!");
        assert!(!parked.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_accept_upload_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let parked = park_upload(&temp, "upload-a2", b"x");
        fs::set_permissions(&parked, fs::Permissions::from_mode(0o600)).unwrap();

        let stored = manager
            .accept_upload(&UploadedFile::new("a.txt", &parked, 0))
            .unwrap();

        let mode = fs::metadata(stored.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_accept_upload_transfer_error_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let parked = park_upload(&temp, "upload-a3", b"partial");

        let upload = UploadedFile::new("a.txt", &parked, 3);
        let err = manager.accept_upload(&upload).unwrap_err();

        match err {
            UploadError::Transfer(e) => {
                assert_eq!(e.kind(), crate::TransferErrorKind::PartialUpload)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parked.exists());
        assert!(manager.list_files(RootKind::Temporary).unwrap().is_empty());
    }

    #[test]
    fn test_accept_upload_collision_suffix() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        let first = manager
            .accept_upload(&UploadedFile::new(
                "photo.png",
                park_upload(&temp, "p1", b"one"),
                0,
            ))
            .unwrap();
        let second = manager
            .accept_upload(&UploadedFile::new(
                "photo.png",
                park_upload(&temp, "p2", b"two"),
                0,
            ))
            .unwrap();
        let third = manager
            .accept_upload(&UploadedFile::new(
                "photo.png",
                park_upload(&temp, "p3", b"three"),
                0,
            ))
            .unwrap();

        assert_eq!(first.name(), "photo.png");
        assert_eq!(second.name(), "photo-1.png");
        assert_eq!(third.name(), "photo-2.png");
        assert_eq!(fs::read(first.path()).unwrap(), b"one");
        assert_eq!(fs::read(second.path()).unwrap(), b"two");
    }

    #[test]
    fn test_accept_upload_missing_source_is_move_failed() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        let upload = UploadedFile::new("gone.txt", temp.path().join("vanished"), 0);
        let err = manager.accept_upload(&upload).unwrap_err();

        assert!(matches!(err, UploadError::MoveFailed { .. }));
        // the reserved placeholder is released again
        assert!(manager
            .get_file(RootKind::Temporary, "gone.txt")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_accept_upload_empty_name_rejected() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let parked = park_upload(&temp, "p", b"x");

        let err = manager
            .accept_upload(&UploadedFile::new("", &parked, 0))
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidUploadStructure(_)));
    }

    #[test]
    fn test_accept_upload_media_type() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let sniffed = manager
            .accept_upload(&UploadedFile::new(
                "image",
                park_upload(&temp, "s", &png_header),
                0,
            ))
            .unwrap();
        assert_eq!(sniffed.media_type(), Some("image/png"));

        let claimed = manager
            .accept_upload(
                &UploadedFile::new("notes", park_upload(&temp, "c", b"plain"), 0)
                    .with_media_type("text/plain"),
            )
            .unwrap();
        assert_eq!(claimed.media_type(), Some("text/plain"));
    }

    #[test]
    fn test_accept_data_uri_png() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        let stored = manager
            .accept_data_uri("photo", "data:image/png;base64,iVBORw0KGgo=")
            .unwrap()
            .unwrap();

        assert_eq!(stored.name(), "photo.png");
        assert_eq!(stored.media_type(), Some("image/png"));
        assert_eq!(
            fs::read(stored.path()).unwrap(),
            vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        );
    }

    #[test]
    fn test_accept_data_uri_unresolved_extension_keeps_name() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("uploads");
        let config =
            UploadConfig::new(base.join("tmp"), base.join("files"), vec![], 0o644).unwrap();
        let manager =
            UploadManager::new(&config, LocalFileStore, |_: &str| None::<String>).unwrap();

        let stored = manager
            .accept_data_uri("my note", "data:text/plain,hi")
            .unwrap()
            .unwrap();

        assert_eq!(stored.name(), "my_note");
        assert_eq!(fs::read(stored.path()).unwrap(), b"hi");
    }

    #[test]
    fn test_accept_data_uri_invalid_returns_none() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        for bad in ["not a data uri", "data:image/png;base64", "data:image/png;base64,@@@"] {
            assert!(manager.accept_data_uri("photo", bad).unwrap().is_none());
        }
        assert!(manager.list_files(RootKind::Temporary).unwrap().is_empty());
    }

    #[test]
    fn test_try_accept_data_uri_propagates_decode_failure() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);

        let err = manager
            .try_accept_data_uri("photo", "data:image/png;base64,@@@")
            .unwrap_err();
        assert!(matches!(err, UploadError::DecodeFailed(_)));
        assert!(manager.list_files(RootKind::Temporary).unwrap().is_empty());
    }

    #[test]
    fn test_promote_moves_file() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let stored = manager
            .accept_upload(&UploadedFile::new(
                "Doc 1.pdf",
                park_upload(&temp, "d", b"%PDF"),
                0,
            ))
            .unwrap();
        let temp_path = stored.path().to_path_buf();

        let promoted = manager.promote_to_permanent(stored).unwrap();

        assert_eq!(promoted.name(), "Doc_1.pdf");
        assert!(promoted
            .path()
            .starts_with(manager.root(RootKind::Permanent).path()));
        assert!(!temp_path.exists());
        assert_eq!(fs::read(promoted.path()).unwrap(), b"%PDF");
    }

    #[test]
    fn test_promote_into_new_subdirectory_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let target = manager.root(RootKind::Permanent).path().join("2024/06");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("a.txt"), b"existing").unwrap();

        let stored = manager
            .accept_upload(&UploadedFile::new("a.txt", park_upload(&temp, "a", b"new"), 0))
            .unwrap();
        let promoted = manager.promote(stored, &target).unwrap();

        assert_eq!(promoted.name(), "a-1.txt");
        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"existing");
        assert_eq!(fs::read(promoted.path()).unwrap(), b"new");

        let fresh = temp.path().join("brand/new/dir");
        let stored = manager
            .accept_upload(&UploadedFile::new("b.txt", park_upload(&temp, "b", b"b"), 0))
            .unwrap();
        let promoted = manager.promote(stored, &fresh).unwrap();
        assert_eq!(promoted.path(), fresh.join("b.txt"));
    }

    #[test]
    fn test_promote_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let stored = manager
            .accept_data_uri("x", "data:text/plain,abc")
            .unwrap()
            .unwrap();
        fs::remove_file(stored.path()).unwrap();

        let target = temp.path().join("never/created");
        let err = manager.promote(stored, &target).unwrap_err();
        assert!(matches!(err, UploadError::MoveFailed { .. }));
        assert!(!target.exists());
        assert!(!temp.path().join("never").exists());
        assert!(manager.list_files(RootKind::Permanent).unwrap().is_empty());
    }

    #[test]
    fn test_get_file_stays_inside_root() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let secret = temp.path().join("uploads/secret.txt");
        fs::write(&secret, b"secret").unwrap();
        fs::create_dir_all(manager.root(RootKind::Temporary).path().join("sub")).unwrap();
        fs::write(
            manager.root(RootKind::Temporary).path().join("sub/inner.txt"),
            b"inner",
        )
        .unwrap();

        for name in [
            "../secret.txt",
            "..",
            ".",
            "",
            "sub/inner.txt",
            "./secret.txt",
            secret.to_str().unwrap(),
        ] {
            assert!(
                manager.get_file(RootKind::Temporary, name).unwrap().is_none(),
                "{name} should not resolve"
            );
        }
        assert_eq!(fs::read(&secret).unwrap(), b"secret");
    }

    #[test]
    fn test_relative_registry_made_absolute() {
        let temp = TempDir::new().unwrap();
        let store = RebasedStore {
            base: temp.path().to_path_buf(),
        };
        let tmp = PathBuf::from("uploads/tmp");
        let files = PathBuf::from("uploads/files");
        let registry = crate::absolute_paths_from_env_value(None, &tmp, &files);
        assert_eq!(registry, vec![PathBuf::from("uploads")]);

        let config = UploadConfig::new(tmp, files, registry, 0o644).unwrap();
        let manager = UploadManager::new(&config, store, MimeGuessResolver).unwrap();

        assert_eq!(manager.absolute_paths(), &[temp.path().join("uploads")]);
        let stored = manager
            .accept_data_uri("a", "data:text/plain,abc")
            .unwrap()
            .unwrap();
        assert_eq!(stored.path(), temp.path().join("uploads/tmp/a.txt"));
        assert_eq!(manager.display_path(stored.path()), "tmp/a.txt");
    }

    #[test]
    fn test_concurrent_intake_of_same_name() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let temp = TempDir::new().unwrap();
        let manager = Arc::new(create_test_manager(&temp));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    manager
                        .accept_data_uri("same", &format!("data:text/plain,{i}"))
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();

        let stored: Vec<StoredFile> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let paths: HashSet<&Path> = stored.iter().map(|f| f.path()).collect();

        assert_eq!(paths.len(), 16);
        assert_eq!(manager.list_files(RootKind::Temporary).unwrap().len(), 16);
        for file in &stored {
            assert_eq!(fs::read(file.path()).unwrap().len(), file.size_bytes() as usize);
        }
    }

    #[test]
    fn test_promote_into_file_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let stored = manager
            .accept_data_uri("x", "data:,abc")
            .unwrap()
            .unwrap();

        let err = manager.promote(stored, &blocker).unwrap_err();
        assert!(matches!(err, UploadError::NotADirectory(_)));
    }

    #[test]
    fn test_display_path() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        let stored = manager
            .accept_data_uri("a", "data:text/plain,abc")
            .unwrap()
            .unwrap();

        assert_eq!(manager.display_path(stored.path()), "tmp/a.txt");
        assert_eq!(
            manager.display_path(Path::new("/elsewhere/a.txt")),
            "/elsewhere/a.txt"
        );
        // the prefix itself is not a strict prefix of itself
        let base = temp.path().join("uploads");
        assert_eq!(
            manager.display_path(&base),
            base.to_string_lossy().into_owned()
        );
    }

    #[test]
    fn test_get_file_and_list_files() {
        let temp = TempDir::new().unwrap();
        let manager = create_test_manager(&temp);
        manager
            .accept_data_uri("b", "data:text/plain,bb")
            .unwrap()
            .unwrap();
        manager
            .accept_data_uri("a", "data:text/plain,a")
            .unwrap()
            .unwrap();

        let found = manager
            .get_file(RootKind::Temporary, "a.txt")
            .unwrap()
            .unwrap();
        assert_eq!(found.size_bytes(), 1);
        assert!(manager
            .get_file(RootKind::Temporary, "missing.txt")
            .unwrap()
            .is_none());
        assert!(manager
            .get_file(RootKind::Permanent, "a.txt")
            .unwrap()
            .is_none());

        let names: Vec<String> = manager
            .list_files(RootKind::Temporary)
            .unwrap()
            .into_iter()
            .map(|f| f.name().to_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("photo.png"), ("photo", ".png"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".env"), (".env", ""));
    }
}
