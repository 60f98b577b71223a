//! Constants used throughout the intake crate.

/// Permission mode applied to every stored file (owner read/write, world read).
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Character substituted for anything outside the safe file name set.
pub const SAFE_NAME_REPLACEMENT: char = '_';

/// Default temporary root when no explicit directory is configured.
pub const DEFAULT_TEMPORARY_DIR: &str = "uploads/tmp";

/// Default permanent root when no explicit directory is configured.
pub const DEFAULT_PERMANENT_DIR: &str = "uploads/files";

/// Upper bound on collision suffixes tried before a reservation gives up.
pub(crate) const MAX_RESERVATION_ATTEMPTS: u32 = 10_000;

/// Separator placed between a file stem and its collision suffix.
pub(crate) const COLLISION_SEPARATOR: char = '-';
