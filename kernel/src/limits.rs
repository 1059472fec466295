//! Compile-time capacity limits for the core subsystems.

/// Maximum length, in bytes, of an ASCII path string.
pub const MAX_PATH_LENGTH: usize = 4096;

/// Maximum length, in bytes, of a single path component (directory or file
/// name).
pub const MAX_NAME_LENGTH: usize = 32;

/// Number of slots in the VFS dentry cache.
pub const DENTRY_CACHE_SIZE: usize = 100;

/// Number of concurrent memfs instances (super-blocks) the driver can back.
pub const MEMFS_MAX_INSTANCES: usize = 5;

/// Default block size, in bytes, assigned to a freshly allocated
/// super-block before a driver's `get_sb` overrides it.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Maximum size, in bytes, of a single memfs regular file. Enforced by
/// `memfs`'s `write` and mirrored into `SuperBlock::max_file_size`.
pub const MEMFS_MAX_FILE_SIZE: usize = 16 * 1024 * 1024;
