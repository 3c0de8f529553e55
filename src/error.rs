//! Error types for the session layer.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for all session operations.
pub type PogsResult<T> = Result<T, PogsError>;

/// Errors that can occur while driving the native solver.
#[derive(Error, Debug)]
pub enum PogsError {
    /// A settings or objective parameter failed validation
    #[error("invalid value for `{name}`: {reason}")]
    InvalidParameter {
        /// Field that rejected the value
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// An index range resolved to something unusable
    #[error("index range [{start}, {end}) is invalid for an encoding of length {len}")]
    InvalidRange {
        /// Resolved start (after negative-offset handling)
        start: isize,
        /// Resolved end (after negative-offset handling)
        end: isize,
        /// Encoding length
        len: usize,
    },

    /// Two buffers that must agree in length do not
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// A cached array does not have the shape the solver variant expects
    #[error("cache entry `{key}` has length {got}, expected {expected}")]
    ShapeMismatch {
        /// Archive key
        key: String,
        /// Length required by the variant
        expected: usize,
        /// Length found in the cache
        got: usize,
    },

    /// A required cache entry is absent from both tiers
    #[error("cache has no entry for key `{0}`")]
    MissingEntry(String),

    /// A cache entry exists but holds the wrong kind of value
    #[error("cache entry `{key}` is not {expected}")]
    WrongValueKind {
        /// Archive key
        key: String,
        /// What the caller needed ("an array", "a scalar", ...)
        expected: &'static str,
    },

    /// An operation that needs a live native solver found none
    #[error("no live native solver ({0})")]
    NoSolver(&'static str),

    /// The native solver reported a nonzero status
    #[error("native solver error {code} during {phase}")]
    Native {
        /// Status code returned by the native call
        code: u32,
        /// Native entry point that failed
        phase: &'static str,
    },

    /// The native solver library could not be loaded
    #[error("native solver library unavailable: {0}")]
    LibraryNotFound(String),

    /// Save target directory does not exist
    #[error("directory `{0}` does not exist")]
    MissingDirectory(PathBuf),

    /// Save target file already exists; refusing to overwrite
    #[error("file `{0}` already exists and would be overwritten, aborting")]
    AlreadyExists(PathBuf),

    /// Filesystem error outside the lenient load path
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Archive encode/decode failure outside the lenient load path
    #[error("archive serialization failed: {0}")]
    Archive(#[from] serde_json::Error),
}
