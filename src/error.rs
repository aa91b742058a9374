//! Error types.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for hosts file operations.
pub type Result<T> = std::result::Result<T, HostsError>;

/// Errors returned by parsing, mutation, and persistence operations.
#[derive(Debug, Error)]
pub enum HostsError {
    /// Filesystem I/O failed (missing file, `PermissionDenied`, disk full).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another process holds a live lock on the target file.
    #[error("file is locked by another process: {}", path.display())]
    Locked {
        /// The target path whose sidecar lock is held.
        path: PathBuf,
    },

    /// A lock file past the staleness threshold could not be reclaimed.
    #[error("file is locked by another process (stale lock cleanup failed): {}", path.display())]
    StaleLock {
        /// The target path whose sidecar lock is stale.
        path: PathBuf,
    },

    /// The advisory lock on the lock file descriptor was refused.
    #[error("failed to acquire file lock on {}: {source}", path.display())]
    LockAcquire {
        /// The file the lock was requested on.
        path: PathBuf,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// A writer still held the lock after the single read retry.
    #[error("file is currently being written to: {}", path.display())]
    BeingWritten {
        /// The file that was being read.
        path: PathBuf,
    },

    /// Input rejected by the validator.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A category with this name is already present.
    #[error("category '{name}' already exists")]
    CategoryExists {
        /// The duplicate category name.
        name: String,
    },
}

impl HostsError {
    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }

    /// Returns `true` for lock contention (live, unreclaimable, or in-flight writer).
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(
            self,
            Self::Locked { .. }
                | Self::StaleLock { .. }
                | Self::LockAcquire { .. }
                | Self::BeingWritten { .. }
        )
    }
}

/// The input field a [`ValidationError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ip,
    Hostname,
    Comment,
    Category,
    Description,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ip => "IP address",
            Self::Hostname => "hostname",
            Self::Comment => "comment",
            Self::Category => "category name",
            Self::Description => "category description",
        })
    }
}

/// Why a value was rejected by one of the `validate_*` functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: Field },

    #[error("invalid {field} format: {reason}")]
    Malformed { field: Field, reason: &'static str },

    #[error("{field} too long (max {max} characters)")]
    TooLong { field: Field, max: usize },

    #[error("{field} contains disallowed character {ch:?}")]
    DisallowedCharacter { field: Field, ch: char },

    #[error("{field} contains dangerous pattern {pattern:?}")]
    DangerousPattern {
        field: Field,
        pattern: &'static str,
    },

    #[error("{kind} IP addresses not allowed: {ip}")]
    ForbiddenAddress { ip: IpAddr, kind: &'static str },

    #[error("entry must have at least one hostname")]
    NoHostnames,
}

impl ValidationError {
    /// The field this failure is attributed to.
    #[must_use]
    pub const fn field(&self) -> Field {
        match self {
            Self::Empty { field }
            | Self::Malformed { field, .. }
            | Self::TooLong { field, .. }
            | Self::DisallowedCharacter { field, .. }
            | Self::DangerousPattern { field, .. } => *field,
            Self::ForbiddenAddress { .. } => Field::Ip,
            Self::NoHostnames => Field::Hostname,
        }
    }
}
