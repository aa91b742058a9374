//! Sidecar lock files guarding writes to a shared file.
//!
//! A writer owns `<target>.lock` for the duration of one write. The lock file
//! is created with create-new semantics, records the owner's PID and start
//! time, and carries a non-blocking exclusive advisory lock. A lock file older
//! than [`PersistConfig::stale_lock_after`] is assumed to belong to a crashed
//! writer and is reclaimed.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::PersistConfig;
use crate::error::{HostsError, Result};
use crate::util::is_process_alive;

/// Cooperative file locking primitive.
///
/// All acquisitions are non-blocking: contention is reported as an error
/// immediately instead of waiting.
pub trait FileLock {
    /// Takes an exclusive lock on `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if any other lock is held.
    fn acquire_exclusive(&self, file: &File) -> io::Result<()>;

    /// Takes a shared lock on `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclusive lock is held.
    fn acquire_shared(&self, file: &File) -> io::Result<()>;

    /// Releases whatever lock this handle holds on `file`.
    ///
    /// # Errors
    ///
    /// Returns the OS error from the unlock call.
    fn release(&self, file: &File) -> io::Result<()>;
}

/// Platform advisory locks via `fs2` (`flock` on Unix, `LockFileEx` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisoryLock;

impl FileLock for AdvisoryLock {
    fn acquire_exclusive(&self, file: &File) -> io::Result<()> {
        fs2::FileExt::try_lock_exclusive(file)
    }

    fn acquire_shared(&self, file: &File) -> io::Result<()> {
        fs2::FileExt::try_lock_shared(file)
    }

    fn release(&self, file: &File) -> io::Result<()> {
        fs2::FileExt::unlock(file)
    }
}

/// Returns `<target>.lock`.
#[must_use]
pub fn lock_path(target: &Path) -> PathBuf {
    let mut path = OsString::from(target.as_os_str());
    path.push(".lock");
    PathBuf::from(path)
}

/// Returns `true` if a lock file currently exists next to `target`.
///
/// This is a point-in-time observation; the answer may change immediately.
#[must_use]
pub fn is_file_locked(target: &Path) -> bool {
    lock_path(target).exists()
}

/// Owner details recorded inside a lock file.
///
/// ```text
/// 12345
/// 2024-05-01T10:00:00Z
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// Process that created the lock file.
    pub pid: u32,
    /// When the lock was taken, at second precision.
    pub created: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            created: Utc::now(),
        }
    }

    /// Reads the owner record from a lock file.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Io`] if the file cannot be read, or with
    /// [`io::ErrorKind::InvalidData`] if it does not hold a valid record.
    pub fn read(lock_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(lock_path)?;
        let mut lines = content.lines();
        let pid = lines.next().and_then(|l| l.trim().parse().ok());
        let created = lines
            .next()
            .and_then(|l| DateTime::parse_from_rfc3339(l.trim()).ok());
        match (pid, created) {
            (Some(pid), Some(created)) => Ok(Self {
                pid,
                created: created.with_timezone(&Utc),
            }),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed lock file: {}", lock_path.display()),
            )
            .into()),
        }
    }

    /// Returns `true` if the recorded process is still running.
    #[must_use]
    pub fn owner_alive(&self) -> bool {
        is_process_alive(self.pid)
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.pid)?;
        writeln!(f, "{}", self.created.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// An exclusively held `<target>.lock`.
///
/// Dropping it releases the advisory lock, closes the file, and removes it.
#[derive(Debug)]
pub struct LockFile<L: FileLock = AdvisoryLock> {
    path: PathBuf,
    file: Option<File>,
    backend: L,
}

impl LockFile {
    /// Acquires the lock for `target` using [`AdvisoryLock`].
    ///
    /// # Errors
    ///
    /// See [`LockFile::acquire_with`].
    pub fn acquire(target: &Path, config: &PersistConfig) -> Result<Self> {
        Self::acquire_with(target, config, AdvisoryLock)
    }
}

impl<L: FileLock> LockFile<L> {
    /// Acquires the lock for `target` using a custom lock backend.
    ///
    /// Stale reclamation is best effort. Two writers that observe the same
    /// stale lock at once may both remove and recreate it, and then both
    /// proceed. The advisory lock does not close that window because each
    /// writer locks its own copy of the file.
    ///
    /// # Errors
    ///
    /// - [`HostsError::Locked`] if a live lock file exists.
    /// - [`HostsError::StaleLock`] if a stale lock file could not be removed.
    /// - [`HostsError::LockAcquire`] if the advisory lock is refused.
    /// - [`HostsError::Io`] if the lock file cannot be created or written.
    pub fn acquire_with(target: &Path, config: &PersistConfig, backend: L) -> Result<Self> {
        let path = lock_path(target);
        let file = create_lock_file(target, &path, config)?;

        // From here on, dropping `lock` removes the file again.
        let mut lock = Self {
            path,
            file: Some(file),
            backend,
        };
        lock.record()?;
        if let Some(file) = &lock.file {
            lock.backend
                .acquire_exclusive(file)
                .map_err(|source| HostsError::LockAcquire {
                    path: lock.path.clone(),
                    source,
                })?;
        }

        tracing::debug!(lock = %lock.path.display(), "Acquired write lock");
        Ok(lock)
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&mut self) -> io::Result<()> {
        let info = LockInfo::current();
        match self.file.as_mut() {
            Some(file) => write!(file, "{info}"),
            None => Ok(()),
        }
    }
}

impl<L: FileLock> Drop for LockFile<L> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(error) = self.backend.release(&file) {
                tracing::warn!(
                    lock = %self.path.display(),
                    error = %error,
                    "Failed to release advisory lock"
                );
            }
        }
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                tracing::warn!(
                    lock = %self.path.display(),
                    error = %error,
                    "Failed to remove lock file"
                );
            }
            _ => {}
        }
    }
}

fn create_new(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn create_lock_file(target: &Path, path: &Path, config: &PersistConfig) -> Result<File> {
    match create_new(path) {
        Ok(file) => Ok(file),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            reclaim_stale(target, path, config)
        }
        Err(error) => Err(error.into()),
    }
}

fn reclaim_stale(target: &Path, path: &Path, config: &PersistConfig) -> Result<File> {
    let locked = || HostsError::Locked {
        path: target.to_path_buf(),
    };

    // A lock that vanished between the two calls belonged to a writer that
    // just finished; report contention rather than racing for it.
    let age = lock_age(path).map_err(|_| locked())?;
    if age <= config.stale_lock_after {
        return Err(locked());
    }

    let owner = LockInfo::read(path).ok();
    tracing::warn!(
        lock = %path.display(),
        age_secs = age.as_secs(),
        owner_pid = owner.as_ref().map(|o| o.pid),
        owner_alive = owner.as_ref().map(LockInfo::owner_alive),
        "Reclaiming stale lock file"
    );

    fs::remove_file(path).map_err(|_| HostsError::StaleLock {
        path: target.to_path_buf(),
    })?;
    create_new(path).map_err(|error| {
        if error.kind() == io::ErrorKind::AlreadyExists {
            locked()
        } else {
            error.into()
        }
    })
}

fn lock_age(path: &Path) -> io::Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}
