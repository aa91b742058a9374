//! Crash-safe writes and lock-aware reads.
//!
//! A write holds `<target>.lock` (see [`crate::lock`]), streams into a hidden
//! temp file next to the target, fsyncs it, and renames it over the target.
//! Readers therefore see either the complete old file or the complete new one.
//! Every early return unwinds through drop guards: the temp file is deleted
//! first, then the lock is released and its file removed.

use std::fs::{self, File, Permissions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::config::PersistConfig;
use crate::error::{HostsError, Result};
use crate::lock::{AdvisoryLock, FileLock, LockFile, lock_path};
use crate::model::HostsFile;

/// An in-progress replacement of a target file.
///
/// Bytes written go to a temp file in the target's directory. Nothing is
/// visible at the target until [`commit`](Self::commit); dropping the writer
/// without committing discards the temp file.
#[derive(Debug)]
pub struct AtomicFileWriter<L: FileLock = AdvisoryLock> {
    target: PathBuf,
    // Field order is drop order: temp file before lock.
    temp: NamedTempFile,
    lock: LockFile<L>,
}

impl AtomicFileWriter {
    /// Locks `target` and opens a temp file beside it.
    ///
    /// # Errors
    ///
    /// Returns any lock error from [`LockFile::acquire`], or
    /// [`HostsError::Io`] if the temp file cannot be prepared.
    pub fn new(target: impl AsRef<Path>, config: &PersistConfig) -> Result<Self> {
        Self::with_lock(target, config, AdvisoryLock)
    }
}

impl<L: FileLock> AtomicFileWriter<L> {
    /// Like [`AtomicFileWriter::new`] with a custom lock backend.
    ///
    /// # Errors
    ///
    /// See [`AtomicFileWriter::new`].
    pub fn with_lock(target: impl AsRef<Path>, config: &PersistConfig, backend: L) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let lock = LockFile::acquire_with(&target, config, backend)?;

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = target
            .file_name()
            .map_or_else(|| "hosts".into(), |n| n.to_string_lossy());
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{name}.tmp."))
            .tempfile_in(dir)?;
        if let Some(perms) = target_permissions(&target, config.default_mode)? {
            temp.as_file().set_permissions(perms)?;
        }

        Ok(Self { target, temp, lock })
    }

    /// Flushes, fsyncs, and renames the temp file over the target.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Io`] if syncing or renaming fails. The target is
    /// left untouched in that case.
    pub fn commit(self) -> Result<()> {
        let Self {
            target,
            mut temp,
            lock,
        } = self;

        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| e.error)?;
        drop(lock);

        tracing::debug!(path = %target.display(), "Committed atomic write");
        Ok(())
    }

    /// The file being replaced.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl<L: FileLock> Write for AtomicFileWriter<L> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

/// Permissions of the existing target, or `default_mode` if it is missing.
fn target_permissions(target: &Path, default_mode: u32) -> io::Result<Option<Permissions>> {
    match fs::metadata(target) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(default_permissions(default_mode)),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_wraps)]
fn default_permissions(mode: u32) -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(mode))
}

/// Mode bits have no meaning here; keep the temp file's own permissions.
#[cfg(not(unix))]
const fn default_permissions(_mode: u32) -> Option<Permissions> {
    None
}

/// Atomically replaces `target` with whatever `f` writes.
///
/// Output from `f` is buffered. If `f` fails, the target keeps its previous
/// content and no temp or lock file is left behind.
///
/// # Errors
///
/// Returns lock errors ([`HostsError::Locked`], [`HostsError::StaleLock`],
/// [`HostsError::LockAcquire`]) or [`HostsError::Io`] from `f`, the temp
/// file, or the rename.
///
/// # Example
///
/// ```no_run
/// use std::io::Write;
/// use hosts_manager::{PersistConfig, atomic_write};
///
/// atomic_write("/etc/hosts", &PersistConfig::new(), |w| {
///     writeln!(w, "127.0.0.1 localhost")
/// })?;
/// # Ok::<(), hosts_manager::HostsError>(())
/// ```
pub fn atomic_write<F>(target: impl AsRef<Path>, config: &PersistConfig, f: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut writer = AtomicFileWriter::new(target, config)?;
    {
        let mut buffered = BufWriter::new(&mut writer);
        f(&mut buffered)?;
        buffered.flush()?;
    }
    writer.commit()
}

/// Reads `path` unless a writer currently holds its lock.
///
/// If `<path>.lock` exists, waits [`PersistConfig::read_retry_delay`] once
/// and checks again. The read itself happens under a shared advisory lock.
///
/// # Errors
///
/// Returns [`HostsError::BeingWritten`] if the lock file is still present
/// after the retry, [`HostsError::LockAcquire`] if the shared lock is refused,
/// or [`HostsError::Io`] if the file cannot be opened or read.
pub fn safe_read(path: impl AsRef<Path>, config: &PersistConfig) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let lock = lock_path(path);
    if lock.exists() {
        tracing::debug!(
            path = %path.display(),
            delay = ?config.read_retry_delay,
            "Lock file present, retrying read"
        );
        std::thread::sleep(config.read_retry_delay);
        if lock.exists() {
            return Err(HostsError::BeingWritten {
                path: path.to_path_buf(),
            });
        }
    }

    let mut file = File::open(path)?;
    AdvisoryLock
        .acquire_shared(&file)
        .map_err(|source| HostsError::LockAcquire {
            path: path.to_path_buf(),
            source,
        })?;

    let mut buf = Vec::new();
    let read = file.read_to_end(&mut buf);
    if let Err(error) = AdvisoryLock.release(&file) {
        tracing::warn!(path = %path.display(), error = %error, "Failed to release shared lock");
    }
    read?;
    Ok(buf)
}

impl HostsFile {
    /// Atomically writes the canonical form to `path` with default settings.
    ///
    /// # Errors
    ///
    /// See [`atomic_write`].
    pub fn write(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.write_with(path, &PersistConfig::new())
    }

    /// Atomically writes the canonical form to `path`.
    ///
    /// On success `modified` is set to the current time.
    ///
    /// # Errors
    ///
    /// See [`atomic_write`].
    pub fn write_with(&mut self, path: impl AsRef<Path>, config: &PersistConfig) -> Result<()> {
        let path = path.as_ref();
        atomic_write(path, config, |w| self.write_to(w))?;
        self.modified = Utc::now();
        tracing::debug!(
            path = %path.display(),
            categories = self.categories.len(),
            "Wrote hosts file"
        );
        Ok(())
    }
}
