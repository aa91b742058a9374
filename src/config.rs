//! Persistence tunables.

use std::path::PathBuf;
use std::time::Duration;

/// Lock files older than this are treated as left behind by a crashed writer.
pub const DEFAULT_STALE_LOCK_AFTER: Duration = Duration::from_secs(5 * 60);

/// How long [`safe_read`](crate::safe_read) waits before its single retry.
pub const DEFAULT_READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Permission bits for a newly created target file.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Settings for [`atomic_write`](crate::atomic_write) and
/// [`safe_read`](crate::safe_read).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hosts_manager::PersistConfig;
///
/// let config = PersistConfig::new()
///     .with_stale_lock_after(Duration::from_secs(30))
///     .with_default_mode(0o600);
///
/// assert_eq!(config.stale_lock_after, Duration::from_secs(30));
/// assert_eq!(config.default_mode, 0o600);
/// ```
#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// Age after which an existing lock file may be reclaimed.
    pub stale_lock_after: Duration,

    /// Delay before `safe_read` re-checks for a lock file.
    pub read_retry_delay: Duration,

    /// Mode for the target when it does not exist yet. Ignored on Windows.
    pub default_mode: u32,
}

impl PersistConfig {
    /// Creates a config with the default 5 minute stale threshold, 100 ms
    /// read retry delay, and `0o644` mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stale_lock_after: DEFAULT_STALE_LOCK_AFTER,
            read_retry_delay: DEFAULT_READ_RETRY_DELAY,
            default_mode: DEFAULT_FILE_MODE,
        }
    }

    #[must_use]
    pub const fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = age;
        self
    }

    #[must_use]
    pub const fn with_read_retry_delay(mut self, delay: Duration) -> Self {
        self.read_retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_default_mode(mut self, mode: u32) -> Self {
        self.default_mode = mode;
        self
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The system hosts file for the current platform.
#[must_use]
pub fn default_hosts_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let c = PersistConfig::new();
        assert_eq!(c.stale_lock_after, Duration::from_secs(300));
        assert_eq!(c.read_retry_delay, Duration::from_millis(100));
        assert_eq!(c.default_mode, 0o644);
    }

    #[test]
    fn builders_override() {
        let c = PersistConfig::default()
            .with_stale_lock_after(Duration::from_secs(1))
            .with_read_retry_delay(Duration::ZERO)
            .with_default_mode(0o600);
        assert_eq!(c.stale_lock_after, Duration::from_secs(1));
        assert_eq!(c.read_retry_delay, Duration::ZERO);
        assert_eq!(c.default_mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn unix_hosts_path() {
        assert_eq!(default_hosts_path(), PathBuf::from("/etc/hosts"));
    }
}
