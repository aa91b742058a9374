//! # hosts-manager
//!
//! Parse, edit, and safely rewrite the system hosts file.
//!
//! Entries are organized into named categories delimited by comment markers
//! that ordinary resolvers ignore, so a managed file stays a valid hosts file:
//!
//! ```text
//! # @category dev Local development hosts
//! # =============== DEV ===============
//! 192.168.1.10 api.dev web.dev # shared box
//! # 192.168.1.11 old.dev
//! ```
//!
//! A category can be switched off as a unit; its entries are then written
//! commented out and come back as disabled entries on the next parse.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hosts_manager::{Entry, HostsFile, PersistConfig, default_hosts_path};
//!
//! let path = default_hosts_path();
//! let config = PersistConfig::new();
//!
//! let mut hosts = HostsFile::load(&path, &config)?;
//! hosts.add_entry(Entry::new("192.168.1.10", ["api.dev"]).with_category("dev"))?;
//! hosts.disable_category("staging");
//!
//! // Requires write access to the hosts file.
//! hosts.write_with(&path, &config)?;
//! # Ok::<(), hosts_manager::HostsError>(())
//! ```
//!
//! ## Writing safely
//!
//! [`HostsFile::write`] and [`atomic_write`] never leave a half-written file.
//! Content goes to a hidden temp file in the same directory, which is fsynced
//! and renamed over the target while `<target>.lock` is held. Concurrent
//! writers fail fast with [`HostsError::Locked`] instead of waiting. A lock
//! left behind by a crashed process is reclaimed once it is older than
//! [`PersistConfig::stale_lock_after`].
//!
//! Locking is advisory: it only coordinates programs that use this crate
//! (or honour the same lock file).
//!
//! ## Validation
//!
//! Every mutation validates its input first and leaves the model unchanged on
//! failure. The [`validate`] filters reject malformed addresses and names, and
//! a small set of injection-looking patterns. They are content filters, not a
//! security boundary.
//!
//! ## Logging
//!
//! The crate never prints. Diagnostics are emitted as [`tracing`] events;
//! install a subscriber to see them.
//!
//! [`tracing`]: https://docs.rs/tracing

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod atomic;
pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod parser;
pub mod serialize;
pub mod util;
pub mod validate;

pub use atomic::{AtomicFileWriter, atomic_write, safe_read};
pub use config::{PersistConfig, default_hosts_path};
pub use error::{Field, HostsError, Result, ValidationError};
pub use lock::{AdvisoryLock, FileLock, LockFile, LockInfo, is_file_locked};
pub use model::{
    CATEGORY_CUSTOM, CATEGORY_DEFAULT, CATEGORY_DEVELOPMENT, CATEGORY_PRODUCTION,
    CATEGORY_STAGING, Category, Entry, HostsFile,
};
pub use parser::{parse, parse_bytes, parse_str};
pub use serialize::MANAGED_BANNER;
pub use validate::{
    validate_category_name, validate_comment, validate_description, validate_entry,
    validate_hostname, validate_ip,
};
