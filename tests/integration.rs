//! Integration tests for `hosts-manager`.
//!
//! Tests marked `#[ignore]` touch the real system hosts file and need root:
//!
//! ```bash
//! sudo cargo test -- --ignored
//! ```

use std::fs;
use std::io::Write;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, SystemTime};

use hosts_manager::{
    Entry, HostsError, HostsFile, LockInfo, MANAGED_BANNER, PersistConfig, is_file_locked, parse,
    parse_str,
};

const SYSTEM_HOSTS: &str = "\
##
# Host Database
#
# localhost is used to configure the loopback interface
##
127.0.0.1	localhost
255.255.255.255	broadcasthost
::1             localhost
";

fn lock_file(target: &std::path::Path) -> std::path::PathBuf {
    hosts_manager::lock::lock_path(target)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    fs::write(&path, SYSTEM_HOSTS).unwrap();

    let mut hosts = parse(&path).unwrap();
    assert_eq!(hosts.entries().count(), 3);
    assert_eq!(hosts.header.len(), 5);

    // Add two categories of entries.
    hosts.add_category("dev", "Local development").unwrap();
    hosts
        .add_entry(Entry::new("192.168.1.10", ["api.dev", "web.dev"]).with_category("dev"))
        .unwrap();
    hosts
        .add_entry(Entry::new("10.0.0.5", ["shop.staging"]).with_category("staging"))
        .unwrap();
    hosts.disable_category("staging");
    hosts.write(&path).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with(MANAGED_BANNER[0]));
    assert!(written.contains("# Host Database\n"));
    assert!(written.contains("# @category dev Local development\n"));
    assert!(written.contains("192.168.1.10 api.dev web.dev\n"));
    assert!(written.contains("# 10.0.0.5 shop.staging\n"));
    assert!(!is_file_locked(&path));

    // Re-read and keep editing.
    let config = PersistConfig::new();
    let mut hosts = HostsFile::load(&path, &config).unwrap();
    let names: Vec<_> = hosts.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["default", "dev", "staging"]);
    assert!(hosts.entries().any(|e| e.has_hostname("localhost")));

    let staging = hosts.category("staging").unwrap();
    assert!(staging.entries.iter().all(|e| !e.enabled));

    assert!(hosts.remove_entry("api.dev"));
    assert!(hosts.enable_category("staging"));
    assert!(hosts.move_entry("shop.staging", "dev").unwrap());
    hosts.write_with(&path, &config).unwrap();

    let hosts = HostsFile::load(&path, &config).unwrap();
    let dev = hosts.category("dev").unwrap();
    assert_eq!(dev.entries.len(), 2);
    assert_eq!(dev.entries[0].hostnames, vec!["web.dev"]);
    assert_eq!(dev.entries[1].hostnames, vec!["shop.staging"]);
    assert!(dev.entries[1].enabled);
    assert!(hosts.category("staging").is_none());
}

#[test]
fn rewrite_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    fs::write(&path, SYSTEM_HOSTS).unwrap();

    let mut hosts = parse(&path).unwrap();
    hosts
        .add_entry(Entry::new("10.0.0.1", ["a.dev"]).with_category("dev"))
        .unwrap();
    hosts.write(&path).unwrap();
    let first = fs::read(&path).unwrap();

    parse(&path).unwrap().write(&path).unwrap();
    let second = fs::read(&path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn latin1_header_does_not_hide_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    fs::write(&path, b"# Caf\xe9 network\n127.0.0.1 localhost\n").unwrap();

    let mut hosts = HostsFile::load(&path, &PersistConfig::new()).unwrap();
    assert!(hosts.entries().any(|e| e.has_hostname("localhost")));

    hosts
        .add_entry(Entry::new("10.0.0.1", ["a.dev"]).with_category("dev"))
        .unwrap();
    hosts.write(&path).unwrap();

    let hosts = parse(&path).unwrap();
    assert_eq!(hosts.entries().count(), 2);
    assert!(hosts.header.iter().any(|l| l == "# Caf\u{fffd} network"));
}

// ---------------------------------------------------------------------------
// Documented scenarios
// ---------------------------------------------------------------------------

#[test]
fn category_with_disabled_entry() {
    let hosts = parse_str("# @category dev Local hosts\n192.168.1.1 api.dev\n# 192.168.1.2 old.dev\n");

    assert_eq!(hosts.categories.len(), 1);
    let dev = &hosts.categories[0];
    assert_eq!(dev.name, "dev");
    assert_eq!(dev.description, "Local hosts");
    assert_eq!(dev.entries.len(), 2);
    assert!(dev.entries[0].enabled);
    assert!(!dev.entries[1].enabled);
}

#[test]
fn remove_one_hostname_then_the_entry() {
    let mut hosts = HostsFile::new("hosts");
    hosts
        .add_entry(Entry::new("127.0.0.1", ["api.dev", "web.dev"]))
        .unwrap();

    assert!(hosts.remove_entry("api.dev"));
    let entries: Vec<_> = hosts.entries().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].hostnames, vec!["web.dev"]);

    assert!(hosts.remove_entry("web.dev"));
    assert_eq!(hosts.entries().count(), 0);
    assert!(!hosts.remove_entry("web.dev"));
}

#[test]
fn duplicate_category_is_rejected() {
    let mut hosts = parse_str("# @category dev\n10.0.0.1 a.dev\n");
    let before = hosts.categories.clone();

    let err = hosts.add_category("dev", "again").unwrap_err();
    assert!(matches!(err, HostsError::CategoryExists { ref name } if name == "dev"));
    assert!(err.to_string().contains("already exists"));
    assert_eq!(hosts.categories, before);
}

#[test]
fn multiline_description_is_rejected() {
    let mut hosts = parse_str(SYSTEM_HOSTS);
    let before = hosts.categories.clone();

    let err = hosts
        .add_category("dev", "Local\n10.6.6.6 evil.example")
        .unwrap_err();
    assert!(matches!(err, HostsError::Validation(_)), "{err}");
    assert_eq!(hosts.categories, before);
    assert!(!hosts.render().contains("evil.example"));
}

#[test]
fn invalid_entry_leaves_file_untouched() {
    let mut hosts = parse_str(SYSTEM_HOSTS);
    let before = hosts.categories.clone();

    for entry in [
        Entry::new("224.0.0.1", ["multicast.dev"]),
        Entry::new("10.0.0.1", ["bad\0host"]),
        Entry::new("10.0.0.1", ["<script>.dev"]),
        Entry::new("10.0.0.1", Vec::<String>::new()),
        Entry::new("10.0.0.1", ["ok.dev"]).with_comment("javascript:alert(1)"),
    ] {
        let err = hosts.add_entry(entry).unwrap_err();
        assert!(matches!(err, HostsError::Validation(_)), "{err}");
    }
    assert_eq!(hosts.categories, before);
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

#[test]
fn concurrent_writers_leave_one_complete_file() {
    const WRITERS: usize = 6;

    let dir = tempfile::tempdir().unwrap();
    let path = Arc::new(dir.path().join("hosts"));
    fs::write(path.as_path(), SYSTEM_HOSTS).unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut hosts = parse_str(SYSTEM_HOSTS);
                hosts
                    .add_entry(
                        Entry::new(format!("10.0.0.{}", i + 1), [format!("writer{i}.dev")])
                            .with_category("race"),
                    )
                    .unwrap();
                let expected = hosts.render();
                barrier.wait();
                (hosts.write(path.as_path()), expected)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(outcomes.iter().any(|(r, _)| r.is_ok()));
    for (result, _) in &outcomes {
        if let Err(e) = result {
            assert!(e.is_locked(), "unexpected error: {e}");
        }
    }

    let content = fs::read_to_string(path.as_path()).unwrap();
    assert!(
        outcomes
            .iter()
            .any(|(r, expected)| r.is_ok() && *expected == content),
        "final file matches no successful writer"
    );
    assert!(!is_file_locked(path.as_path()));
}

#[test]
fn stale_lock_from_crashed_writer_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    fs::write(&path, SYSTEM_HOSTS).unwrap();

    // A lock left behind by a process that no longer exists.
    let lock = lock_file(&path);
    fs::write(&lock, "999999999\n2024-01-01T00:00:00Z\n").unwrap();
    let info = LockInfo::read(&lock).unwrap();
    assert_eq!(info.pid, 999_999_999);
    assert!(!info.owner_alive());

    let config = PersistConfig::new().with_read_retry_delay(Duration::from_millis(10));
    let mut hosts = parse(&path).unwrap();

    // Still fresh: writers and lock-aware readers back off.
    let err = hosts.write_with(&path, &config).unwrap_err();
    assert!(matches!(err, HostsError::Locked { .. }));
    let err = HostsFile::load(&path, &config).unwrap_err();
    assert!(matches!(err, HostsError::BeingWritten { .. }));

    // Age it past the threshold.
    fs::File::options()
        .write(true)
        .open(&lock)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(10 * 60))
        .unwrap();

    hosts
        .add_entry(Entry::new("10.0.0.1", ["recovered.dev"]))
        .unwrap();
    hosts.write_with(&path, &config).unwrap();

    assert!(!lock.exists());
    let hosts = HostsFile::load(&path, &config).unwrap();
    assert!(hosts.entries().any(|e| e.has_hostname("recovered.dev")));
}

#[test]
fn failed_write_keeps_original() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    fs::write(&path, SYSTEM_HOSTS).unwrap();

    let err = hosts_manager::atomic_write(&path, &PersistConfig::new(), |w| {
        w.write_all(b"# truncated")?;
        Err(std::io::Error::other("interrupted"))
    })
    .unwrap_err();
    assert!(matches!(err, HostsError::Io(_)));

    assert_eq!(fs::read_to_string(&path).unwrap(), SYSTEM_HOSTS);
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec!["hosts"]);
}

// ---------------------------------------------------------------------------
// Root-only tests
// ---------------------------------------------------------------------------

#[test]
#[ignore = "requires root to write the system hosts file"]
fn real_hosts_roundtrip() {
    let path = hosts_manager::default_hosts_path();
    let config = PersistConfig::new();
    let original = fs::read(&path).unwrap();

    let mut hosts = HostsFile::load(&path, &config).unwrap();
    hosts
        .add_entry(Entry::new("127.0.0.1", ["hosts-manager-test.local"]).with_category("test"))
        .unwrap();
    hosts.write_with(&path, &config).unwrap();

    let mut hosts = HostsFile::load(&path, &config).unwrap();
    assert!(hosts.remove_entry("hosts-manager-test.local"));
    hosts.write_with(&path, &config).unwrap();

    fs::write(&path, original).unwrap();
}
