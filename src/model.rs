//! Hosts file data model and its invariant-preserving mutations.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HostsError, Result};
use crate::validate::{validate_category_name, validate_description, validate_entry};

/// Category entries land in when none is named.
pub const CATEGORY_DEFAULT: &str = "default";
pub const CATEGORY_DEVELOPMENT: &str = "development";
pub const CATEGORY_STAGING: &str = "staging";
pub const CATEGORY_PRODUCTION: &str = "production";
pub const CATEGORY_CUSTOM: &str = "custom";

/// One IP-to-hostnames mapping line.
///
/// # Example
///
/// ```
/// use hosts_manager::Entry;
///
/// let entry = Entry::new("127.0.0.1", ["api.dev", "web.dev"])
///     .with_comment("local stack")
///     .with_category("dev");
///
/// assert_eq!(entry.hostnames, vec!["api.dev", "web.dev"]);
/// assert!(entry.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Address as written, e.g. `192.168.1.10` or `::1`.
    pub ip: String,

    /// Order is significant and preserved on write.
    pub hostnames: Vec<String>,

    /// Trailing `# ...` text, without the marker.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    /// Name of the owning category. Empty means `default` on insert.
    #[serde(default)]
    pub category: String,

    /// `false` writes the line commented out.
    pub enabled: bool,

    /// 1-based source line, for diagnostics only. Zero when not parsed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub line_num: usize,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Entry {
    /// Creates an enabled entry with no comment and no category.
    #[must_use]
    pub fn new<I, S>(ip: impl Into<String>, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ip: ip.into(),
            hostnames: hostnames.into_iter().map(Into::into).collect(),
            comment: String::new(),
            category: String::new(),
            enabled: true,
            line_num: 0,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns `true` if `hostname` is one of this entry's names.
    #[must_use]
    pub fn has_hostname(&self, hostname: &str) -> bool {
        self.hostnames.iter().any(|h| h == hostname)
    }
}

/// A named, independently toggleable group of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique within a file; `[A-Za-z0-9_-]{1,50}`.
    pub name: String,

    /// Free text written after the name on the marker line.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Category-level switch; toggling it cascades to every entry.
    pub enabled: bool,

    /// Entries in write order.
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl Category {
    /// Creates an empty, enabled category.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            enabled: true,
            entries: Vec::new(),
        }
    }

    /// Sets the category flag and forces every entry to match it.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        for entry in &mut self.entries {
            entry.enabled = enabled;
        }
    }
}

/// A parsed hosts file.
///
/// Always holds at least one category, and category names are unique.
/// Deserialization enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawHostsFile")]
pub struct HostsFile {
    /// Write order.
    pub categories: Vec<Category>,

    /// Unstructured lines found before the first category, banner, or entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<String>,

    /// Lines written after the last category. Never filled by the parser.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub footer: Vec<String>,

    /// Source mtime when parsed, or the time of the last successful write.
    pub modified: DateTime<Utc>,

    /// Where the file was read from.
    pub file_path: PathBuf,
}

#[derive(Deserialize)]
struct RawHostsFile {
    categories: Vec<Category>,
    #[serde(default)]
    header: Vec<String>,
    #[serde(default)]
    footer: Vec<String>,
    modified: DateTime<Utc>,
    #[serde(default)]
    file_path: PathBuf,
}

impl TryFrom<RawHostsFile> for HostsFile {
    type Error = HostsError;

    /// Rejects anything the text format could not hold: duplicate or invalid
    /// category names, unsafe descriptions, and invalid entries. Each entry's
    /// `category` is set to the category that contains it.
    fn try_from(mut raw: RawHostsFile) -> Result<Self> {
        let mut seen = HashSet::new();
        for category in &raw.categories {
            validate_category_name(&category.name)?;
            validate_description(&category.description)?;
            if !seen.insert(category.name.as_str()) {
                return Err(HostsError::CategoryExists {
                    name: category.name.clone(),
                });
            }
        }

        for category in &mut raw.categories {
            for entry in &mut category.entries {
                entry.category.clone_from(&category.name);
                validate_entry(entry)?;
            }
        }

        let mut file = Self {
            categories: raw.categories,
            header: raw.header,
            footer: raw.footer,
            modified: raw.modified,
            file_path: raw.file_path,
        };
        file.ensure_category();
        Ok(file)
    }
}

impl HostsFile {
    /// Creates a file holding only the empty `default` category.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        let mut file = Self {
            categories: Vec::new(),
            header: Vec::new(),
            footer: Vec::new(),
            modified: Utc::now(),
            file_path: file_path.into(),
        };
        file.ensure_category();
        file
    }

    pub(crate) fn ensure_category(&mut self) {
        if self.categories.is_empty() {
            self.categories.push(Category::new(CATEGORY_DEFAULT, ""));
        }
    }

    /// Validates `entry` and appends it to its category, creating the
    /// category if needed. An empty category name means `default`.
    /// Duplicates are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Validation`]; the model is left unchanged.
    pub fn add_entry(&mut self, mut entry: Entry) -> Result<()> {
        validate_entry(&entry)?;

        if entry.category.is_empty() {
            entry.category = CATEGORY_DEFAULT.to_string();
        }
        self.category_or_insert(&entry.category).entries.push(entry);
        Ok(())
    }

    /// Removes `hostname` from the first entry that lists it. The entry
    /// itself is removed when that was its only hostname.
    ///
    /// Returns `false` if no entry lists `hostname`.
    pub fn remove_entry(&mut self, hostname: &str) -> bool {
        let Some((ci, ei)) = self.position(hostname) else {
            return false;
        };
        let entries = &mut self.categories[ci].entries;
        if entries[ei].hostnames.len() == 1 {
            entries.remove(ei);
        } else {
            entries[ei].hostnames.retain(|h| h != hostname);
        }
        true
    }

    /// Enables the first entry listing `hostname`.
    pub fn enable_entry(&mut self, hostname: &str) -> bool {
        self.set_entry_enabled(hostname, true)
    }

    /// Disables the first entry listing `hostname`.
    pub fn disable_entry(&mut self, hostname: &str) -> bool {
        self.set_entry_enabled(hostname, false)
    }

    fn set_entry_enabled(&mut self, hostname: &str, enabled: bool) -> bool {
        match self.position(hostname) {
            Some((ci, ei)) => {
                self.categories[ci].entries[ei].enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enables a category and every entry in it.
    pub fn enable_category(&mut self, name: &str) -> bool {
        self.set_category_enabled(name, true)
    }

    /// Disables a category and every entry in it.
    pub fn disable_category(&mut self, name: &str) -> bool {
        self.set_category_enabled(name, false)
    }

    fn set_category_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(category) = self.category_mut(name) else {
            return false;
        };
        category.set_enabled(enabled);
        true
    }

    /// Appends a new empty, enabled category.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Validation`] for an invalid name or description,
    /// or [`HostsError::CategoryExists`] if the name is taken.
    pub fn add_category(&mut self, name: &str, description: &str) -> Result<()> {
        validate_category_name(name)?;
        validate_description(description)?;
        if self.category(name).is_some() {
            return Err(HostsError::CategoryExists {
                name: name.to_string(),
            });
        }
        self.categories.push(Category::new(name, description));
        Ok(())
    }

    /// Moves the first entry listing `hostname` to the end of `category`,
    /// creating the category if needed.
    ///
    /// Returns `Ok(false)` if no entry lists `hostname`.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::Validation`] for an invalid target name.
    pub fn move_entry(&mut self, hostname: &str, category: &str) -> Result<bool> {
        validate_category_name(category)?;

        let Some((ci, ei)) = self.position(hostname) else {
            return Ok(false);
        };
        if self.categories[ci].name == category {
            return Ok(true);
        }

        let mut entry = self.categories[ci].entries.remove(ei);
        entry.category = category.to_string();
        self.category_or_insert(category).entries.push(entry);
        Ok(true)
    }

    /// Looks up a category by name.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.categories.iter_mut().find(|c| c.name == name)
    }

    /// All entries in write order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.categories.iter().flat_map(|c| c.entries.iter())
    }

    /// Entries whose IP or any hostname contains `query`, case-insensitively.
    #[must_use]
    pub fn find_entries(&self, query: &str) -> Vec<&Entry> {
        let query = query.to_lowercase();
        self.entries()
            .filter(|e| {
                e.ip.to_lowercase().contains(&query)
                    || e.hostnames.iter().any(|h| h.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Entries whose IP equals `ip`, ignoring ASCII case.
    #[must_use]
    pub fn find_by_ip(&self, ip: &str) -> Vec<&Entry> {
        self.entries()
            .filter(|e| e.ip.eq_ignore_ascii_case(ip))
            .collect()
    }

    /// Entries with a hostname containing `query`, case-insensitively.
    #[must_use]
    pub fn find_by_hostname(&self, query: &str) -> Vec<&Entry> {
        let query = query.to_lowercase();
        self.entries()
            .filter(|e| e.hostnames.iter().any(|h| h.to_lowercase().contains(&query)))
            .collect()
    }

    fn position(&self, hostname: &str) -> Option<(usize, usize)> {
        self.categories.iter().enumerate().find_map(|(ci, c)| {
            c.entries
                .iter()
                .position(|e| e.has_hostname(hostname))
                .map(|ei| (ci, ei))
        })
    }

    fn category_or_insert(&mut self, name: &str) -> &mut Category {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.categories.push(Category::new(name, ""));
                self.categories.len() - 1
            }
        };
        &mut self.categories[index]
    }
}
