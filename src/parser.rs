//! Tolerant hosts file parser.
//!
//! Recognizes three constructs, in order of precedence:
//!
//! ```text
//! # @category dev Local development hosts      <- category marker
//! # =============== DEV ===============          <- section banner (ignored)
//! 192.168.1.10 api.dev web.dev # shared box      <- active entry
//! # 192.168.1.11 old.dev                         <- disabled entry
//! ```
//!
//! Anything else is unstructured text. Unstructured lines that appear before
//! the first recognized construct become the file header; later ones are
//! dropped. Malformed entries are never an error, and neither are bytes
//! that are not UTF-8: only the line containing them is decoded lossily.
//!
//! A single leading `#` means both "disabled entry" and "comment". A comment
//! that happens to match the entry grammar is therefore read back as a
//! disabled entry. This is a property of the format, not something the
//! parser tries to guess around.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::atomic::safe_read;
use crate::config::PersistConfig;
use crate::error::Result;
use crate::model::{CATEGORY_DEFAULT, Category, Entry, HostsFile};
use crate::validate::{is_category_char, validate_ip};

const CATEGORY_KEYWORD: &str = "@category";

/// Reads and parses the hosts file at `path`.
///
/// `modified` is taken from the file's mtime. This read ignores lock files;
/// use [`HostsFile::load`] to cooperate with concurrent writers.
///
/// # Errors
///
/// Returns [`HostsError::Io`](crate::HostsError::Io) if the file cannot be
/// read. Malformed lines are not errors.
pub fn parse(path: impl AsRef<Path>) -> Result<HostsFile> {
    let path = path.as_ref();
    let content = std::fs::read(path)?;
    from_content(path, &content)
}

impl HostsFile {
    /// Reads `path` through [`safe_read`] and parses it.
    ///
    /// # Errors
    ///
    /// Returns [`HostsError::BeingWritten`](crate::HostsError::BeingWritten)
    /// if a writer holds the lock, or [`HostsError::Io`](crate::HostsError::Io)
    /// if the file cannot be read.
    pub fn load(path: impl AsRef<Path>, config: &PersistConfig) -> Result<Self> {
        let path = path.as_ref();
        let content = safe_read(path, config)?;
        from_content(path, &content)
    }
}

fn from_content(path: &Path, content: &[u8]) -> Result<HostsFile> {
    let modified = std::fs::metadata(path)?.modified()?;

    let mut file = parse_bytes(content);
    file.modified = DateTime::<Utc>::from(modified);
    file.file_path = path.to_path_buf();

    tracing::debug!(
        path = %path.display(),
        categories = file.categories.len(),
        header_lines = file.header.len(),
        "Parsed hosts file"
    );
    Ok(file)
}

/// Parses hosts file text. Never fails.
#[must_use]
pub fn parse_str(content: &str) -> HostsFile {
    let mut builder = Builder::default();
    for (index, line) in content.lines().enumerate() {
        builder.line(line, index + 1);
    }
    builder.finish()
}

/// Parses raw hosts file bytes. Never fails.
///
/// Lines are split on `\n` (a trailing `\r` is dropped) and decoded one at
/// a time, so an invalid byte only affects its own line.
#[must_use]
pub fn parse_bytes(content: &[u8]) -> HostsFile {
    let mut builder = Builder::default();
    if !content.is_empty() {
        let body = content.strip_suffix(b"\n").unwrap_or(content);
        for (index, raw) in body.split(|&b| b == b'\n').enumerate() {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw);
            if matches!(line, Cow::Owned(_)) {
                tracing::debug!(line = index + 1, "Replaced invalid UTF-8 in hosts file line");
            }
            builder.line(&line, index + 1);
        }
    }
    builder.finish()
}

#[derive(Default)]
struct Builder {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
    current: Option<String>,
    header: Vec<String>,
    header_done: bool,
}

impl Builder {
    fn line(&mut self, line: &str, line_num: usize) {
        if let Some((name, description)) = parse_category_marker(line) {
            self.category(name, description);
            self.current = Some(name.to_string());
            self.header_done = true;
        } else if is_section_banner(line) {
            self.header_done = true;
        } else if let Some(mut entry) = parse_entry(line) {
            let name = self
                .current
                .clone()
                .unwrap_or_else(|| CATEGORY_DEFAULT.to_string());
            entry.line_num = line_num;
            entry.category.clone_from(&name);
            self.category(&name, "").entries.push(entry);
            self.header_done = true;
        } else if !self.header_done {
            self.header.push(line.to_string());
        }
    }

    /// First declaration wins; later markers only switch the current category.
    fn category(&mut self, name: &str, description: &str) -> &mut Category {
        let index = match self.index.get(name) {
            Some(&index) => index,
            None => {
                self.categories.push(Category::new(name, description));
                self.index.insert(name.to_string(), self.categories.len() - 1);
                self.categories.len() - 1
            }
        };
        &mut self.categories[index]
    }

    fn finish(self) -> HostsFile {
        let mut file = HostsFile::new("");
        file.categories = self.categories;
        file.header = self.header;
        file.ensure_category();
        file
    }
}

/// Strips a leading `#` (after optional whitespace) and the whitespace after it.
fn uncomment(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix('#').map(str::trim_start)
}

/// Matches `# @category <name>[ <description>]`.
fn parse_category_marker(line: &str) -> Option<(&str, &str)> {
    let rest = uncomment(line)?.strip_prefix(CATEGORY_KEYWORD)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();

    let end = rest.find(|c: char| !is_category_char(c)).unwrap_or(rest.len());
    let (name, tail) = rest.split_at(end);
    if name.is_empty() || !(tail.is_empty() || tail.starts_with(char::is_whitespace)) {
        return None;
    }
    Some((name, tail.trim()))
}

/// Matches `# ===<anything>===`.
fn is_section_banner(line: &str) -> bool {
    uncomment(line).is_some_and(|rest| {
        let rest = rest.trim_end();
        rest.len() >= 6 && rest.starts_with("===") && rest.ends_with("===")
    })
}

/// Parses an active or `#`-disabled entry line.
fn parse_entry(line: &str) -> Option<Entry> {
    let trimmed = line.trim();
    match trimmed.strip_prefix('#') {
        Some(rest) => parse_entry_body(rest.trim()).map(|e| e.with_enabled(false)),
        None => parse_entry_body(trimmed),
    }
}

/// `<ip> <hostname>[ <hostname>...][ # <comment>]`
///
/// Only the IP is validated here; hostnames are taken as written.
fn parse_entry_body(body: &str) -> Option<Entry> {
    let (fields, comment) = match body.split_once('#') {
        Some((fields, comment)) => (fields, comment.trim()),
        None => (body, ""),
    };

    let mut tokens = fields.split_whitespace();
    let ip = tokens.next()?;
    if !ip.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.') {
        return None;
    }
    validate_ip(ip).ok()?;

    let hostnames: Vec<&str> = tokens.collect();
    if hostnames.is_empty() {
        return None;
    }

    Some(Entry::new(ip, hostnames).with_comment(comment))
}
