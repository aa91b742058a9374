//! Canonical text output for [`HostsFile`] and [`Entry`].
//!
//! ```text
//! # This file is currently managed by hosts-manager
//! # Entries are grouped by @category markers; edit with care
//!
//! <original header, blank runs collapsed>
//!
//! # @category dev Local hosts
//! # =============== DEV ===============
//! 192.168.1.1 api.dev
//! # 192.168.1.2 old.dev
//! ```
//!
//! The output parses back to the same categories and entries, but is not a
//! byte-for-byte copy of the input.

use std::fmt;
use std::io::{self, Write};

use crate::model::{Category, Entry, HostsFile};

/// Banner written at the top of every managed file. Re-parsed copies are
/// filtered out of the header so they do not accumulate.
pub const MANAGED_BANNER: [&str; 2] = [
    "# This file is currently managed by hosts-manager",
    "# Entries are grouped by @category markers; edit with care",
];

impl fmt::Display for Entry {
    /// `[# ]<ip> <hostnames...>[ # <comment>]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            f.write_str("# ")?;
        }
        write!(f, "{} {}", self.ip, self.hostnames.join(" "))?;
        if !self.comment.is_empty() {
            write!(f, " # {}", single_line(&self.comment))?;
        }
        Ok(())
    }
}

impl Category {
    fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        if self.description.is_empty() {
            writeln!(w, "# @category {}", self.name)?;
        } else {
            let description = single_line(&self.description);
            writeln!(w, "# @category {} {description}", self.name)?;
        }
        writeln!(
            w,
            "# =============== {} ===============",
            self.name.to_uppercase()
        )?;
        for entry in &self.entries {
            writeln!(w, "{entry}")?;
        }
        Ok(())
    }
}

impl HostsFile {
    /// Writes the canonical text form to `w`.
    ///
    /// Categories without entries are skipped.
    ///
    /// # Errors
    ///
    /// Propagates any error from `w`.
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for line in MANAGED_BANNER {
            writeln!(w, "{line}")?;
        }
        writeln!(w)?;

        let header = clean_header(&self.header);
        for line in &header {
            writeln!(w, "{line}")?;
        }
        if !header.is_empty() {
            writeln!(w)?;
        }

        let mut first = true;
        for category in self.categories.iter().filter(|c| !c.entries.is_empty()) {
            if !first {
                writeln!(w)?;
            }
            first = false;
            category.write_to(w)?;
        }

        if !self.footer.is_empty() {
            writeln!(w)?;
            for line in &self.footer {
                writeln!(w, "{line}")?;
            }
        }
        Ok(())
    }

    /// Renders the canonical text form.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Free text embedded in a structured line. A line break would let it
/// start a line of its own.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Drops banner lines, collapses blank runs, and trims blank edges.
fn clean_header(header: &[String]) -> Vec<&str> {
    let mut lines: Vec<&str> = Vec::with_capacity(header.len());
    for line in header {
        if MANAGED_BANNER.contains(&line.trim()) {
            continue;
        }
        let blank = line.trim().is_empty();
        if blank && lines.last().is_none_or(|l| l.trim().is_empty()) {
            continue;
        }
        lines.push(line.as_str());
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines
}
