//! Content checks for IP addresses, hostnames, comments, and category names.
//!
//! These are advisory filters that keep obviously hostile or malformed input
//! out of a shared system file. They are one layer of defense, not a security
//! boundary.

use std::net::IpAddr;

use crate::error::{Field, ValidationError};
use crate::model::Entry;

/// Maximum hostname length (RFC 1035 text form).
pub const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single hostname label.
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum comment length in characters.
pub const MAX_COMMENT_LEN: usize = 500;

/// Maximum category name length.
pub const MAX_CATEGORY_LEN: usize = 50;

/// Maximum category description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Path traversal and markup injection fragments never allowed in a hostname.
const HOSTNAME_DENYLIST: &[&str] = &["../", "..\\", "<", ">", "\"", "'", "&", "`"];

/// Script injection markers, matched case-insensitively against comments.
const COMMENT_DENYLIST: &[&str] = &[
    "<script",
    "javascript:",
    "data:",
    "vbscript:",
    "onload=",
    "onerror=",
    "eval(",
    "settimeout(",
    "setinterval(",
];

/// Cyrillic characters that render like Latin letters.
const HOMOGRAPHS: &[char] = &[
    '\u{0430}', '\u{0435}', '\u{043e}', '\u{0440}', '\u{0441}', '\u{0445}',
];

/// Validates an IP address and returns it parsed.
///
/// Loopback, private, link-local, and public unicast addresses are accepted.
/// Multicast and unspecified addresses are rejected, including their
/// IPv4-mapped IPv6 spellings.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`], [`ValidationError::Malformed`], or
/// [`ValidationError::ForbiddenAddress`].
pub fn validate_ip(ip: &str) -> Result<IpAddr, ValidationError> {
    if ip.is_empty() {
        return Err(ValidationError::Empty { field: Field::Ip });
    }

    let parsed: IpAddr = ip.parse().map_err(|_| ValidationError::Malformed {
        field: Field::Ip,
        reason: "not an IPv4 or IPv6 address",
    })?;

    let canonical = parsed.to_canonical();
    if canonical.is_multicast() {
        return Err(ValidationError::ForbiddenAddress {
            ip: parsed,
            kind: "multicast",
        });
    }
    if canonical.is_unspecified() {
        return Err(ValidationError::ForbiddenAddress {
            ip: parsed,
            kind: "unspecified",
        });
    }

    Ok(parsed)
}

/// Validates a hostname.
///
/// Enforces RFC 1035/1123 label rules and rejects control characters,
/// whitespace, non-ASCII text, and the path traversal / markup denylist.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    const FIELD: Field = Field::Hostname;

    if hostname.is_empty() {
        return Err(ValidationError::Empty { field: FIELD });
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(ValidationError::TooLong {
            field: FIELD,
            max: MAX_HOSTNAME_LEN,
        });
    }

    if let Some(ch) = hostname.chars().find(|c| c.is_control() || c.is_whitespace()) {
        return Err(ValidationError::DisallowedCharacter { field: FIELD, ch });
    }
    if let Some(pattern) = HOSTNAME_DENYLIST.iter().copied().find(|p| hostname.contains(p)) {
        return Err(ValidationError::DangerousPattern {
            field: FIELD,
            pattern,
        });
    }
    if hostname.chars().any(|c| HOMOGRAPHS.contains(&c)) {
        return Err(ValidationError::DangerousPattern {
            field: FIELD,
            pattern: "homograph character",
        });
    }
    if let Some(ch) = hostname.chars().find(|c| !c.is_ascii()) {
        return Err(ValidationError::DisallowedCharacter { field: FIELD, ch });
    }

    hostname.split('.').try_for_each(validate_label)
}

fn validate_label(label: &str) -> Result<(), ValidationError> {
    const FIELD: Field = Field::Hostname;

    if label.is_empty() {
        return Err(ValidationError::Malformed {
            field: FIELD,
            reason: "empty label (leading, trailing, or consecutive dot)",
        });
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(ValidationError::TooLong {
            field: FIELD,
            max: MAX_LABEL_LEN,
        });
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::Malformed {
            field: FIELD,
            reason: "label cannot start or end with a hyphen",
        });
    }
    if let Some(ch) = label.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
        return Err(ValidationError::DisallowedCharacter { field: FIELD, ch });
    }
    Ok(())
}

/// Validates a free-text comment. Empty comments are allowed.
///
/// # Errors
///
/// Returns [`ValidationError::TooLong`] past 500 characters,
/// [`ValidationError::DisallowedCharacter`] for control characters other than
/// tab, CR, and LF, or [`ValidationError::DangerousPattern`] for script
/// injection markers.
pub fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    const FIELD: Field = Field::Comment;

    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(ValidationError::TooLong {
            field: FIELD,
            max: MAX_COMMENT_LEN,
        });
    }
    if let Some(ch) = comment
        .chars()
        .find(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
    {
        return Err(ValidationError::DisallowedCharacter { field: FIELD, ch });
    }

    let lowered = comment.to_lowercase();
    if let Some(pattern) = COMMENT_DENYLIST.iter().copied().find(|p| lowered.contains(p)) {
        return Err(ValidationError::DangerousPattern {
            field: FIELD,
            pattern,
        });
    }
    Ok(())
}

/// Validates a category name against `[a-zA-Z0-9_-]{1,50}`.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`], [`ValidationError::TooLong`], or
/// [`ValidationError::DisallowedCharacter`].
pub fn validate_category_name(name: &str) -> Result<(), ValidationError> {
    const FIELD: Field = Field::Category;

    if name.is_empty() {
        return Err(ValidationError::Empty { field: FIELD });
    }
    if name.chars().count() > MAX_CATEGORY_LEN {
        return Err(ValidationError::TooLong {
            field: FIELD,
            max: MAX_CATEGORY_LEN,
        });
    }
    if let Some(ch) = name.chars().find(|c| !is_category_char(*c)) {
        return Err(ValidationError::DisallowedCharacter { field: FIELD, ch });
    }
    Ok(())
}

/// Validates a category description. Empty descriptions are allowed.
///
/// The description shares the marker line, so no control character
/// (including CR and LF) is accepted.
///
/// # Errors
///
/// Returns [`ValidationError::TooLong`] past 200 characters,
/// [`ValidationError::DisallowedCharacter`] for any control character, or
/// [`ValidationError::DangerousPattern`] for script injection markers.
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    const FIELD: Field = Field::Description;

    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: FIELD,
            max: MAX_DESCRIPTION_LEN,
        });
    }
    if let Some(ch) = description.chars().find(|c| c.is_control()) {
        return Err(ValidationError::DisallowedCharacter { field: FIELD, ch });
    }

    let lowered = description.to_lowercase();
    if let Some(pattern) = COMMENT_DENYLIST.iter().copied().find(|p| lowered.contains(p)) {
        return Err(ValidationError::DangerousPattern {
            field: FIELD,
            pattern,
        });
    }
    Ok(())
}

pub(crate) const fn is_category_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validates every field of an entry. An empty category is allowed and
/// resolves to the default category when the entry is added.
///
/// # Errors
///
/// Returns the first failing field's [`ValidationError`].
pub fn validate_entry(entry: &Entry) -> Result<(), ValidationError> {
    validate_ip(&entry.ip)?;
    if entry.hostnames.is_empty() {
        return Err(ValidationError::NoHostnames);
    }
    entry
        .hostnames
        .iter()
        .try_for_each(|h| validate_hostname(h))?;
    validate_comment(&entry.comment)?;
    if !entry.category.is_empty() {
        validate_category_name(&entry.category)?;
    }
    Ok(())
}
