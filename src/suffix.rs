//! Domain suffix validation.

use crate::error::{ResolverError, Result};
use std::fmt;
use std::str::FromStr;

/// Longest label DNS allows.
const MAX_LABEL_LEN: usize = 63;

/// Labels the system already maps to loopback. Uninstalling one would strip
/// the standard `127.0.0.1 localhost` line.
const RESERVED: &[&str] = &["localhost"];

/// A top-level domain label routed to localhost, e.g. `test`.
///
/// Always a single lower-case DNS label. A leading dot is accepted on input
/// and dropped, so `.test` and `test` parse to the same suffix.
///
/// ```
/// use dottest::Suffix;
///
/// let suffix: Suffix = ".Test".parse().unwrap();
/// assert_eq!(suffix.as_str(), "test");
/// assert!("my.test".parse::<Suffix>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suffix(String);

impl Suffix {
    /// Validates and normalises `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidSuffix`] if `input` is not exactly one
    /// DNS label, or names a reserved label such as `localhost`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let label = trimmed.strip_prefix('.').unwrap_or(trimmed);
        let invalid = |reason: String| ResolverError::InvalidSuffix {
            suffix: input.to_string(),
            reason,
        };
        validate_label(label).map_err(invalid)?;
        let label = label.to_ascii_lowercase();
        if RESERVED.contains(&label.as_str()) {
            return Err(invalid(format!("{label} is reserved")));
        }
        Ok(Self(label))
    }

    /// Returns the label without a leading dot.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified name of `host` under this suffix (`app` → `app.test`).
    #[must_use]
    pub fn qualify(&self, host: &str) -> String {
        format!("{host}.{}", self.0)
    }
}

impl FromStr for Suffix {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Suffix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks one DNS label: 1..=63 ASCII alphanumerics or hyphens, no hyphen at
/// either end.
pub(crate) fn validate_label(label: &str) -> std::result::Result<(), String> {
    if label.is_empty() {
        return Err("label is empty".into());
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(format!("label is longer than {MAX_LABEL_LEN} bytes"));
    }
    if let Some(bad) = label
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-')
    {
        return Err(format!("invalid character {bad:?}"));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err("label cannot start or end with '-'".into());
    }
    Ok(())
}

/// Checks a host name placed in front of the suffix; dotted names such as
/// `api.app` are allowed, each part must be a valid label.
pub(crate) fn validate_hostname(host: &str) -> std::result::Result<(), String> {
    host.split('.').try_for_each(validate_label)
}
