//! The lines this crate manages inside a target, and how they are matched.
//!
//! Matching is always whole-line: a line matches when its whitespace-separated
//! tokens equal the managed line's tokens. `127.0.0.1 nottest.example` never
//! matches the `127.0.0.1 test` entry.
//!
//! Installing looks for the configured lines. Removing looks wider: any
//! two-token hosts line mapping a loopback (or the configured) address to the
//! suffix or a name under it, and any resolver file made only of such
//! `nameserver` lines and `port` lines. A revert therefore does not depend on
//! repeating the `--host`, `--address` or `--port` flags used to install.

use crate::config::RegistrationConfig;
use crate::error::{ResolverError, Result};
use crate::suffix::Suffix;
use crate::target::{EntryState, TargetKind};
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;

/// Managed lines for one suffix on one target kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManagedEntry {
    kind: TargetKind,
    lines: Vec<String>,
    suffix: String,
    address: IpAddr,
}

impl ManagedEntry {
    pub(crate) fn new(kind: TargetKind, suffix: &Suffix, config: &RegistrationConfig) -> Self {
        let address = config.address;
        let lines = match kind {
            TargetKind::ResolverDirectoryEntry => {
                let mut lines = vec![format!("nameserver {address}")];
                if let Some(port) = config.port {
                    lines.push(format!("port {port}"));
                }
                lines
            }
            TargetKind::HostsFileEntry => std::iter::once(format!("{address} {suffix}"))
                .chain(
                    config
                        .hostnames
                        .iter()
                        .map(|host| format!("{address} {}", suffix.qualify(host))),
                )
                .collect(),
        };
        Self {
            kind,
            lines,
            suffix: suffix.as_str().to_string(),
            address,
        }
    }

    #[cfg(test)]
    pub(crate) fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether `content` carries this entry.
    ///
    /// Hosts files need every configured line. Resolver files must consist of
    /// exactly the configured lines, ignoring blanks and comments. Content
    /// that still routes the suffix some other way is [`EntryState::Stale`].
    pub(crate) fn state_in(&self, content: &str) -> EntryState {
        let all_present = self
            .lines
            .iter()
            .all(|wanted| content.lines().any(|line| line_matches(line, wanted)));
        match self.kind {
            TargetKind::HostsFileEntry if all_present => EntryState::Present,
            TargetKind::HostsFileEntry if content.lines().any(|l| self.routes_suffix(l)) => {
                EntryState::Stale
            }
            TargetKind::HostsFileEntry => EntryState::Absent,
            TargetKind::ResolverDirectoryEntry if !self.owns_resolver_file(content) => {
                EntryState::Absent
            }
            TargetKind::ResolverDirectoryEntry => {
                let exact = meaningful_lines(content)
                    .all(|line| self.lines.iter().any(|wanted| line_matches(line, wanted)));
                if all_present && exact {
                    EntryState::Present
                } else {
                    EntryState::Stale
                }
            }
        }
    }

    /// Whether a resolver file has the shape this crate writes: only
    /// `nameserver <loopback or configured address>` and `port <n>` lines,
    /// with at least one nameserver.
    pub(crate) fn owns_resolver_file(&self, content: &str) -> bool {
        let mut nameservers = 0_usize;
        let all_ours = meaningful_lines(content).all(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["nameserver", ip] if self.is_our_address(ip) => {
                    nameservers += 1;
                    true
                }
                ["port", port] => port.parse::<u16>().is_ok(),
                _ => false,
            }
        });
        all_ours && nameservers > 0
    }

    /// Whether a hosts line maps one of our addresses to the suffix or a
    /// name under it.
    fn routes_suffix(&self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [ip, name] = tokens.as_slice() else {
            return false;
        };
        if !self.is_our_address(ip) {
            return false;
        }
        let name = name.to_ascii_lowercase();
        name == self.suffix
            || name
                .strip_suffix(self.suffix.as_str())
                .and_then(|head| head.strip_suffix('.'))
                .is_some_and(|head| !head.is_empty())
    }

    fn is_our_address(&self, token: &str) -> bool {
        token
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback() || ip == self.address)
    }

    /// Full content of a resolver file.
    pub(crate) fn render_file(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Appends the managed lines missing from `content`.
    ///
    /// Returns `None` when nothing is missing. A file without a trailing
    /// newline keeps that shape, so removing the lines again restores it
    /// byte for byte.
    pub(crate) fn append_to(&self, content: &str) -> Option<String> {
        let missing: Vec<&str> = self
            .lines
            .iter()
            .filter(|wanted| !content.lines().any(|line| line_matches(line, wanted)))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return None;
        }

        let mut out = content.to_string();
        if out.is_empty() || out.ends_with('\n') {
            for line in missing {
                out.push_str(line);
                out.push('\n');
            }
        } else {
            for line in missing {
                out.push('\n');
                out.push_str(line);
            }
        }
        Some(out)
    }

    /// Removes every hosts line routing the suffix from `content`, leaving
    /// all other bytes untouched. Returns `None` when no line matched.
    pub(crate) fn strip_from(&self, content: &str) -> Option<String> {
        let mut out = String::with_capacity(content.len());
        let mut removed = false;
        let mut dropped_unterminated_tail = false;

        for raw in content.split_inclusive('\n') {
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            if self.routes_suffix(line) {
                removed = true;
                dropped_unterminated_tail = !raw.ends_with('\n');
            } else {
                out.push_str(raw);
                dropped_unterminated_tail = false;
            }
        }
        if !removed {
            return None;
        }
        // The last line had no newline and was ours: the newline now ending
        // the output was inserted by `append_to`.
        if dropped_unterminated_tail && out.ends_with('\n') {
            out.pop();
        }
        Some(out)
    }
}

/// Whole-line comparison on whitespace-separated tokens.
pub(crate) fn line_matches(line: &str, wanted: &str) -> bool {
    line.split_whitespace().eq(wanted.split_whitespace())
}

fn meaningful_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Reads a target as line-oriented text. A missing file is `None`.
///
/// # Errors
///
/// [`ResolverError::MalformedExistingContent`] for binary content,
/// otherwise the mapped I/O error.
pub(crate) fn read_target(path: &Path) -> Result<Option<String>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ResolverError::io(path, e)),
    };
    if bytes.contains(&0) {
        return Err(ResolverError::MalformedExistingContent {
            path: path.to_path_buf(),
            reason: "contains NUL bytes".into(),
        });
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| ResolverError::MalformedExistingContent {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts_entry(config: &RegistrationConfig) -> ManagedEntry {
        ManagedEntry::new(TargetKind::HostsFileEntry, &Suffix::parse("test").unwrap(), config)
    }

    fn resolver_entry(config: &RegistrationConfig) -> ManagedEntry {
        ManagedEntry::new(
            TargetKind::ResolverDirectoryEntry,
            &Suffix::parse("test").unwrap(),
            config,
        )
    }

    #[test]
    fn hosts_lines_include_hostnames() {
        let config = RegistrationConfig::new().with_hostname("app").unwrap();
        assert_eq!(hosts_entry(&config).lines(), ["127.0.0.1 test", "127.0.0.1 app.test"]);
    }

    #[test]
    fn resolver_lines_include_port() {
        let config = RegistrationConfig::new().with_port(5353);
        let entry = resolver_entry(&config);
        assert_eq!(entry.render_file(), "nameserver 127.0.0.1\nport 5353\n");
    }

    #[test]
    fn matching_is_whole_line() {
        assert!(line_matches("127.0.0.1\ttest  ", "127.0.0.1 test"));
        assert!(!line_matches("127.0.0.1 nottest.example", "127.0.0.1 test"));
        assert!(!line_matches("127.0.0.1 test.example", "127.0.0.1 test"));
        assert!(!line_matches("127.0.0.1 test # dev", "127.0.0.1 test"));
        assert!(!line_matches("#127.0.0.1 test", "127.0.0.1 test"));
    }

    #[test]
    fn hosts_state_requires_every_line() {
        let config = RegistrationConfig::new().with_hostname("app").unwrap();
        let entry = hosts_entry(&config);
        assert_eq!(entry.state_in("127.0.0.1 test\n"), EntryState::Stale);
        assert_eq!(entry.state_in("127.0.0.1 localhost\n"), EntryState::Absent);
        assert_eq!(
            entry.state_in("::1 localhost\n127.0.0.1 app.test\n127.0.0.1 test\n"),
            EntryState::Present
        );
    }

    #[test]
    fn leftover_hostname_is_stale() {
        let entry = hosts_entry(&RegistrationConfig::new());
        assert_eq!(entry.state_in("127.0.0.1 app.test\n"), EntryState::Stale);
        assert_eq!(entry.state_in("::1 api.App.TEST\n"), EntryState::Stale);
        assert_eq!(entry.state_in("10.0.0.9 app.test\n"), EntryState::Absent);
        assert_eq!(entry.state_in("127.0.0.1 app.test api.test\n"), EntryState::Absent);
        assert_eq!(entry.state_in("127.0.0.1 .test\n"), EntryState::Absent);
        assert_eq!(entry.state_in("127.0.0.1 nottest\n"), EntryState::Absent);
    }

    #[test]
    fn resolver_state_must_be_exact() {
        let entry = resolver_entry(&RegistrationConfig::new());
        assert_eq!(entry.state_in("nameserver 127.0.0.1\n"), EntryState::Present);
        assert_eq!(entry.state_in("# note\n\nnameserver 127.0.0.1\n"), EntryState::Present);
        assert_eq!(entry.state_in("nameserver 127.0.0.1\nport 5353\n"), EntryState::Stale);
        assert_eq!(entry.state_in("nameserver 127.0.0.2\n"), EntryState::Stale);
        assert_eq!(entry.state_in("nameserver 10.0.0.1\n"), EntryState::Absent);
    }

    #[test]
    fn owns_resolver_file_by_shape() {
        let entry = resolver_entry(&RegistrationConfig::new());
        assert!(entry.owns_resolver_file("nameserver 127.0.0.1\nport 5353\n"));
        assert!(entry.owns_resolver_file("nameserver 127.0.0.2\n"));
        assert!(entry.owns_resolver_file("nameserver ::1\n"));
        assert!(!entry.owns_resolver_file("nameserver 10.0.0.1\n"));
        assert!(!entry.owns_resolver_file("nameserver 127.0.0.1\nsearch_order 1\n"));
        assert!(!entry.owns_resolver_file("nameserver 127.0.0.1\nport dns\n"));
        assert!(!entry.owns_resolver_file("port 5353\n"));
        assert!(!entry.owns_resolver_file(""));

        let lan = "10.0.0.53".parse().unwrap();
        let entry = resolver_entry(&RegistrationConfig::new().with_address(lan));
        assert!(entry.owns_resolver_file("nameserver 10.0.0.53\n"));
    }

    #[test]
    fn append_then_strip_restores_bytes() {
        let entry = hosts_entry(&RegistrationConfig::new());
        for original in ["", "127.0.0.1 localhost\n", "127.0.0.1 localhost", "a\r\nb\n\n"] {
            let installed = entry.append_to(original).unwrap();
            assert_eq!(entry.state_in(&installed), EntryState::Present);
            assert_eq!(entry.strip_from(&installed).unwrap(), original, "{original:?}");
        }
    }

    #[test]
    fn append_is_noop_when_present() {
        let entry = hosts_entry(&RegistrationConfig::new());
        assert_eq!(entry.append_to("127.0.0.1 test\n"), None);
        assert_eq!(entry.strip_from("127.0.0.1 localhost\n"), None);
    }

    #[test]
    fn strip_removes_every_name_under_suffix() {
        let entry = hosts_entry(&RegistrationConfig::new());
        let content = "127.0.0.1 localhost\n127.0.0.1 test\n127.0.0.1 app.test\n::1 api.test\n";
        assert_eq!(entry.strip_from(content).unwrap(), "127.0.0.1 localhost\n");
    }

    #[test]
    fn strip_leaves_other_suffixes() {
        let entry = hosts_entry(&RegistrationConfig::new());
        let content = "127.0.0.1 nottest.example\n127.0.0.1 test\n127.0.0.1 dev\n";
        assert_eq!(
            entry.strip_from(content).unwrap(),
            "127.0.0.1 nottest.example\n127.0.0.1 dev\n"
        );
    }

    #[test]
    fn read_target_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, b"127.0.0.1 a\0b\n").unwrap();
        assert!(matches!(
            read_target(&path),
            Err(ResolverError::MalformedExistingContent { .. })
        ));
        std::fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();
        assert!(matches!(
            read_target(&path),
            Err(ResolverError::MalformedExistingContent { .. })
        ));
        assert_eq!(read_target(&dir.path().join("missing")).unwrap(), None);
    }
}
