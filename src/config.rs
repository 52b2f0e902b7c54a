//! Registration configuration.

use crate::error::{ResolverError, Result};
use crate::suffix::validate_hostname;
use crate::target::TargetKind;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Default resolver directory (macOS and BSD-style systems).
pub const DEFAULT_RESOLVER_DIR: &str = "/etc/resolver";

/// Default shared hosts file.
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

/// Environment variable overriding the resolver directory.
pub const RESOLVER_DIR_ENV: &str = "DOTTEST_RESOLVER_DIR";

/// Environment variable overriding the hosts file.
pub const HOSTS_FILE_ENV: &str = "DOTTEST_HOSTS_FILE";

/// Where and what the engine writes.
///
/// # Example
///
/// ```
/// use dottest::RegistrationConfig;
///
/// let config = RegistrationConfig::new()
///     .with_resolver_dir("/tmp/resolver")
///     .with_port(5353)
///     .with_hostname("app")
///     .unwrap();
///
/// assert_eq!(config.port, Some(5353));
/// assert_eq!(config.hostnames, vec!["app"]);
/// assert_eq!(config.address.to_string(), "127.0.0.1");
/// ```
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Directory holding one resolver file per suffix.
    pub resolver_dir: PathBuf,

    /// Shared hosts file used as fallback.
    pub hosts_file: PathBuf,

    /// Address the suffix resolves to.
    pub address: IpAddr,

    /// Nameserver port written to resolver files. `None` leaves the
    /// platform default (53).
    pub port: Option<u16>,

    /// Extra names written to the hosts file as `<address> <name>.<suffix>`.
    /// The bare suffix line is always written.
    pub hostnames: Vec<String>,

    /// Also manage the hosts file when a resolver directory exists.
    pub hosts_alongside: bool,

    /// Restrict the engine to one target kind.
    pub kind: Option<TargetKind>,
}

impl RegistrationConfig {
    /// Creates a config with the system default paths and `127.0.0.1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver_dir: PathBuf::from(DEFAULT_RESOLVER_DIR),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
            hostnames: Vec::new(),
            hosts_alongside: false,
            kind: None,
        }
    }

    /// Like [`new`](Self::new), with paths taken from `DOTTEST_RESOLVER_DIR`
    /// and `DOTTEST_HOSTS_FILE` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(dir) = std::env::var_os(RESOLVER_DIR_ENV) {
            config.resolver_dir = dir.into();
        }
        if let Some(file) = std::env::var_os(HOSTS_FILE_ENV) {
            config.hosts_file = file.into();
        }
        config
    }

    /// Overrides the resolver directory.
    #[must_use]
    pub fn with_resolver_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resolver_dir = dir.into();
        self
    }

    /// Overrides the hosts file.
    #[must_use]
    pub fn with_hosts_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.hosts_file = file.into();
        self
    }

    /// Overrides the loopback address.
    #[must_use]
    pub const fn with_address(mut self, address: IpAddr) -> Self {
        self.address = address;
        self
    }

    /// Sets the nameserver port written to resolver files.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Adds a host name written to the hosts file under the suffix.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidSuffix`] if `host` is not a valid
    /// dotted host name.
    pub fn with_hostname(mut self, host: impl Into<String>) -> Result<Self> {
        let host = host.into().to_ascii_lowercase();
        validate_hostname(&host).map_err(|reason| ResolverError::InvalidSuffix {
            suffix: host.clone(),
            reason,
        })?;
        if !self.hostnames.contains(&host) {
            self.hostnames.push(host);
        }
        Ok(self)
    }

    /// Manages the hosts file in addition to the resolver directory.
    #[must_use]
    pub const fn with_hosts_alongside(mut self, enabled: bool) -> Self {
        self.hosts_alongside = enabled;
        self
    }

    /// Restricts the engine to one target kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: TargetKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self::new()
    }
}
