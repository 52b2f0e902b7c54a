//! Read-modify-write of resolver targets.
//!
//! Every write goes to a temporary file in the target's own directory and is
//! renamed over the original, so readers see either the old or the new file,
//! never a truncated one.

use crate::config::RegistrationConfig;
use crate::entry::{ManagedEntry, read_target};
use crate::error::{ResolverError, Result};
use crate::suffix::Suffix;
use crate::target::{EntryState, ResolverTarget, TargetKind};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Mode for target files created from scratch.
const NEW_FILE_MODE: u32 = 0o644;

/// Outcome of editing one target.
#[derive(Debug)]
pub enum EditResult {
    /// The target already had the intended content; nothing was written.
    Unchanged,
    /// The target was rewritten or removed.
    Applied,
    /// The edit failed; the original file is intact.
    Failed(ResolverError),
}

impl EditResult {
    /// Returns `true` for [`EditResult::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn from_write(result: Result<bool>) -> Self {
        match result {
            Ok(true) => Self::Applied,
            Ok(false) => Self::Unchanged,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Applies and removes suffix entries on resolver targets.
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    config: RegistrationConfig,
    #[cfg(test)]
    fail_before_persist: Option<std::io::ErrorKind>,
}

impl ConfigEditor {
    /// Creates an editor writing the entries described by `config`.
    #[must_use]
    pub const fn new(config: RegistrationConfig) -> Self {
        Self {
            config,
            #[cfg(test)]
            fail_before_persist: None,
        }
    }

    /// Makes every write fail with `kind` just before the rename.
    #[cfg(test)]
    pub(crate) fn failing_writes(mut self, kind: std::io::ErrorKind) -> Self {
        self.fail_before_persist = Some(kind);
        self
    }

    /// Adds the entry for `suffix` to `target`.
    ///
    /// Creates the file if needed. Returns [`EditResult::Unchanged`] without
    /// touching the file if the entry is already present.
    pub fn apply_entry(&self, target: &ResolverTarget, suffix: &Suffix) -> EditResult {
        EditResult::from_write(self.write_entry(target, suffix))
    }

    /// Removes the entry for `suffix` from `target`.
    ///
    /// A missing file, or one without the entry, is [`EditResult::Unchanged`].
    pub fn remove_entry(&self, target: &ResolverTarget, suffix: &Suffix) -> EditResult {
        EditResult::from_write(self.erase_entry(target, suffix))
    }

    fn write_entry(&self, target: &ResolverTarget, suffix: &Suffix) -> Result<bool> {
        let path = resolve_path(&target.path);
        let entry = ManagedEntry::new(target.kind, suffix, &self.config);
        let current = read_target(&path)?;

        if let Some(content) = &current {
            if entry.state_in(content) == EntryState::Present {
                tracing::debug!(path = %path.display(), "Entry already present, skipping");
                return Ok(false);
            }
        }

        let new_content = match (target.kind, current.as_deref()) {
            (TargetKind::ResolverDirectoryEntry, Some(content))
                if !content.trim().is_empty() && !entry.owns_resolver_file(content) =>
            {
                tracing::warn!(
                    path = %path.display(),
                    "Resolver file not managed by dottest, refusing to overwrite"
                );
                return Err(ResolverError::ForeignResolverFile { path });
            }
            (TargetKind::ResolverDirectoryEntry, _) => entry.render_file(),
            (TargetKind::HostsFileEntry, content) => {
                match entry.append_to(content.unwrap_or_default()) {
                    Some(updated) => updated,
                    None => return Ok(false),
                }
            }
        };

        self.replace_atomically(&path, &new_content)?;
        tracing::info!(
            suffix = %suffix,
            kind = %target.kind,
            path = %path.display(),
            "Registered suffix"
        );
        Ok(true)
    }

    fn erase_entry(&self, target: &ResolverTarget, suffix: &Suffix) -> Result<bool> {
        let path = resolve_path(&target.path);
        let entry = ManagedEntry::new(target.kind, suffix, &self.config);
        let Some(content) = read_target(&path)? else {
            tracing::debug!(path = %path.display(), "Target does not exist, skipping");
            return Ok(false);
        };

        match target.kind {
            TargetKind::ResolverDirectoryEntry => {
                if !entry.owns_resolver_file(&content) {
                    tracing::debug!(
                        path = %path.display(),
                        "Resolver file not managed by dottest, leaving it"
                    );
                    return Ok(false);
                }
                std::fs::remove_file(&path).map_err(|e| ResolverError::io(&path, e))?;
            }
            TargetKind::HostsFileEntry => {
                let Some(updated) = entry.strip_from(&content) else {
                    tracing::debug!(path = %path.display(), "Entry not present, skipping");
                    return Ok(false);
                };
                self.replace_atomically(&path, &updated)?;
            }
        }

        tracing::info!(
            suffix = %suffix,
            kind = %target.kind,
            path = %path.display(),
            "Unregistered suffix"
        );
        Ok(true)
    }

    /// Writes `content` to a sibling temp file, then renames it over `path`.
    ///
    /// The original's permissions are carried over. On any error the temp
    /// file is dropped (and deleted) before the original is touched.
    fn replace_atomically(&self, path: &Path, content: &str) -> Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            return Err(ResolverError::TargetDirectoryMissing {
                path: dir.to_path_buf(),
            });
        }

        let permissions = match std::fs::metadata(path) {
            Ok(meta) => meta.permissions(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::Permissions::from_mode(NEW_FILE_MODE)
            }
            Err(e) => return Err(ResolverError::io(path, e)),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".dottest-")
            .tempfile_in(dir)
            .map_err(|e| ResolverError::io(path, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .and_then(|()| std::fs::set_permissions(tmp.path(), permissions))
            .map_err(|e| ResolverError::io(path, e))?;

        #[cfg(test)]
        if let Some(kind) = self.fail_before_persist {
            return Err(ResolverError::io(path, std::io::Error::from(kind)));
        }

        tmp.persist(path).map_err(|e| ResolverError::io(path, e.error))?;
        Ok(())
    }
}

/// Follows a symlinked target (common for `/etc/hosts`) so the rename
/// replaces the real file instead of the link.
fn resolve_path(path: &Path) -> PathBuf {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    fn suffix() -> Suffix {
        Suffix::parse("test").unwrap()
    }

    fn hosts_target(dir: &Path) -> ResolverTarget {
        ResolverTarget::new(TargetKind::HostsFileEntry, dir.join("hosts"))
    }

    fn resolver_target(dir: &Path) -> ResolverTarget {
        ResolverTarget::new(TargetKind::ResolverDirectoryEntry, dir.join("test"))
    }

    fn editor() -> ConfigEditor {
        ConfigEditor::new(RegistrationConfig::new())
    }

    #[test]
    fn apply_to_empty_hosts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts"), "").unwrap();

        let result = editor().apply_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hosts")).unwrap(),
            "127.0.0.1 test\n"
        );
    }

    #[test]
    fn apply_twice_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts"), "127.0.0.1 test\n").unwrap();

        let result = editor().apply_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Unchanged));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hosts")).unwrap(),
            "127.0.0.1 test\n"
        );
    }

    #[test]
    fn apply_preserves_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
        std::fs::set_permissions(&hosts, std::fs::Permissions::from_mode(0o640)).unwrap();

        let result = editor().apply_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));

        let mode = std::fs::metadata(&hosts).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn new_resolver_file_is_world_readable() {
        let dir = tempfile::tempdir().unwrap();
        let result = editor().apply_entry(&resolver_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));

        let path = dir.path().join("test");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "nameserver 127.0.0.1\n");
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn apply_without_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = resolver_target(&dir.path().join("missing"));

        match editor().apply_entry(&target, &suffix()) {
            EditResult::Failed(ResolverError::TargetDirectoryMissing { path }) => {
                assert_eq!(path, dir.path().join("missing"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn apply_refuses_foreign_resolver_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test");
        std::fs::write(&path, "nameserver 10.0.0.53\n").unwrap();

        let result = editor().apply_entry(&resolver_target(dir.path()), &suffix());
        assert!(matches!(
            result,
            EditResult::Failed(ResolverError::ForeignResolverFile { .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "nameserver 10.0.0.53\n");
    }

    #[test]
    fn apply_rewrites_own_file_with_new_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test");
        std::fs::write(&path, "nameserver 127.0.0.1\nport 5353\n").unwrap();
        let editor = ConfigEditor::new(RegistrationConfig::new().with_port(6053));

        let result = editor.apply_entry(&resolver_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "nameserver 127.0.0.1\nport 6053\n"
        );
    }

    #[test]
    fn remove_resolver_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test");
        std::fs::write(&path, "nameserver 127.0.0.1\n").unwrap();
        let target = resolver_target(dir.path());

        assert!(matches!(editor().remove_entry(&target, &suffix()), EditResult::Applied));
        assert!(!path.exists());
        assert!(matches!(editor().remove_entry(&target, &suffix()), EditResult::Unchanged));
    }

    #[test]
    fn remove_resolver_file_written_with_other_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test");
        std::fs::write(&path, "nameserver 127.0.0.1\nport 5353\n").unwrap();
        let other = "127.0.0.2".parse().unwrap();
        let editor = ConfigEditor::new(RegistrationConfig::new().with_address(other));

        let result = editor.remove_entry(&resolver_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));
        assert!(!path.exists());
    }

    #[test]
    fn remove_leaves_foreign_resolver_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test");
        std::fs::write(&path, "nameserver 10.0.0.53\n").unwrap();

        let result = editor().remove_entry(&resolver_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Unchanged));
        assert!(path.exists());
    }

    #[test]
    fn remove_only_touches_managed_line() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        let original =
            "127.0.0.1 localhost\n127.0.0.1 nottest.example\n127.0.0.1 test\n::1 dev\n";
        std::fs::write(&hosts, original).unwrap();

        let result = editor().remove_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));
        assert_eq!(
            std::fs::read_to_string(&hosts).unwrap(),
            "127.0.0.1 localhost\n127.0.0.1 nottest.example\n::1 dev\n"
        );
    }

    #[test]
    fn remove_clears_hostnames_added_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
        let with_app = ConfigEditor::new(RegistrationConfig::new().with_hostname("app").unwrap());

        let installed = with_app.apply_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(installed, EditResult::Applied));

        let removed = editor().remove_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(removed, EditResult::Applied));
        assert_eq!(std::fs::read_to_string(&hosts).unwrap(), "127.0.0.1 localhost\n");
    }

    #[test]
    fn remove_missing_file_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let result = editor().remove_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Unchanged));
        assert!(!dir.path().join("hosts").exists());
    }

    #[test]
    fn failed_write_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        let original = "127.0.0.1 localhost\n# keep me\n";
        std::fs::write(&hosts, original).unwrap();

        let editor = editor().failing_writes(ErrorKind::Other);

        assert!(editor.apply_entry(&hosts_target(dir.path()), &suffix()).is_failed());
        assert_eq!(std::fs::read_to_string(&hosts).unwrap(), original);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("hosts")]);
    }

    #[test]
    fn permission_denied_names_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
        let editor = editor().failing_writes(ErrorKind::PermissionDenied);

        let EditResult::Failed(err) = editor.apply_entry(&hosts_target(dir.path()), &suffix())
        else {
            panic!("expected a failed edit");
        };
        assert!(matches!(err, ResolverError::PermissionDenied { ref path } if *path == hosts));
        assert!(err.is_permission_denied());
        assert_ne!(err.exit_code(), 0);
        assert!(err.to_string().contains(&hosts.display().to_string()));
        assert_eq!(std::fs::read_to_string(&hosts).unwrap(), "127.0.0.1 localhost\n");
    }

    #[test]
    fn edits_through_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("hosts.real");
        let link = dir.path().join("hosts");
        std::fs::write(&real, "127.0.0.1 localhost\n").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let result = editor().apply_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(result, EditResult::Applied));

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            std::fs::read_to_string(&real).unwrap(),
            "127.0.0.1 localhost\n127.0.0.1 test\n"
        );
    }

    #[test]
    fn malformed_content_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hosts"), [0xc3, 0x28, b'\n']).unwrap();

        let result = editor().apply_entry(&hosts_target(dir.path()), &suffix());
        assert!(matches!(
            result,
            EditResult::Failed(ResolverError::MalformedExistingContent { .. })
        ));
    }
}
