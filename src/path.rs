//! Sandboxed path resolution.
//!
//! Every user-supplied path is resolved through [`VaultRoot::resolve`] before
//! any file-system access. The resolved path is guaranteed to be the vault
//! root itself or one of its descendants, with symlinks already followed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, VaultError};

/// Owned handle to the vault directory. Canonicalized once at open time.
#[derive(Debug, Clone)]
pub struct VaultRoot {
    root: PathBuf,
}

impl VaultRoot {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(VaultError::RootNotFound {
                path: path.to_path_buf(),
            });
        }
        let root = path
            .canonicalize()
            .map_err(|e| VaultError::io("canonicalize vault root", path, e))?;
        log::debug!("[vault_root] Opened vault at {:?}", root);
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Display name of the vault (the root directory's own name).
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Resolve `user_path` against the root, rejecting anything that would
    /// land outside it.
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf> {
        self.resolve_entry(user_path).map(|(abs, _)| abs)
    }

    /// Like [`resolve`](Self::resolve), but also returns the lexically
    /// normalized, `/`-separated form of `user_path`. Symlinks are followed
    /// for the absolute path only, so the relative form names the entry the
    /// caller asked for.
    pub fn resolve_entry(&self, user_path: &str) -> Result<(PathBuf, String)> {
        if user_path.trim().is_empty() {
            return Err(VaultError::traversal(user_path, "empty path"));
        }
        if user_path.contains('\0') {
            return Err(VaultError::traversal(user_path, "path contains a NUL byte"));
        }

        // Leading separators mean "vault-relative", never "absolute".
        let trimmed = user_path.trim_start_matches(['/', '\\']);

        let mut normalized = self.root.clone();
        let mut parts: Vec<String> = Vec::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(VaultError::traversal(user_path, "path escapes the vault root"));
                    }
                    normalized.pop();
                }
                Component::Normal(part) => {
                    normalized.push(part);
                    parts.push(part.to_string_lossy().to_string());
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(VaultError::traversal(user_path, "absolute paths are not allowed"));
                }
            }
        }

        let resolved = self.canonicalize_existing_prefix(user_path, &normalized)?;
        if resolved != self.root && !resolved.starts_with(&self.root) {
            return Err(VaultError::traversal(
                user_path,
                format!("resolves to {:?}, outside the vault root", resolved),
            ));
        }
        Ok((resolved, parts.join("/")))
    }

    /// Canonicalize the longest ancestor of `path` that exists on disk and
    /// re-append the components that do not exist yet.
    fn canonicalize_existing_prefix(&self, user_path: &str, path: &Path) -> Result<PathBuf> {
        let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
        let mut current = path;

        loop {
            match fs::symlink_metadata(current) {
                Ok(_) => {
                    let mut canonical = current.canonicalize().map_err(|e| {
                        VaultError::traversal(user_path, format!("cannot resolve {:?}: {}", current, e))
                    })?;
                    for part in missing.iter().rev() {
                        canonical.push(part);
                    }
                    return Ok(canonical);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let name = current
                        .file_name()
                        .ok_or_else(|| VaultError::traversal(user_path, "path has no existing ancestor"))?;
                    missing.push(name);
                    current = current
                        .parent()
                        .ok_or_else(|| VaultError::traversal(user_path, "path has no existing ancestor"))?;
                }
                Err(e) => return Err(VaultError::io("inspect path", current, e)),
            }
        }
    }

    /// `/`-separated path of `abs` relative to the root. The root itself maps
    /// to an empty string.
    pub fn relative(&self, abs: &Path) -> String {
        let rel = abs.strip_prefix(&self.root).unwrap_or(abs);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Whether `abs`, once canonicalized, is still inside the vault.
    /// Used by the scanners to decide whether a symlink may be followed.
    pub(crate) fn contains_target(&self, abs: &Path) -> bool {
        match abs.canonicalize() {
            Ok(target) => target.starts_with(&self.root),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vault() -> (TempDir, VaultRoot) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("Daily")).unwrap();
        fs::write(temp_dir.path().join("Daily/today.md"), "# Today").unwrap();
        let root = VaultRoot::open(temp_dir.path()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_resolve_existing_and_new_paths() {
        let (_tmp, root) = vault();

        let existing = root.resolve("Daily/today.md").unwrap();
        assert!(existing.starts_with(root.path()));
        assert!(existing.is_file());

        let fresh = root.resolve("Projects/Deep/new.md").unwrap();
        assert_eq!(fresh, root.path().join("Projects").join("Deep").join("new.md"));
    }

    #[test]
    fn test_resolve_root_itself() {
        let (_tmp, root) = vault();
        assert_eq!(root.resolve(".").unwrap(), root.path());
        assert_eq!(root.resolve("Daily/..").unwrap(), root.path());
    }

    #[test]
    fn test_inner_parent_segments_are_allowed() {
        let (_tmp, root) = vault();
        let resolved = root.resolve("Daily/../Daily/today.md").unwrap();
        assert_eq!(resolved, root.path().join("Daily").join("today.md"));
    }

    #[test]
    fn test_escaping_parent_segments_are_rejected() {
        let (_tmp, root) = vault();
        for path in ["../secret.md", "Daily/../../secret.md", "./../../etc/passwd", ".."] {
            let err = root.resolve(path).unwrap_err();
            assert_eq!(err.kind(), "path_traversal", "path {:?} should be rejected", path);
        }
    }

    #[test]
    fn test_empty_and_nul_paths_are_rejected() {
        let (_tmp, root) = vault();
        assert!(matches!(root.resolve(""), Err(VaultError::PathTraversal { .. })));
        assert!(matches!(root.resolve("   "), Err(VaultError::PathTraversal { .. })));
        assert!(matches!(root.resolve("a\0.md"), Err(VaultError::PathTraversal { .. })));
    }

    #[test]
    fn test_leading_slash_stays_inside_vault() {
        let (_tmp, root) = vault();
        let resolved = root.resolve("/Daily/today.md").unwrap();
        assert_eq!(resolved, root.path().join("Daily").join("today.md"));

        let resolved = root.resolve("/etc/passwd").unwrap();
        assert!(resolved.starts_with(root.path()));
    }

    #[test]
    fn test_url_encoded_traversal_is_a_plain_name() {
        let (_tmp, root) = vault();
        let resolved = root.resolve("%2e%2e/secret.md").unwrap();
        assert!(resolved.starts_with(root.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let (tmp, root) = vault();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.md"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("escape")).unwrap();

        let err = root.resolve("escape/secret.md").unwrap_err();
        assert_eq!(err.kind(), "path_traversal");

        let err = root.resolve("escape/new.md").unwrap_err();
        assert_eq!(err.kind(), "path_traversal");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_a_resolution_failure() {
        let (tmp, root) = vault();
        std::os::unix::fs::symlink(tmp.path().join("missing.md"), tmp.path().join("dangling.md"))
            .unwrap();

        let err = root.resolve("dangling.md").unwrap_err();
        assert_eq!(err.kind(), "path_traversal");
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_entry_keeps_the_requested_name() {
        let (tmp, root) = vault();
        std::os::unix::fs::symlink(tmp.path().join("Daily/today.md"), tmp.path().join("alias.md"))
            .unwrap();

        let (abs, rel) = root.resolve_entry("./Daily/../alias.md").unwrap();
        assert_eq!(rel, "alias.md");
        assert_eq!(abs, root.path().join("Daily").join("today.md"));

        let (_, rel) = root.resolve_entry("/Daily//today.md").unwrap();
        assert_eq!(rel, "Daily/today.md");
    }

    #[test]
    fn test_relative_uses_forward_slashes() {
        let (_tmp, root) = vault();
        let abs = root.path().join("Daily").join("today.md");
        assert_eq!(root.relative(&abs), "Daily/today.md");
        assert_eq!(root.relative(root.path()), "");
    }

    #[test]
    fn test_open_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let err = VaultRoot::open(tmp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), "root_not_found");
    }
}
