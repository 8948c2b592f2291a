use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::fs::FileSystem;

/// Resolves directive paths and keeps edits inside the target workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical workspace root
    workspace_root: PathBuf,
    /// Resolved forbidden directories
    forbidden_paths: Vec<PathBuf>,
    /// Reject paths outside the root when set
    confine: bool,
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("Path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl WorkspaceGuard {
    /// Create a guard rooted at `workspace_root`, canonicalized through `fs`.
    ///
    /// `forbidden` entries are workspace-relative (absolute entries are kept as is).
    pub fn new(
        fs: &dyn FileSystem,
        workspace_root: impl AsRef<Path>,
        forbidden: &[PathBuf],
        confine: bool,
    ) -> Result<Self, PathError> {
        let root = workspace_root.as_ref();
        let workspace_root = fs.canonicalize(root).map_err(|source| PathError::Canonicalize {
            path: root.to_path_buf(),
            source,
        })?;

        let forbidden_paths = forbidden
            .iter()
            .map(|f| {
                let joined = normalize_lexically(&workspace_root.join(f));
                fs.canonicalize(&joined).unwrap_or(joined)
            })
            .collect();

        Ok(Self {
            workspace_root,
            forbidden_paths,
            confine,
        })
    }

    /// Resolve a directive path to an absolute, symlink-free path.
    ///
    /// Relative paths are taken from the workspace root; `.` and `..` are
    /// folded lexically; the deepest existing ancestor is canonicalized so a
    /// symlink cannot smuggle a not-yet-existing file out of the workspace.
    pub fn resolve(&self, fs: &dyn FileSystem, path: &str) -> Result<PathBuf, PathError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let path = Path::new(path);

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };
        let normalized = normalize_lexically(&absolute);

        let resolved = match normalized.ancestors().find(|a| fs.exists(a)) {
            Some(existing) => {
                let canonical = fs.canonicalize(existing).map_err(|source| PathError::Canonicalize {
                    path: existing.to_path_buf(),
                    source,
                })?;
                match normalized.strip_prefix(existing) {
                    Ok(rest) if !rest.as_os_str().is_empty() => canonical.join(rest),
                    _ => canonical,
                }
            }
            None => normalized,
        };

        self.check(&resolved)?;
        Ok(resolved)
    }

    fn check(&self, resolved: &Path) -> Result<(), PathError> {
        if self.confine && !resolved.starts_with(&self.workspace_root) {
            return Err(PathError::OutsideWorkspace {
                path: resolved.to_path_buf(),
                workspace: self.workspace_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if resolved.starts_with(forbidden) {
                return Err(PathError::ForbiddenPath {
                    path: resolved.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

/// Fold `.` and `..` without touching the filesystem. `..` at the root stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFileSystem, OsFileSystem};
    use std::fs;

    fn guard(workspace: &Path) -> WorkspaceGuard {
        WorkspaceGuard::new(&OsFileSystem, workspace, &[PathBuf::from(".git")], true).unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        fs::write(workspace.join("test.go"), b"").unwrap();

        let resolved = guard(workspace).resolve(&OsFileSystem, "test.go").unwrap();
        assert_eq!(resolved, workspace.canonicalize().unwrap().join("test.go"));
    }

    #[test]
    fn test_resolve_not_yet_existing_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();

        let resolved = guard(workspace)
            .resolve(&OsFileSystem, "./pkg/new/../created.go")
            .unwrap();
        assert_eq!(
            resolved,
            workspace.canonicalize().unwrap().join("pkg/created.go")
        );
    }

    #[test]
    fn test_resolve_outside_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();

        let result = guard(&workspace).resolve(&OsFileSystem, "../outside.go");
        assert!(matches!(result, Err(PathError::OutsideWorkspace { .. })));
    }

    #[test]
    fn test_unconfined_allows_outside_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();

        let guard = WorkspaceGuard::new(&OsFileSystem, &workspace, &[], false).unwrap();
        assert!(guard.resolve(&OsFileSystem, "../outside.go").is_ok());
    }

    #[test]
    fn test_resolve_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path();
        fs::create_dir_all(workspace.join(".git")).unwrap();

        let result = guard(workspace).resolve(&OsFileSystem, ".git/config");
        assert!(matches!(result, Err(PathError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_empty_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = guard(temp_dir.path()).resolve(&OsFileSystem, "   ");
        assert!(matches!(result, Err(PathError::Empty)));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = temp_dir.path().join("workspace");
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&workspace).unwrap();
        fs::create_dir_all(&outside).unwrap();
        symlink(&outside, workspace.join("escape")).unwrap();

        // The file does not exist yet, but its parent is a link out of the workspace
        let result = guard(&workspace).resolve(&OsFileSystem, "escape/new.go");
        assert!(matches!(result, Err(PathError::OutsideWorkspace { .. })));
    }

    #[test]
    fn test_memory_fs_resolution() {
        let fs = MemoryFileSystem::new().with_file("/ws/src/a.go", "");
        let guard = WorkspaceGuard::new(&fs, "/ws", &[], true).unwrap();
        assert_eq!(
            guard.resolve(&fs, "src/../src/a.go").unwrap(),
            PathBuf::from("/ws/src/a.go")
        );
        assert_eq!(
            guard.resolve(&fs, "/ws/src/b.go").unwrap(),
            PathBuf::from("/ws/src/b.go")
        );
    }
}
