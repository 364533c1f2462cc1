use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::path::VaultRoot;
use crate::store::{is_markdown, CancelToken};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Directory {
        name: String,
        path: String,
        children: Vec<TreeNode>,
    },
    Note {
        name: String,
        path: String,
        size: u64,
        modified: DateTime<Utc>,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory { name, .. } | TreeNode::Note { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }
}

/// Build the directory tree of the whole vault: folders and `.md` notes,
/// hidden entries skipped, symlinks leaving the vault omitted.
pub fn build_tree(root: &VaultRoot, cancel: &CancelToken) -> Result<TreeNode> {
    let children = read_dir_recursive(root, root.path(), cancel)?;
    Ok(TreeNode::Directory {
        name: root.name(),
        path: String::new(),
        children,
    })
}

fn read_dir_recursive(root: &VaultRoot, dir: &Path, cancel: &CancelToken) -> Result<Vec<TreeNode>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        // Removed while we were walking.
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VaultError::io("read directory", dir, e)),
    };

    let mut entries: Vec<TreeNode> = Vec::new();
    for entry in read_dir {
        cancel.check()?;
        let entry = entry.map_err(|e| VaultError::io("read directory entry in", dir, e))?;
        let entry_path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with('.') {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(VaultError::io("stat", &entry_path, e)),
        };

        if file_type.is_symlink() {
            // Only in-vault links to notes are shown; directory links are never followed.
            if !root.contains_target(&entry_path) || !entry_path.is_file() || !is_markdown(&entry_path) {
                log::debug!("[get_vault_structure] Omitting symlink {:?}", entry_path);
                continue;
            }
        } else if file_type.is_dir() {
            entries.push(TreeNode::Directory {
                name,
                path: root.relative(&entry_path),
                children: read_dir_recursive(root, &entry_path, cancel)?,
            });
            continue;
        } else if !file_type.is_file() || !is_markdown(&entry_path) {
            continue;
        }

        let meta = match fs::metadata(&entry_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(VaultError::io("stat note", &entry_path, e)),
        };
        let modified = meta
            .modified()
            .map_err(|e| VaultError::io("read modification time of", &entry_path, e))?;
        entries.push(TreeNode::Note {
            name,
            path: root.relative(&entry_path),
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    // Directories first, then alphabetically
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then(a.name().to_lowercase().cmp(&b.name().to_lowercase()))
    });

    Ok(entries)
}
