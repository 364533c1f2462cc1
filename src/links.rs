//! Backlink resolution over wiki-style `[[links]]`.
//!
//! The reverse map is built lazily for a single query by scanning every
//! note body; nothing is kept between calls.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::frontmatter::FrontmatterParser;
use crate::search::parser::{extract_wiki_links, normalize_link_target};
use crate::store::{CancelToken, NoteStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlink {
    /// Path of the note that contains the link.
    pub path: String,
    pub name: String,
    /// How many times the linking note references the target.
    pub link_count: usize,
}

/// Vault-relative path of a note or link target, `/`-separated, without
/// `.md`, lowercased.
fn note_key(raw: &str) -> String {
    let target = raw.split(['|', '#']).next().unwrap_or("").trim();
    let target = target.trim_start_matches(['/', '\\']).replace('\\', "/");
    let lower = target.to_lowercase();
    match lower.strip_suffix(".md") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

pub struct LinkGraph<'s, 'r> {
    store: &'s NoteStore<'r>,
}

impl<'s, 'r> LinkGraph<'s, 'r> {
    pub fn new(store: &'s NoteStore<'r>) -> Self {
        Self { store }
    }

    /// Notes whose body links to `note_name`, sorted by path. The target
    /// note never counts as its own backlink.
    pub fn backlinks(&self, note_name: &str, cancel: &CancelToken) -> Result<Vec<Backlink>> {
        let target = normalize_link_target(note_name);
        if target.is_empty() {
            return Err(VaultError::InvalidQuery("note name must not be empty".to_string()));
        }
        // With a folder part the query names one note; a bare name names every
        // note with that stem.
        let target_path = Some(note_key(note_name)).filter(|key| key.contains('/'));

        let files = self.store.note_files(self.store.root().path(), cancel)?;
        let mut backlinks: Vec<Backlink> = files
            .par_iter()
            .map(|file| -> Result<Option<Backlink>> {
                cancel.check()?;
                let name = file.name();
                let is_target = match &target_path {
                    Some(target_path) => note_key(&file.path) == *target_path,
                    None => name.to_lowercase() == target,
                };
                if is_target {
                    return Ok(None);
                }
                let Some(content) = self.store.read_for_scan(file)? else {
                    return Ok(None);
                };
                let body = FrontmatterParser::body_for_scan(&content, &file.path);
                let link_count = extract_wiki_links(&body)
                    .iter()
                    .filter(|link| normalize_link_target(link) == target)
                    .count();

                Ok((link_count > 0).then(|| Backlink {
                    path: file.path.clone(),
                    name,
                    link_count,
                }))
            })
            .filter_map(|r| r.transpose())
            .collect::<Result<Vec<_>>>()?;

        backlinks.sort_by(|a, b| a.path.cmp(&b.path));
        log::debug!("[get_backlinks] {:?}: {} linking notes", note_name, backlinks.len());
        Ok(backlinks)
    }

    /// Distinct normalized link targets of one note, in order of first
    /// appearance.
    pub fn outgoing_links(&self, path: &str) -> Result<Vec<String>> {
        let note = self.store.read(path)?;
        let own_name = Path::new(&note.path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut targets: Vec<String> = Vec::new();
        for link in extract_wiki_links(&note.body) {
            let target = normalize_link_target(&link);
            if target.is_empty() || target == own_name || targets.contains(&target) {
                continue;
            }
            targets.push(target);
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::VaultRoot;
    use std::fs;
    use tempfile::TempDir;

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, VaultRoot) {
        let temp_dir = TempDir::new().unwrap();
        for (path, content) in files {
            let abs = temp_dir.path().join(path);
            fs::create_dir_all(abs.parent().unwrap()).unwrap();
            fs::write(abs, content).unwrap();
        }
        let root = VaultRoot::open(temp_dir.path()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_backlinks_basic() {
        let (_tmp, root) = vault_with(&[
            ("A.md", "Links to [[B]] twice: [[b|alias]]"),
            ("B.md", "I am B"),
            ("Sub/C.md", "See [[Folder/B.md#Heading]]"),
            ("D.md", "Mentions B but no link"),
        ]);
        let store = NoteStore::new(&root);

        let links = LinkGraph::new(&store).backlinks("B", &CancelToken::new()).unwrap();
        assert_eq!(
            links,
            vec![
                Backlink { path: "A.md".into(), name: "A".into(), link_count: 2 },
                Backlink { path: "Sub/C.md".into(), name: "C".into(), link_count: 1 },
            ]
        );
    }

    #[test]
    fn test_self_links_are_excluded() {
        let (_tmp, root) = vault_with(&[("B.md", "Self [[B]]"), ("A.md", "[[B]]")]);
        let store = NoteStore::new(&root);

        let links = LinkGraph::new(&store).backlinks("b.md", &CancelToken::new()).unwrap();
        let paths: Vec<&str> = links.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["A.md"]);
    }

    #[test]
    fn test_folder_query_excludes_only_that_note() {
        let (_tmp, root) = vault_with(&[
            ("Archive/B.md", "Moved to [[Projects/B]]"),
            ("Projects/B.md", "Self [[B]]"),
        ]);
        let store = NoteStore::new(&root);
        let graph = LinkGraph::new(&store);

        let links = graph.backlinks("Projects/B", &CancelToken::new()).unwrap();
        let paths: Vec<&str> = links.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["Archive/B.md"]);

        let links = graph.backlinks("/projects/b.md", &CancelToken::new()).unwrap();
        assert_eq!(links.len(), 1);

        // A bare name stands for every note with that stem.
        assert!(graph.backlinks("B", &CancelToken::new()).unwrap().is_empty());
    }

    #[test]
    fn test_links_in_frontmatter_and_code_do_not_count() {
        let (_tmp, root) = vault_with(&[
            ("A.md", "---\nrelated: \"[[B]]\"\n---\n\nBody without links"),
            ("C.md", "```\n[[B]]\n```\n`[[B]]`"),
            ("D.md", "---\nbroken: [\n---\n[[B]]"),
        ]);
        let store = NoteStore::new(&root);

        let links = LinkGraph::new(&store).backlinks("B", &CancelToken::new()).unwrap();
        let paths: Vec<&str> = links.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["D.md"]);
    }

    #[test]
    fn test_empty_note_name_is_rejected() {
        let (_tmp, root) = vault_with(&[]);
        let store = NoteStore::new(&root);
        let err = LinkGraph::new(&store).backlinks(" ", &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), "invalid_query");
    }

    #[test]
    fn test_outgoing_links() {
        let (_tmp, root) = vault_with(&[(
            "Hub.md",
            "---\ntitle: Hub\n---\n[[One]] [[two|Two]] [[One#again]] [[Hub]] ![[Three.md]]",
        )]);
        let store = NoteStore::new(&root);

        let targets = LinkGraph::new(&store).outgoing_links("Hub.md").unwrap();
        assert_eq!(targets, vec!["one", "two", "three"]);
    }
}
