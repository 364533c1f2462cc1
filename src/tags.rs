use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::frontmatter::FrontmatterParser;
use crate::search::parser::{extract_frontmatter_tags, extract_inline_tags, normalize_tag};
use crate::store::{CancelToken, NoteStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub tag: String,
    /// Number of distinct notes carrying the tag.
    pub count: usize,
    pub notes: Vec<String>,
}

/// Tag -> note paths, built from one scan of the vault.
#[derive(Debug, Default, Clone)]
pub struct TagCatalog {
    index: BTreeMap<String, BTreeSet<String>>,
}

impl TagCatalog {
    /// Scan every note, collecting frontmatter `tags` and inline `#tags`.
    pub fn scan(store: &NoteStore, cancel: &CancelToken) -> Result<Self> {
        let notes = store.read_all(cancel)?;

        let per_note: Vec<(String, BTreeSet<String>)> = notes
            .par_iter()
            .map(|(file, content)| -> Result<(String, BTreeSet<String>)> {
                cancel.check()?;
                let mut tags = BTreeSet::new();
                match FrontmatterParser::parse(content) {
                    Ok((fm, body)) => {
                        tags.extend(extract_frontmatter_tags(&fm));
                        tags.extend(extract_inline_tags(&body));
                    }
                    Err(e) => {
                        log::warn!("[list_tags] {}; scanning whole file as body", e.in_note(&file.path));
                        tags.extend(extract_inline_tags(content));
                    }
                }
                Ok((file.path.clone(), tags))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut catalog = TagCatalog::default();
        for (path, tags) in per_note {
            for tag in tags {
                catalog.index.entry(tag).or_default().insert(path.clone());
            }
        }
        Ok(catalog)
    }

    /// All distinct tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    /// Notes carrying exactly `tag` (after normalization), sorted by path.
    pub fn notes_with(&self, tag: &str) -> Result<Vec<String>> {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return Err(VaultError::InvalidQuery("tag must not be empty".to_string()));
        }
        Ok(self
            .index
            .get(&tag)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Tags with their note counts, most used first.
    pub fn summary(&self) -> Vec<TagSummary> {
        let mut summary: Vec<TagSummary> = self
            .index
            .iter()
            .map(|(tag, paths)| TagSummary {
                tag: tag.clone(),
                count: paths.len(),
                notes: paths.iter().cloned().collect(),
            })
            .collect();
        summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        summary
    }
}
