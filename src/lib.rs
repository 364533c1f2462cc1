//! Sandboxed engine for a vault of markdown notes: note storage with YAML
//! frontmatter, full-text search, backlinks, tags and the directory tree.
//!
//! Every operation reads the vault fresh; there is no index or cache that
//! outlives a call.

pub mod commands;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod links;
pub mod path;
pub mod search;
pub mod store;
pub mod tags;
pub mod tree;

use std::path::Path;
use std::sync::Arc;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use frontmatter::{Frontmatter, FrontmatterParser, FrontmatterValue};
pub use links::{Backlink, LinkGraph};
pub use path::VaultRoot;
pub use search::{SearchIndex, SearchMatch};
pub use store::{CancelToken, Note, NoteInfo, NoteStore};
pub use tags::{TagCatalog, TagSummary};
pub use tree::TreeNode;

/// Entry point for all vault operations. Cheap to clone; clones share the
/// root handle.
#[derive(Debug, Clone)]
pub struct Vault {
    root: Arc<VaultRoot>,
    cancel: CancelToken,
}

impl Vault {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = VaultRoot::open(path)?;
        log::info!("[vault] Connected to vault: {:?}", root.path());
        Ok(Self {
            root: Arc::new(root),
            cancel: CancelToken::new(),
        })
    }

    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        Self::open(&config.vault_path)
    }

    /// A handle on the same vault whose scans observe `token`. Transports
    /// create one per request to support cancellation.
    pub fn with_cancel_token(&self, token: CancelToken) -> Self {
        Self {
            root: Arc::clone(&self.root),
            cancel: token,
        }
    }

    pub fn root(&self) -> &VaultRoot {
        &self.root
    }

    fn store(&self) -> NoteStore<'_> {
        NoteStore::new(&self.root)
    }

    /// Full content of a note, frontmatter block included.
    pub fn read_note(&self, filepath: &str) -> Result<String> {
        log::debug!("[read_note] {}", filepath);
        self.store().read_raw(filepath)
    }

    pub fn create_note(&self, filepath: &str, content: &str, frontmatter: Option<Frontmatter>) -> Result<Note> {
        log::debug!("[create_note] {}", filepath);
        self.store().create(filepath, content, frontmatter)
    }

    /// Replace a note's body; its frontmatter is preserved.
    pub fn edit_note(&self, filepath: &str, content: &str) -> Result<Note> {
        log::debug!("[edit_note] {}", filepath);
        self.store().edit(filepath, content)
    }

    pub fn list_notes(&self, directory: &str) -> Result<Vec<NoteInfo>> {
        log::debug!("[list_notes] {}", directory);
        self.store().list(directory, &self.cancel)
    }

    pub fn search_vault(&self, query: &str) -> Result<Vec<SearchMatch>> {
        log::debug!("[search_vault] {:?}", query);
        let store = self.store();
        SearchIndex::new(&store).search(query, &self.cancel)
    }

    pub fn get_vault_structure(&self) -> Result<TreeNode> {
        log::debug!("[get_vault_structure]");
        tree::build_tree(&self.root, &self.cancel)
    }

    pub fn read_frontmatter(&self, filepath: &str) -> Result<Frontmatter> {
        log::debug!("[read_frontmatter] {}", filepath);
        self.store().read_frontmatter(filepath)
    }

    /// Replace the whole frontmatter block, leaving the body untouched.
    pub fn update_frontmatter(&self, filepath: &str, frontmatter: Frontmatter) -> Result<Frontmatter> {
        log::debug!("[update_frontmatter] {}", filepath);
        self.store().update_frontmatter(filepath, frontmatter)
    }

    /// Merge keys into the existing frontmatter block.
    pub fn merge_frontmatter(&self, filepath: &str, frontmatter: Frontmatter) -> Result<Frontmatter> {
        log::debug!("[merge_frontmatter] {}", filepath);
        self.store().merge_frontmatter(filepath, frontmatter)
    }

    pub fn get_backlinks(&self, note_name: &str) -> Result<Vec<Backlink>> {
        log::debug!("[get_backlinks] {:?}", note_name);
        let store = self.store();
        LinkGraph::new(&store).backlinks(note_name, &self.cancel)
    }

    pub fn get_outgoing_links(&self, filepath: &str) -> Result<Vec<String>> {
        log::debug!("[get_outgoing_links] {}", filepath);
        let store = self.store();
        LinkGraph::new(&store).outgoing_links(filepath)
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        log::debug!("[list_tags]");
        Ok(TagCatalog::scan(&self.store(), &self.cancel)?.tags())
    }

    pub fn get_tag_summary(&self) -> Result<Vec<TagSummary>> {
        log::debug!("[get_tag_summary]");
        Ok(TagCatalog::scan(&self.store(), &self.cancel)?.summary())
    }

    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        log::debug!("[find_by_tag] {:?}", tag);
        TagCatalog::scan(&self.store(), &self.cancel)?.notes_with(tag)
    }
}
