use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, VaultError};
use crate::frontmatter::{Frontmatter, FrontmatterParser};
use crate::path::VaultRoot;

/// A decoded note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Path relative to the vault root.
    pub path: String,
    pub frontmatter: Frontmatter,
    pub body: String,
    /// Full file content, including the frontmatter block.
    pub raw_content: String,
}

/// Listing record returned by `list_notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub path: String,
    /// File stem (note name without `.md`).
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub title: Option<String>,
}

/// A markdown file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFile {
    pub path: String,
    pub abs_path: PathBuf,
}

impl NoteFile {
    /// Note name: the file stem, without folders or extension.
    pub fn name(&self) -> String {
        self.abs_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Cooperative cancellation flag, checked once per file by every scan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VaultError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub(crate) fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn walk_error(err: walkdir::Error) -> Option<VaultError> {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    let io_err: std::io::Error = err.into();
    if io_err.kind() == ErrorKind::NotFound {
        // Removed while we were walking.
        return None;
    }
    Some(VaultError::io("walk directory", path, io_err))
}

/// Atomic file write: write to a uniquely named temp file in the same
/// directory, sync it, then rename over the target. A crash never leaves a
/// half-written note behind, and overlapping writers never share a temp file.
fn atomic_write_file(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".notevault-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| VaultError::io("create temp file in", dir, e))?;
    temp.write_all(content)
        .map_err(|e| VaultError::io("write temp file", temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| VaultError::io("sync temp file", temp.path(), e))?;
    // A failed persist drops the temp file, which removes it.
    temp.persist(path)
        .map_err(|e| VaultError::io("rename temp file onto", path, e.error))?;
    Ok(())
}

/// Read/write gateway to note files. Every path goes through
/// [`VaultRoot::resolve`] first.
pub struct NoteStore<'a> {
    root: &'a VaultRoot,
}

impl<'a> NoteStore<'a> {
    pub fn new(root: &'a VaultRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &VaultRoot {
        self.root
    }

    /// Resolve `path` and require a regular file there. Returns the
    /// resolved file and the normalized relative path that was asked for.
    fn existing_note(&self, path: &str) -> Result<(PathBuf, String)> {
        let (abs, rel) = self.root.resolve_entry(path)?;
        match fs::metadata(&abs) {
            Ok(meta) if meta.is_file() => Ok((abs, rel)),
            Ok(_) => Err(VaultError::NoteNotFound { path: path.to_string() }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VaultError::NoteNotFound { path: path.to_string() })
            }
            Err(e) => Err(VaultError::io("stat note", abs, e)),
        }
    }

    fn read_existing(&self, path: &str, abs: &Path) -> Result<String> {
        fs::read_to_string(abs).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::NoteNotFound { path: path.to_string() },
            _ => VaultError::io("read note", abs, e),
        })
    }

    /// Full raw text of a note, frontmatter included. Does not decode.
    pub fn read_raw(&self, path: &str) -> Result<String> {
        let (abs, _) = self.existing_note(path)?;
        self.read_existing(path, &abs)
    }

    pub fn read(&self, path: &str) -> Result<Note> {
        let (abs, rel) = self.existing_note(path)?;
        let raw_content = self.read_existing(path, &abs)?;
        let (frontmatter, body) = FrontmatterParser::parse(&raw_content).map_err(|e| e.in_note(path))?;
        Ok(Note {
            path: rel,
            frontmatter,
            body,
            raw_content,
        })
    }

    /// Create a new note. Never overwrites: an existing entry at `path` is an
    /// error and is left untouched.
    pub fn create(&self, path: &str, body: &str, frontmatter: Option<Frontmatter>) -> Result<Note> {
        let (abs, rel) = self.root.resolve_entry(path)?;
        if !is_markdown(&abs) {
            return Err(VaultError::InvalidPath {
                path: path.to_string(),
                reason: "notes must have a .md extension".to_string(),
            });
        }
        match fs::symlink_metadata(&abs) {
            Ok(_) => return Err(VaultError::NoteAlreadyExists { path: path.to_string() }),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(VaultError::io("stat note", abs, e)),
        }

        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io("create directory", parent, e))?;
        }

        let frontmatter = frontmatter.unwrap_or_default();
        let raw_content = FrontmatterParser::combine(&frontmatter, body)?;
        atomic_write_file(&abs, raw_content.as_bytes())?;

        log::debug!("[create_note] Created {}", rel);
        Ok(Note {
            path: rel,
            frontmatter,
            body: body.to_string(),
            raw_content,
        })
    }

    /// Replace a note's body, keeping its frontmatter untouched.
    pub fn edit(&self, path: &str, new_body: &str) -> Result<Note> {
        let mut note = self.read(path)?;
        note.body = new_body.to_string();
        self.write_back(&mut note)?;
        log::debug!("[edit_note] Updated body of {}", note.path);
        Ok(note)
    }

    pub fn read_frontmatter(&self, path: &str) -> Result<Frontmatter> {
        Ok(self.read(path)?.frontmatter)
    }

    /// Replace the whole metadata block. An empty mapping removes it.
    pub fn update_frontmatter(&self, path: &str, frontmatter: Frontmatter) -> Result<Frontmatter> {
        let mut note = self.read(path)?;
        note.frontmatter = frontmatter;
        self.write_back(&mut note)?;
        log::debug!("[update_frontmatter] Replaced frontmatter of {}", note.path);
        Ok(note.frontmatter)
    }

    /// Key-wise merge into the existing metadata block.
    pub fn merge_frontmatter(&self, path: &str, frontmatter: Frontmatter) -> Result<Frontmatter> {
        let mut note = self.read(path)?;
        note.frontmatter.merge(frontmatter);
        self.write_back(&mut note)?;
        log::debug!("[merge_frontmatter] Merged frontmatter of {}", note.path);
        Ok(note.frontmatter)
    }

    fn write_back(&self, note: &mut Note) -> Result<()> {
        let abs = self.root.resolve(&note.path)?;
        note.raw_content = FrontmatterParser::combine(&note.frontmatter, &note.body)?;
        atomic_write_file(&abs, note.raw_content.as_bytes())
    }

    /// Every markdown note under `directory`, recursively, sorted by path.
    pub fn list(&self, directory: &str, cancel: &CancelToken) -> Result<Vec<NoteInfo>> {
        let abs = self.existing_dir(directory)?;
        let files = self.note_files(&abs, cancel)?;

        let mut infos: Vec<NoteInfo> = files
            .par_iter()
            .map(|file| -> Result<Option<NoteInfo>> {
                cancel.check()?;
                let meta = match fs::metadata(&file.abs_path) {
                    Ok(meta) => meta,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(VaultError::io("stat note", &file.abs_path, e)),
                };
                let modified = meta
                    .modified()
                    .map_err(|e| VaultError::io("read modification time of", &file.abs_path, e))?;

                let title = match self.read_for_scan(file)? {
                    Some(content) => match FrontmatterParser::parse(&content) {
                        Ok((fm, _)) => fm.title().map(str::to_string),
                        Err(e) => {
                            log::warn!("[list_notes] {}", e.in_note(&file.path));
                            None
                        }
                    },
                    None => None,
                };

                Ok(Some(NoteInfo {
                    path: file.path.clone(),
                    name: file.name(),
                    size: meta.len(),
                    modified: DateTime::<Utc>::from(modified),
                    title,
                }))
            })
            .filter_map(|r| r.transpose())
            .collect::<Result<Vec<_>>>()?;

        infos.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(infos)
    }

    fn existing_dir(&self, directory: &str) -> Result<PathBuf> {
        let abs = self.root.resolve(directory)?;
        match fs::metadata(&abs) {
            Ok(meta) if meta.is_dir() => Ok(abs),
            Ok(_) => Err(VaultError::NoteNotFound { path: directory.to_string() }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VaultError::NoteNotFound { path: directory.to_string() })
            }
            Err(e) => Err(VaultError::io("stat directory", abs, e)),
        }
    }

    /// Markdown files under `dir` (an already-resolved absolute path),
    /// sorted by path. Hidden entries are skipped, directory symlinks are
    /// not descended, and file symlinks pointing outside the vault are
    /// dropped.
    pub fn note_files(&self, dir: &Path, cancel: &CancelToken) -> Result<Vec<NoteFile>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            cancel.check()?;
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => match walk_error(err) {
                    Some(e) => return Err(e),
                    None => continue,
                },
            };
            let path = entry.path();
            if !is_markdown(path) {
                continue;
            }

            let file_type = entry.file_type();
            let is_note = if file_type.is_symlink() {
                if !self.root.contains_target(path) {
                    log::debug!("[scan] Skipping symlink leaving the vault: {:?}", path);
                    false
                } else {
                    path.is_file()
                }
            } else {
                file_type.is_file()
            };

            if is_note {
                files.push(NoteFile {
                    path: self.root.relative(path),
                    abs_path: path.to_path_buf(),
                });
            }
        }
        Ok(files)
    }

    /// Read a note for a vault-wide scan. A note that vanished mid-scan or is
    /// not valid UTF-8 yields `None`; other I/O failures are errors.
    pub fn read_for_scan(&self, file: &NoteFile) -> Result<Option<String>> {
        match fs::read_to_string(&file.abs_path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("[scan] {} disappeared during scan", file.path);
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                log::warn!("[scan] Skipping {}: not valid UTF-8", file.path);
                Ok(None)
            }
            Err(e) => Err(VaultError::io("read note", &file.abs_path, e)),
        }
    }

    /// Collect all notes under the vault root, read in parallel.
    /// `None` contents (vanished or non-UTF-8 files) are dropped.
    pub fn read_all(&self, cancel: &CancelToken) -> Result<Vec<(NoteFile, String)>> {
        let files = self.note_files(self.root.path(), cancel)?;
        files
            .into_par_iter()
            .map(|file| -> Result<Option<(NoteFile, String)>> {
                cancel.check()?;
                Ok(self.read_for_scan(&file)?.map(|content| (file, content)))
            })
            .filter_map(|r| r.transpose())
            .collect()
    }
}
