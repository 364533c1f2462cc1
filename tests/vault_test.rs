//! End-to-end tests of the vault operations against temporary vaults.

use std::fs;
use std::path::Path;

use notevault::{CancelToken, Frontmatter, FrontmatterParser, TreeNode, Vault, VaultError};
use tempfile::TempDir;

fn write_note(vault: &Path, rel: &str, content: &str) {
    let path = vault.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_vault() -> (TempDir, Vault) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path();

    write_note(
        root,
        "Projects/Alpha.md",
        "---\ntitle: Alpha Project\ntags:\n  - project\n  - urgent\n---\n\nThe needle in haystack. Depends on [[Beta]].\nNeeds #review\n",
    );
    write_note(root, "Projects/Beta.md", "# Beta\n\nLinks back to [[Alpha|the alpha]] and [[Beta]].\n");
    write_note(root, "Daily/2024-01-01.md", "Met about [[Projects/Alpha.md]] #review #meeting\n");
    write_note(root, "README.md", "No links, no tags.\n");

    let vault = Vault::open(root).unwrap();
    (temp_dir, vault)
}

#[test]
fn test_read_note_returns_raw_content() {
    let (tmp, vault) = sample_vault();
    let raw = vault.read_note("Projects/Alpha.md").unwrap();
    assert_eq!(raw, fs::read_to_string(tmp.path().join("Projects/Alpha.md")).unwrap());
    assert!(raw.starts_with("---\ntitle: Alpha Project"));
}

#[test]
fn test_traversal_is_rejected_everywhere() {
    let (_tmp, vault) = sample_vault();

    assert!(matches!(vault.read_note("../outside.md"), Err(VaultError::PathTraversal { .. })));
    assert!(matches!(
        vault.create_note("Projects/../../outside.md", "x", None),
        Err(VaultError::PathTraversal { .. })
    ));
    assert!(matches!(vault.edit_note("../../etc/passwd", "x"), Err(VaultError::PathTraversal { .. })));
    assert!(matches!(vault.list_notes(".."), Err(VaultError::PathTraversal { .. })));
    assert!(matches!(
        vault.update_frontmatter("../x.md", Frontmatter::new()),
        Err(VaultError::PathTraversal { .. })
    ));
}

#[test]
fn test_create_note_does_not_overwrite() {
    let (tmp, vault) = sample_vault();
    let before = fs::read_to_string(tmp.path().join("README.md")).unwrap();

    let err = vault.create_note("README.md", "clobbered", None).unwrap_err();
    assert!(matches!(err, VaultError::NoteAlreadyExists { .. }));
    assert_eq!(fs::read_to_string(tmp.path().join("README.md")).unwrap(), before);
}

#[test]
fn test_create_note_makes_parent_directories() {
    let (tmp, vault) = sample_vault();
    let mut fm = Frontmatter::new();
    fm.insert("tags", vec!["new"]);

    let note = vault.create_note("Inbox/2024/idea.md", "An idea", Some(fm)).unwrap();
    assert_eq!(note.path, "Inbox/2024/idea.md");
    assert!(tmp.path().join("Inbox/2024/idea.md").is_file());
    assert_eq!(vault.find_by_tag("new").unwrap(), vec!["Inbox/2024/idea.md"]);
}

#[test]
fn test_edit_note_preserves_frontmatter() {
    let (_tmp, vault) = sample_vault();
    let before = vault.read_frontmatter("Projects/Alpha.md").unwrap();

    let note = vault.edit_note("Projects/Alpha.md", "Rewritten body").unwrap();
    assert_eq!(note.frontmatter, before);
    assert_eq!(vault.read_frontmatter("Projects/Alpha.md").unwrap(), before);

    let (_, body) = FrontmatterParser::parse(&vault.read_note("Projects/Alpha.md").unwrap()).unwrap();
    assert_eq!(body, "Rewritten body");
}

#[test]
fn test_update_frontmatter_is_full_replace() {
    let (_tmp, vault) = sample_vault();
    let mut fm = Frontmatter::new();
    fm.insert("status", "done");

    let updated = vault.update_frontmatter("Projects/Alpha.md", fm.clone()).unwrap();
    assert_eq!(updated, fm);
    assert_eq!(vault.read_frontmatter("Projects/Alpha.md").unwrap(), fm);
    assert!(vault
        .read_note("Projects/Alpha.md")
        .unwrap()
        .ends_with("Needs #review\n"));
}

#[test]
fn test_list_notes() {
    let (_tmp, vault) = sample_vault();
    let notes = vault.list_notes(".").unwrap();
    let paths: Vec<&str> = notes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["Daily/2024-01-01.md", "Projects/Alpha.md", "Projects/Beta.md", "README.md"]
    );
    assert_eq!(notes[1].title.as_deref(), Some("Alpha Project"));

    let projects = vault.list_notes("Projects").unwrap();
    assert_eq!(projects.len(), 2);

    assert!(matches!(vault.list_notes("Nowhere"), Err(VaultError::NoteNotFound { .. })));
}

#[test]
fn test_search_vault_excerpt() {
    let (_tmp, vault) = sample_vault();
    let results = vault.search_vault("needle").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "Projects/Alpha.md");
    assert!(results[0].excerpt.contains("The needle in haystack"));
    assert!(!results[0].excerpt.contains('\n'));

    assert!(matches!(vault.search_vault(""), Err(VaultError::InvalidQuery(_))));
}

#[test]
fn test_backlinks() {
    let (_tmp, vault) = sample_vault();

    let links = vault.get_backlinks("Alpha").unwrap();
    let paths: Vec<&str> = links.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["Daily/2024-01-01.md", "Projects/Beta.md"]);

    // Beta links to itself, which never counts.
    let links = vault.get_backlinks("beta").unwrap();
    let paths: Vec<&str> = links.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["Projects/Alpha.md"]);

    assert_eq!(vault.get_outgoing_links("Projects/Beta.md").unwrap(), vec!["alpha"]);
}

#[test]
fn test_tags() {
    let (_tmp, vault) = sample_vault();

    assert_eq!(vault.list_tags().unwrap(), vec!["meeting", "project", "review", "urgent"]);
    assert_eq!(
        vault.find_by_tag("#review").unwrap(),
        vec!["Daily/2024-01-01.md", "Projects/Alpha.md"]
    );
    assert!(vault.find_by_tag("rev").unwrap().is_empty());

    let summary = vault.get_tag_summary().unwrap();
    assert_eq!(summary[0].tag, "review");
    assert_eq!(summary[0].count, 2);
}

#[test]
fn test_vault_structure() {
    let (tmp, vault) = sample_vault();
    fs::write(tmp.path().join("diagram.png"), "png").unwrap();

    let tree = vault.get_vault_structure().unwrap();
    let TreeNode::Directory { children, .. } = tree else {
        panic!("vault root must be a directory node");
    };
    let names: Vec<&str> = children.iter().map(TreeNode::name).collect();
    assert_eq!(names, vec!["Daily", "Projects", "README.md"]);
}

#[test]
fn test_cancelled_token_stops_scans() {
    let (_tmp, vault) = sample_vault();
    let token = CancelToken::new();
    let scoped = vault.with_cancel_token(token.clone());
    token.cancel();

    assert!(matches!(scoped.search_vault("needle"), Err(VaultError::Cancelled)));
    assert!(matches!(scoped.get_backlinks("Alpha"), Err(VaultError::Cancelled)));
    assert!(matches!(scoped.list_tags(), Err(VaultError::Cancelled)));
    assert!(matches!(scoped.get_vault_structure(), Err(VaultError::Cancelled)));

    // The original handle is unaffected.
    assert_eq!(vault.search_vault("needle").unwrap().len(), 1);
}

#[test]
fn test_concurrent_edits_on_different_notes() {
    let (_tmp, vault) = sample_vault();

    std::thread::scope(|s| {
        for i in 0..8 {
            let vault = vault.clone();
            s.spawn(move || {
                let path = format!("Concurrent/note_{}.md", i);
                vault.create_note(&path, "start", None).unwrap();
                for round in 0..10 {
                    vault.edit_note(&path, &format!("round {}", round)).unwrap();
                }
            });
        }
    });

    let notes = vault.list_notes("Concurrent").unwrap();
    assert_eq!(notes.len(), 8);
    for note in notes {
        assert_eq!(vault.read_note(&note.path).unwrap(), "round 9");
    }
}

#[test]
fn test_concurrent_edits_on_the_same_note() {
    let (tmp, vault) = sample_vault();
    let long_body = "A".repeat(200_000);
    let short_body = "B".repeat(10);

    for _ in 0..20 {
        std::thread::scope(|s| {
            for body in [&long_body, &short_body] {
                let vault = vault.clone();
                s.spawn(move || vault.edit_note("README.md", body).unwrap());
            }
        });

        let content = vault.read_note("README.md").unwrap();
        assert!(content == long_body || content == short_body);
    }

    let leftovers: Vec<String> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}
