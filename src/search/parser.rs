use once_cell::sync::Lazy;
use regex::Regex;

use crate::frontmatter::{Frontmatter, FrontmatterValue};

// Non-greedy so that `[[a]] and [[b]]` yields two links.
static WIKI_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[\[(.+?)\]\]").unwrap());

static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"``[^\n]*?``|`[^`\n]*`").unwrap());

// Target part of `[text](target)`; the link text stays visible to the tag scan.
static MARKDOWN_LINK_TARGET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\([^)\n]*\)").unwrap());

static INLINE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w#/&\[])#([\p{L}\p{N}_/\-]+)").unwrap());

fn blank(text: &str) -> String {
    text.chars().map(|c| if c == '\n' { '\n' } else { ' ' }).collect()
}

/// Replace `re`'s matches with spaces, keeping line structure intact.
fn blank_out(text: &str, re: &Regex) -> String {
    re.replace_all(text, |caps: &regex::Captures| blank(&caps[0]))
        .into_owned()
}

/// Blank out fenced code blocks and inline code spans. An unclosed fence
/// runs to the end of the note.
pub fn mask_code(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut open_fence: Option<&str> = None;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start_matches([' ', '\t']);
        match open_fence {
            Some(marker) => {
                out.push_str(&blank(line));
                if trimmed.starts_with(marker) {
                    open_fence = None;
                }
            }
            None if trimmed.starts_with("```") || trimmed.starts_with("~~~") => {
                open_fence = Some(&trimmed[..3]);
                out.push_str(&blank(line));
            }
            None => out.push_str(&blank_out(line, &INLINE_CODE_RE)),
        }
    }
    out
}

/// Extract raw wiki-link contents (`[[...]]` and `![[...]]`) outside code.
pub fn extract_wiki_links(body: &str) -> Vec<String> {
    let masked = mask_code(body);
    WIKI_LINK_RE
        .captures_iter(&masked)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Normalize a link target or note name to the form links are compared in:
/// heading/alias removed, folder prefix removed, `.md` removed, lowercased.
pub fn normalize_link_target(raw: &str) -> String {
    let target = raw.split(['|', '#']).next().unwrap_or("").trim();
    let base = target.rsplit(['/', '\\']).next().unwrap_or(target).trim();
    let base = match base.len().checked_sub(3).and_then(|i| Some((i, base.get(i..)?))) {
        Some((i, ext)) if ext.eq_ignore_ascii_case(".md") => &base[..i],
        _ => base,
    };
    base.trim().to_lowercase()
}

/// Normalize a tag: no leading `#`, no trailing `/`, lowercase.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('#')
        .trim()
        .trim_end_matches('/')
        .to_lowercase()
}

/// Extract inline `#tags` from a note body. Tags inside code, wiki-links and
/// markdown link targets are ignored, as are purely numeric ones (`#123`).
pub fn extract_inline_tags(body: &str) -> Vec<String> {
    let masked = mask_code(body);
    let masked = blank_out(&masked, &WIKI_LINK_RE);
    let masked = blank_out(&masked, &MARKDOWN_LINK_TARGET_RE);

    INLINE_TAG_RE
        .captures_iter(&masked)
        .map(|cap| normalize_tag(&cap[1]))
        .filter(|tag| !tag.is_empty() && !tag.chars().all(|c| c.is_numeric() || c == '/' || c == '-'))
        .collect()
}

/// Extract tags from the frontmatter `tags` key. Accepts a sequence of
/// strings, or a single string separated by commas and/or whitespace.
pub fn extract_frontmatter_tags(frontmatter: &Frontmatter) -> Vec<String> {
    let raw: Vec<&str> = match frontmatter.get("tags") {
        Some(FrontmatterValue::Sequence(items)) => {
            items.iter().filter_map(FrontmatterValue::as_str).collect()
        }
        Some(FrontmatterValue::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(normalize_tag)
        .filter(|tag| !tag.is_empty())
        .collect()
}
