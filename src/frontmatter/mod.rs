pub mod types;

use serde_yaml::{Mapping, Value};

use crate::error::{Result, VaultError};
pub use types::{Frontmatter, FrontmatterValue};

const DELIMITER: &str = "---";

pub struct FrontmatterParser;

impl FrontmatterParser {
    /// Split a markdown file into frontmatter and body.
    ///
    /// Text that does not open with a `---` line has no frontmatter and the
    /// whole text is the body. An opened block that is never closed, or whose
    /// YAML is not a mapping, is an error.
    pub fn parse(content: &str) -> Result<(Frontmatter, String)> {
        let Some(after_open) = strip_delimiter_line(content) else {
            return Ok((Frontmatter::new(), content.to_string()));
        };

        let mut offset = 0;
        for line in after_open.split_inclusive('\n') {
            if is_delimiter(line) {
                let yaml_str = &after_open[..offset];
                let rest = &after_open[offset + line.len()..];
                // Exactly one separating blank line belongs to the block.
                let body = rest
                    .strip_prefix("\r\n")
                    .or_else(|| rest.strip_prefix('\n'))
                    .unwrap_or(rest);
                let frontmatter = Self::parse_yaml(yaml_str)?;
                return Ok((frontmatter, body.to_string()));
            }
            offset += line.len();
        }

        Err(invalid("frontmatter block is not terminated by a closing '---' line"))
    }

    /// Parse the YAML text between the delimiters.
    pub fn parse_yaml(yaml_str: &str) -> Result<Frontmatter> {
        let value: Value = serde_yaml::from_str(yaml_str)
            .map_err(|e| invalid(format!("Failed to parse YAML: {}", e)))?;
        match value {
            Value::Null => Ok(Frontmatter::new()),
            Value::Mapping(mapping) => from_yaml_mapping(mapping),
            Value::Tagged(tagged) => match tagged.value {
                Value::Mapping(mapping) => from_yaml_mapping(mapping),
                _ => Err(invalid("frontmatter is not a mapping")),
            },
            _ => Err(invalid("frontmatter is not a mapping")),
        }
    }

    /// Serialize frontmatter to YAML, keys in insertion order.
    pub fn to_yaml(frontmatter: &Frontmatter) -> Result<String> {
        serde_yaml::to_string(&to_yaml_mapping(frontmatter))
            .map_err(|e| invalid(format!("Failed to serialize frontmatter: {}", e)))
    }

    /// Combine frontmatter and body into markdown content.
    pub fn combine(frontmatter: &Frontmatter, body: &str) -> Result<String> {
        if frontmatter.is_empty() {
            return Ok(body.to_string());
        }
        let yaml = Self::to_yaml(frontmatter)?;
        Ok(format!("{}\n{}{}\n\n{}", DELIMITER, yaml, DELIMITER, body))
    }

    /// Body of a note for scanning purposes. Malformed frontmatter is not
    /// fatal here: the whole text is treated as body.
    pub fn body_for_scan<'a>(content: &'a str, note_path: &str) -> std::borrow::Cow<'a, str> {
        match Self::parse(content) {
            Ok((_, body)) => std::borrow::Cow::Owned(body),
            Err(e) => {
                log::warn!("[scan] {}; scanning whole file as body", e.in_note(note_path));
                std::borrow::Cow::Borrowed(content)
            }
        }
    }
}

fn invalid(reason: impl Into<String>) -> VaultError {
    VaultError::InvalidFrontmatter {
        path: None,
        reason: reason.into(),
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// If the first line of `content` is the delimiter, return everything after it.
/// The delimiter must be followed by a newline to open a block.
fn strip_delimiter_line(content: &str) -> Option<&str> {
    let first_line_end = content.find('\n')? + 1;
    let first_line = &content[..first_line_end];
    if is_delimiter(first_line) {
        Some(&content[first_line_end..])
    } else {
        None
    }
}

fn from_yaml_mapping(mapping: Mapping) -> Result<Frontmatter> {
    let mut fm = Frontmatter::new();
    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => return Err(invalid(format!("unsupported frontmatter key: {:?}", other))),
        };
        fm.insert(key, from_yaml_value(value)?);
    }
    Ok(fm)
}

fn from_yaml_value(value: Value) -> Result<FrontmatterValue> {
    Ok(match value {
        Value::Null => FrontmatterValue::Null,
        Value::Bool(b) => FrontmatterValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FrontmatterValue::Integer(i),
            None => FrontmatterValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => FrontmatterValue::String(s),
        Value::Sequence(items) => FrontmatterValue::Sequence(
            items.into_iter().map(from_yaml_value).collect::<Result<Vec<_>>>()?,
        ),
        Value::Mapping(mapping) => FrontmatterValue::Mapping(from_yaml_mapping(mapping)?),
        Value::Tagged(tagged) => from_yaml_value(tagged.value)?,
    })
}

fn to_yaml_mapping(frontmatter: &Frontmatter) -> Mapping {
    let mut mapping = Mapping::new();
    for (key, value) in frontmatter.iter() {
        mapping.insert(Value::String(key.to_string()), to_yaml_value(value));
    }
    mapping
}

fn to_yaml_value(value: &FrontmatterValue) -> Value {
    match value {
        FrontmatterValue::Null => Value::Null,
        FrontmatterValue::Bool(b) => Value::Bool(*b),
        FrontmatterValue::Integer(i) => Value::Number((*i).into()),
        FrontmatterValue::Float(f) => Value::Number((*f).into()),
        FrontmatterValue::String(s) => Value::String(s.clone()),
        FrontmatterValue::Sequence(items) => Value::Sequence(items.iter().map(to_yaml_value).collect()),
        FrontmatterValue::Mapping(fm) => Value::Mapping(to_yaml_mapping(fm)),
    }
}
