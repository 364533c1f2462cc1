//! Name-based dispatch of vault operations with JSON arguments and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VaultError};
use crate::frontmatter::Frontmatter;
use crate::Vault;

fn default_directory() -> String {
    ".".to_string()
}

/// One request against the vault, tagged by operation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    ReadNote {
        filepath: String,
    },
    CreateNote {
        filepath: String,
        content: String,
        #[serde(default)]
        frontmatter: Option<Frontmatter>,
    },
    EditNote {
        filepath: String,
        content: String,
    },
    ListNotes {
        #[serde(default = "default_directory")]
        directory: String,
    },
    SearchVault {
        query: String,
    },
    GetVaultStructure,
    ReadFrontmatter {
        filepath: String,
    },
    UpdateFrontmatter {
        filepath: String,
        frontmatter: Frontmatter,
    },
    MergeFrontmatter {
        filepath: String,
        frontmatter: Frontmatter,
    },
    GetBacklinks {
        note_name: String,
    },
    GetOutgoingLinks {
        filepath: String,
    },
    ListTags,
    GetTagSummary,
    FindByTag {
        tag: String,
    },
}

impl Command {
    /// Build a command from an operation name and an optional JSON object
    /// of arguments.
    pub fn from_parts(op: &str, args: Option<Value>) -> Result<Self> {
        let mut object = match args {
            None | Some(Value::Null) => serde_json::Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(VaultError::InvalidQuery(format!(
                    "arguments must be a JSON object, got {}",
                    other
                )))
            }
        };
        object.insert("op".to_string(), Value::String(op.to_string()));
        serde_json::from_value(Value::Object(object))
            .map_err(|e| VaultError::InvalidQuery(format!("invalid arguments for {}: {}", op, e)))
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run `command` against `vault` and return its result as JSON.
pub fn execute(vault: &Vault, command: Command) -> Result<Value> {
    match command {
        Command::ReadNote { filepath } => to_json(vault.read_note(&filepath)?),
        Command::CreateNote {
            filepath,
            content,
            frontmatter,
        } => to_json(vault.create_note(&filepath, &content, frontmatter)?),
        Command::EditNote { filepath, content } => to_json(vault.edit_note(&filepath, &content)?),
        Command::ListNotes { directory } => to_json(vault.list_notes(&directory)?),
        Command::SearchVault { query } => to_json(vault.search_vault(&query)?),
        Command::GetVaultStructure => to_json(vault.get_vault_structure()?),
        Command::ReadFrontmatter { filepath } => to_json(vault.read_frontmatter(&filepath)?),
        Command::UpdateFrontmatter { filepath, frontmatter } => {
            to_json(vault.update_frontmatter(&filepath, frontmatter)?)
        }
        Command::MergeFrontmatter { filepath, frontmatter } => {
            to_json(vault.merge_frontmatter(&filepath, frontmatter)?)
        }
        Command::GetBacklinks { note_name } => to_json(vault.get_backlinks(&note_name)?),
        Command::GetOutgoingLinks { filepath } => to_json(vault.get_outgoing_links(&filepath)?),
        Command::ListTags => to_json(vault.list_tags()?),
        Command::GetTagSummary => to_json(vault.get_tag_summary()?),
        Command::FindByTag { tag } => to_json(vault.find_by_tag(&tag)?),
    }
}

/// JSON shape of a failed command.
pub fn error_json(err: &VaultError) -> Value {
    serde_json::json!({
        "error": err.kind(),
        "message": err.to_string(),
    })
}
