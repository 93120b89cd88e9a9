//! Playbook parser (JSON or YAML).

use std::path::Path;

use super::types::Playbook;
use crate::error::{Error, Result};

/// Parse a playbook from a JSON or YAML string.
///
/// Text starting with `{` is decoded as JSON, anything else as YAML.
pub fn parse_playbook(text: &str) -> Result<Playbook> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Parse("Empty playbook definition".to_string()));
    }

    let mut playbook: Playbook = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).map_err(|e| describe(e.to_string(), "JSON"))?
    } else {
        serde_yaml::from_str(trimmed).map_err(|e| describe(e.to_string(), "YAML"))?
    };

    playbook.normalize();
    Ok(playbook)
}

/// Parse a playbook from a file path.
pub fn parse_playbook_file(path: &Path) -> Result<Playbook> {
    let content = std::fs::read_to_string(path)?;
    parse_playbook(&content)
        .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
}

fn describe(msg: String, format: &str) -> Error {
    if let Some(field) = extract_missing_field(&msg) {
        Error::Parse(format!("Missing required field: {}", field))
    } else {
        Error::Parse(format!("Invalid {}: {}", format, msg))
    }
}

fn extract_missing_field(error_message: &str) -> Option<&str> {
    let marker = "missing field `";
    let start = error_message.find(marker)? + marker.len();
    let rest = &error_message[start..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}
