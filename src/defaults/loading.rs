use std::{fs, path::Path};

use serde_json::Value as JsonValue;
use toml::{Table, Value};
use tracing::{instrument, warn};

use crate::{
    error::{PrefsError, Result},
    key::AnyKey,
};

/// Loads a flat defaults table from a resource file.
///
/// Files with a `.json` extension are read as JSON, everything else as TOML.
/// Entries whose name is not a valid key are skipped; JSON `null` entries mean
/// "no default" and are skipped too.
///
/// # Errors
/// Returns an error if the file cannot be read, does not parse, or its root is
/// not a table.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_resource(path: &Path) -> Result<Table> {
    let content = fs::read_to_string(path).map_err(|e| PrefsError::io(e, path))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        parse_json_at(&content, Some(path))
    } else {
        parse_toml_at(&content, Some(path))
    }
}

/// Parses a TOML defaults document.
///
/// # Errors
/// Returns `PrefsError::TomlParseError` if the document does not parse.
pub fn parse_toml(content: &str) -> Result<Table> {
    parse_toml_at(content, None)
}

/// Parses a JSON defaults document.
///
/// # Errors
/// Returns `PrefsError::JsonParseError` if the document does not parse, or
/// `PrefsError::NotATable` if its root is not an object.
pub fn parse_json(content: &str) -> Result<Table> {
    parse_json_at(content, None)
}

fn parse_toml_at(content: &str, path: Option<&Path>) -> Result<Table> {
    let table: Table = toml::from_str(content).map_err(|e| PrefsError::toml_parse(e, path))?;

    Ok(table
        .into_iter()
        .filter(|(key, _)| is_valid_key(key))
        .collect())
}

fn parse_json_at(content: &str, path: Option<&Path>) -> Result<Table> {
    let root: JsonValue =
        serde_json::from_str(content).map_err(|e| PrefsError::json_parse(e, path))?;

    let JsonValue::Object(entries) = root else {
        return Err(PrefsError::NotATable {
            location: path.map_or_else(
                || "string".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
        });
    };

    let mut table = Table::new();

    for (key, value) in entries {
        if value.is_null() || !is_valid_key(&key) {
            continue;
        }

        match serde_json::from_value::<Value>(value) {
            Ok(value) => {
                table.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "skipping default with no raw representation"),
        }
    }

    Ok(table)
}

fn is_valid_key(name: &str) -> bool {
    match AnyKey::new(name) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "skipping default");
            false
        }
    }
}
