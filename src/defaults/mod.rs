//! Fallback values seeded into the store at startup.
//!
//! A [`Defaults`] table is built in code, optionally overlaid with a bundled
//! resource file, and handed to
//! [`Preferences::register`](crate::Preferences::register). Once registered,
//! the backend owns the values.

mod loading;
mod paths;

use std::path::Path;

use serde::Serialize;
use toml::{Table, Value};
use tracing::{debug, warn};

use crate::{
    codec,
    error::Result,
    key::{AnyKey, Key},
};

pub use loading::{load_resource, parse_json, parse_toml};
pub use paths::DefaultsPaths;

/// Mapping from key to fallback value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    entries: Table,
}

impl Defaults {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default for `key`.
    ///
    /// A value that encodes to nothing (`None` for an `Option` key) clears the
    /// default instead.
    ///
    /// # Errors
    /// Returns `PrefsError::Serialization` if `value` has no raw representation.
    pub fn insert<T: Serialize>(&mut self, key: &Key<T>, value: &T) -> Result<&mut Self> {
        match codec::encode(key.name(), value)? {
            Some(raw) => {
                self.entries.insert(key.name().to_string(), raw);
            }
            None => {
                self.entries.remove(key.name());
            }
        }
        Ok(self)
    }

    /// Builder form of [`insert`](Self::insert).
    ///
    /// # Errors
    /// Returns `PrefsError::Serialization` if `value` has no raw representation.
    pub fn with<T: Serialize>(mut self, key: &Key<T>, value: T) -> Result<Self> {
        self.insert(key, &value)?;
        Ok(self)
    }

    /// Sets or clears the default for `key`. `None` means "no default".
    ///
    /// # Errors
    /// Returns `PrefsError::Serialization` if `value` has no raw representation.
    pub fn insert_optional<T: Serialize>(
        &mut self,
        key: &Key<T>,
        value: Option<&T>,
    ) -> Result<&mut Self> {
        match value {
            Some(value) => self.insert(key, value),
            None => {
                self.entries.remove(key.name());
                Ok(self)
            }
        }
    }

    /// Sets an already-encoded default.
    pub fn insert_raw(&mut self, key: &AnyKey, value: Value) -> &mut Self {
        self.entries.insert(key.as_str().to_string(), value);
        self
    }

    /// The raw default for `name`, if any.
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over raw names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlays `overlay` on this table; on collision the overlay wins.
    pub fn merge(mut self, overlay: Table) -> Self {
        for (key, value) in overlay {
            self.entries.insert(key, value);
        }
        self
    }

    /// Overlays the resource at `path`, keeping this table unchanged if the
    /// resource is missing or malformed.
    pub fn merge_resource(self, path: &Path) -> Self {
        match load_resource(path) {
            Ok(table) => {
                debug!(path = %path.display(), entries = table.len(), "merged defaults resource");
                self.merge(table)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "defaults resource unavailable, using static defaults");
                self
            }
        }
    }

    /// Overlays the resource at `path`.
    ///
    /// # Errors
    /// Returns an error if the resource cannot be read or parsed.
    pub fn try_merge_resource(self, path: &Path) -> Result<Self> {
        let table = load_resource(path)?;
        Ok(self.merge(table))
    }

    /// Consumes the table, yielding the raw mapping.
    pub fn into_table(self) -> Table {
        self.entries
    }
}
