use std::time::Instant;

use serde::de::DeserializeOwned;
use toml::Value;

use crate::{
    codec,
    error::{PrefsError, Result},
    key::{AnyKey, Key},
};

/// A change delivered to an untyped observer.
///
/// Produced by [`Preferences::observe_any`](crate::Preferences::observe_any)
/// and [`ChangeStream`](super::ChangeStream), where the observed keys may have
/// different value types. Check [`is`](Self::is) before extracting, or use
/// [`value_for`](Self::value_for) which does both.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The key that changed.
    pub key: AnyKey,
    /// The effective value before the change, if any.
    pub old_value: Option<Value>,
    /// The effective value after the change, if any.
    pub new_value: Option<Value>,
    /// When the change was delivered.
    pub timestamp: Instant,
}

impl ChangeEvent {
    /// Creates a change event.
    pub fn new(key: AnyKey, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            key,
            old_value,
            new_value,
            timestamp: Instant::now(),
        }
    }

    /// Whether this change fired for `key`.
    pub fn is<T>(&self, key: &Key<T>) -> bool {
        self.key == *key
    }

    /// Decodes the new value as `T`.
    ///
    /// # Errors
    /// * `PrefsError::Missing` - the key no longer has a value
    /// * `PrefsError::TypeMismatch` - the value does not decode as `T`
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        self.decode(self.new_value.as_ref())
    }

    /// Decodes the old value as `T`.
    ///
    /// # Errors
    /// * `PrefsError::Missing` - the key had no value before the change
    /// * `PrefsError::TypeMismatch` - the value does not decode as `T`
    pub fn extract_old<T: DeserializeOwned>(&self) -> Result<T> {
        self.decode(self.old_value.as_ref())
    }

    /// The new value, if this change fired for `key` and decodes as `T`.
    pub fn value_for<T: DeserializeOwned>(&self, key: &Key<T>) -> Option<T> {
        if !self.is(key) {
            return None;
        }
        codec::decode_opt(self.key.as_str(), self.new_value.as_ref())
    }

    fn decode<T: DeserializeOwned>(&self, value: Option<&Value>) -> Result<T> {
        let value = value.ok_or_else(|| PrefsError::Missing {
            key: self.key.to_string(),
        })?;
        codec::decode(self.key.as_str(), value)
    }
}
