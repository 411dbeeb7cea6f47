//! The single conversion step between raw store values and typed values.
//!
//! Everything that crosses the store boundary goes through [`encode`] and
//! [`decode`], so type checking happens in exactly one place.

use serde::{Serialize, de::DeserializeOwned};
use toml::Value;

use crate::error::{PrefsError, Result};

/// Encodes a typed value as a raw store value.
///
/// A value that serializes to nothing, such as `None` for an `Option` key or
/// a unit value, encodes as `Ok(None)`: writing it removes the stored value.
///
/// Integers are stored as signed 64-bit values, so a `u64` (or `u128`) above
/// `i64::MAX` has no raw representation.
///
/// # Errors
/// Returns `PrefsError::Serialization` if `value` has no raw representation
/// (an integer above `i64::MAX`, a map with non-string keys).
pub fn encode<T>(key: &str, value: &T) -> Result<Option<Value>>
where
    T: Serialize + ?Sized,
{
    match Value::try_from(value) {
        Ok(raw) => Ok(Some(raw)),
        Err(_) if is_none(value) => Ok(None),
        Err(e) => Err(PrefsError::Serialization {
            key: key.to_string(),
            details: e.to_string(),
        }),
    }
}

/// Whether `value` serializes to nothing (`None` or a unit value).
fn is_none<T: Serialize + ?Sized>(value: &T) -> bool {
    serde_json::to_value(value).is_ok_and(|json| json.is_null())
}

/// Decodes a raw store value as `T`.
///
/// # Errors
/// Returns `PrefsError::TypeMismatch` if the value does not have the shape of
/// `T`.
pub fn decode<T>(key: &str, value: &Value) -> Result<T>
where
    T: DeserializeOwned,
{
    T::deserialize(value.clone()).map_err(|_| PrefsError::TypeMismatch {
        key: key.to_string(),
        expected_type: std::any::type_name::<T>(),
        actual_value: value.clone(),
    })
}

/// Decodes an optional raw value, treating absence and mismatch alike.
pub fn decode_opt<T>(key: &str, value: Option<&Value>) -> Option<T>
where
    T: DeserializeOwned,
{
    value.and_then(|v| decode(key, v).ok())
}
