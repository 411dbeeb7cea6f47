//! Statically-defined, string-backed preference keys.
//!
//! A [`Key<T>`] names one entry in the store and fixes the type its value is
//! read and written as. [`AnyKey`] is the same name with the type erased, used
//! where keys of different value types are handled together.
//!
//! Raw names must be non-empty and must not contain `.`: the store's native
//! observation addressing treats a dot as a nested-path separator, so a dotted
//! name would be observed as a path into another entry.

use std::{
    borrow::{Borrow, Cow},
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    str::FromStr,
};

use crate::error::{PrefsError, Result};

/// Character reserved by the native observation addressing scheme.
pub const PATH_SEPARATOR: char = '.';

/// An untyped key: just the raw name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnyKey(Cow<'static, str>);

impl AnyKey {
    /// Creates a key from a runtime name.
    ///
    /// # Errors
    /// Returns `PrefsError::InvalidKey` if the name is empty or contains `.`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        match validate(&name) {
            Ok(()) => Ok(Self(Cow::Owned(name))),
            Err(reason) => Err(PrefsError::InvalidKey { key: name, reason }),
        }
    }

    /// Creates a key from a string literal.
    ///
    /// Meant for `const` and `static` key definitions, where an invalid name
    /// fails compilation.
    ///
    /// # Panics
    /// Panics if the name is empty or contains `.`.
    #[allow(clippy::panic)]
    pub const fn from_static(name: &'static str) -> Self {
        match validate(name) {
            Ok(()) => Self(Cow::Borrowed(name)),
            Err(reason) => panic!("{}", reason),
        }
    }

    /// The raw name as stored in the backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attaches a value type to this name.
    pub fn typed<T>(self) -> Key<T> {
        Key {
            raw: self,
            _type: PhantomData,
        }
    }
}

impl fmt::Display for AnyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AnyKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AnyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AnyKey {
    type Err = PrefsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// A key whose value is read and written as `T`.
///
/// Equality and hashing only look at the raw name.
///
/// `T` is stored through [`codec::encode`](crate::codec::encode), so its
/// values must fit the raw value model: integers are signed 64-bit (a `u64`
/// above `i64::MAX` is rejected on write), and `None` for an `Option` key
/// means "no stored value".
///
/// ```
/// use typed_prefs::Key;
///
/// const FONT_SIZE: Key<u32> = Key::from_static("fontSize");
/// assert_eq!(FONT_SIZE.name(), "fontSize");
/// ```
pub struct Key<T> {
    raw: AnyKey,
    _type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Creates a typed key from a runtime name.
    ///
    /// # Errors
    /// Returns `PrefsError::InvalidKey` if the name is empty or contains `.`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        AnyKey::new(name).map(AnyKey::typed)
    }

    /// Creates a typed key from a string literal.
    ///
    /// # Panics
    /// Panics if the name is empty or contains `.`; in a `const` item this is
    /// a compile error.
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            raw: AnyKey::from_static(name),
            _type: PhantomData,
        }
    }

    /// The raw name as stored in the backend.
    pub fn name(&self) -> &str {
        self.raw.as_str()
    }

    /// The same key with its type erased.
    pub fn any(&self) -> &AnyKey {
        &self.raw
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.raw.as_str()).finish()
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> PartialEq<AnyKey> for Key<T> {
    fn eq(&self, other: &AnyKey) -> bool {
        &self.raw == other
    }
}

impl<T> PartialEq<Key<T>> for AnyKey {
    fn eq(&self, other: &Key<T>) -> bool {
        self == &other.raw
    }
}

impl<T> From<Key<T>> for AnyKey {
    fn from(key: Key<T>) -> Self {
        key.raw
    }
}

impl<T> From<&Key<T>> for AnyKey {
    fn from(key: &Key<T>) -> Self {
        key.raw.clone()
    }
}

const fn validate(name: &str) -> std::result::Result<(), &'static str> {
    let bytes = name.as_bytes();

    if bytes.is_empty() {
        return Err("key must not be empty");
    }

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == PATH_SEPARATOR as u8 {
            return Err("key must not contain '.'");
        }
        i += 1;
    }

    Ok(())
}
