use std::{fmt, path::Path, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use toml::{Table, Value};
use tracing::{debug, instrument};

use crate::{
    backend::{Backend, MemoryBackend},
    codec,
    defaults::Defaults,
    error::{PrefsError, Result},
    key::{AnyKey, Key},
};

/// Typed access to a key-value preference store.
///
/// `Preferences` is a cheap handle: clones share the same backend, and every
/// read or write goes straight through to it. Nothing is cached here.
///
/// ```
/// use typed_prefs::{Defaults, Key, Preferences};
///
/// const VOLUME: Key<u8> = Key::from_static("volume");
///
/// let prefs = Preferences::in_memory();
/// prefs.register(Defaults::new().with(&VOLUME, 5)?);
/// assert_eq!(prefs.get(&VOLUME), Some(5));
///
/// prefs.set(&VOLUME, &9)?;
/// assert_eq!(prefs.require(&VOLUME)?, 9);
/// # Ok::<(), typed_prefs::PrefsError>(())
/// ```
#[derive(Clone)]
pub struct Preferences {
    pub(crate) backend: Arc<dyn Backend>,
}

impl Preferences {
    /// Wraps an external store.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Creates preferences over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// The underlying store.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Registers fallback values with the store.
    #[instrument(skip_all, fields(entries = defaults.len()))]
    pub fn register(&self, defaults: Defaults) {
        self.backend.register_defaults(defaults.into_table());
    }

    /// Registers `defaults` overlaid with the resource at `resource`.
    ///
    /// Resource entries win over static ones. A missing or malformed resource
    /// is logged and the static table is registered on its own.
    pub fn register_with_resource(&self, defaults: Defaults, resource: &Path) {
        self.register(defaults.merge_resource(resource));
    }

    /// Reads `key`, returning `None` if it has no value or the value is not a `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &Key<T>) -> Option<T> {
        match self.require(key) {
            Ok(value) => Some(value),
            Err(PrefsError::Missing { .. }) => None,
            Err(e) => {
                debug!(error = %e, "treating mistyped value as absent");
                None
            }
        }
    }

    /// Reads `key`, which the caller expects to be present.
    ///
    /// # Errors
    /// * `PrefsError::Missing` - no stored value and no registered default
    /// * `PrefsError::TypeMismatch` - the value does not decode as `T`
    pub fn require<T: DeserializeOwned>(&self, key: &Key<T>) -> Result<T> {
        let raw = self
            .backend
            .get(key.name())
            .ok_or_else(|| PrefsError::Missing {
                key: key.name().to_string(),
            })?;

        codec::decode(key.name(), &raw)
    }

    /// Reads `key`, falling back to `T::default()` when absent or mistyped.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &Key<T>) -> T {
        self.get(key).unwrap_or_default()
    }

    /// Reads the raw value of `key`.
    pub fn get_raw(&self, key: &AnyKey) -> Option<Value> {
        self.backend.get(key.as_str())
    }

    /// Writes `value` to `key`, notifying observers of `key`.
    ///
    /// Writing `None` to an `Option` key removes the stored value, exactly
    /// like [`remove`](Self::remove).
    ///
    /// # Errors
    /// Returns `PrefsError::Serialization` if `value` has no raw representation.
    /// Store-side failures are not reported.
    pub fn set<T: Serialize>(&self, key: &Key<T>, value: &T) -> Result<()> {
        let raw = codec::encode(key.name(), value)?;
        debug!(key = %key, present = raw.is_some(), "set");
        self.backend.set(key.name(), raw);
        Ok(())
    }

    /// Writes a raw value, or removes the stored value when `None`.
    pub fn set_raw(&self, key: &AnyKey, value: Option<Value>) {
        debug!(key = %key, present = value.is_some(), "set raw");
        self.backend.set(key.as_str(), value);
    }

    /// Removes the stored value of `key`, reverting it to its default if any.
    pub fn remove<T>(&self, key: &Key<T>) {
        debug!(key = %key, "remove");
        self.backend.set(key.name(), None);
    }

    /// Whether `key` has a stored value or a default.
    pub fn contains<T>(&self, key: &Key<T>) -> bool {
        self.backend.get(key.name()).is_some()
    }

    /// Every effective value in the store.
    pub fn snapshot(&self) -> Table {
        self.backend.snapshot()
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences").finish_non_exhaustive()
    }
}
