//! Contract for the external key-value store this crate wraps.
//!
//! The store itself (persistence, cross-process synchronisation, the actual
//! serialisation format) lives outside this crate. All the typed layer needs is
//! the [`Backend`] trait: raw reads and writes, default registration, and a
//! per-key subscription primitive that reports old and new values synchronously
//! on the writing thread.
//!
//! [`MemoryBackend`] is a complete in-process implementation, used directly by
//! applications that do not need persistence and as the fake in tests.

mod memory;

use std::sync::Arc;

use toml::{Table, Value};

pub use memory::MemoryBackend;

/// Raw change payload delivered by a backend subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeChange {
    /// Raw name of the key that changed.
    pub key: String,
    /// Effective value before the change, if any.
    pub old_value: Option<Value>,
    /// Effective value after the change, if any.
    pub new_value: Option<Value>,
    /// Token the subscriber supplied when it subscribed.
    pub context: u64,
}

/// Handler invoked for every change on a subscribed key.
pub type ChangeHandler = Arc<dyn Fn(&NativeChange) + Send + Sync>;

/// Identifies one backend subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a backend-chosen identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Options applied when subscribing to a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Deliver the current value once, immediately, with no old value.
    pub initial: bool,
}

impl ObserveOptions {
    /// Options that request an initial delivery of the current value.
    pub const fn with_initial() -> Self {
        Self { initial: true }
    }
}

/// A process-wide key-value preference store.
///
/// Implementations must invoke subscription handlers without holding any of
/// their own locks, so that a handler can read, write or unsubscribe
/// re-entrantly. Handlers for one key run in the order they subscribed.
pub trait Backend: Send + Sync {
    /// Returns the effective value: the stored value, else the registered default.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value`, or removes the stored value when `None`, then notifies
    /// every subscriber of `key`.
    fn set(&self, key: &str, value: Option<Value>);

    /// Merges `defaults` into the fallback table; later registrations win.
    fn register_defaults(&self, defaults: Table);

    /// Subscribes `handler` to changes of `key`. `context` is echoed back in
    /// every [`NativeChange`] delivered to this subscription.
    fn subscribe(
        &self,
        key: &str,
        context: u64,
        options: ObserveOptions,
        handler: ChangeHandler,
    ) -> SubscriptionId;

    /// Removes a subscription. Unknown identifiers are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Every effective value: defaults overlaid with stored values.
    fn snapshot(&self) -> Table;
}
