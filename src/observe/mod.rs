//! Per-key change observation.
//!
//! An [`Observer`] subscribes one callback to one or more keys through the
//! backend's per-key subscription primitive and translates raw change payloads
//! into typed callback invocations.
//!
//! # Lifetime
//!
//! **The caller must keep the `Observer` alive for as long as it wants
//! callbacks.** Dropping the handle unsubscribes immediately and delivery stops
//! without any error or warning. Bind it to a named variable or store it in a
//! struct field; `let _ = prefs.observe(..)` observes nothing.
//!
//! # Delivery
//!
//! Callbacks run synchronously on the thread that performed the write, in the
//! order observers subscribed to that key. A callback may freely read, write,
//! observe or invalidate from inside the callback.

mod changes;
mod observer;
mod stream;

#[cfg(test)]
mod tests;

pub use changes::ChangeEvent;
pub use observer::Observer;
pub use stream::ChangeStream;
