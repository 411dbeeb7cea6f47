//! Typed-prefs - strongly-typed keys and per-key observers over a key-value
//! preference store.
//!
//! The crate wraps an external store (anything implementing
//! [`backend::Backend`]) with two conveniences:
//!
//! - Typed keys and accessors: a [`Key<T>`] fixes the type its value is read
//!   and written as, so callers never cast raw values themselves.
//! - Change observation per key or per group of keys, with the key that fired
//!   and the typed new value delivered to a callback.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use typed_prefs::{Defaults, Key, Preferences};
//!
//! const LAUNCH_AT_LOGIN: Key<bool> = Key::from_static("launchAtLogin");
//!
//! let prefs = Preferences::in_memory();
//! prefs.register(Defaults::new().with(&LAUNCH_AT_LOGIN, false)?);
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! // Keep the observer alive: dropping it stops delivery.
//! let _observer = prefs.observe(&LAUNCH_AT_LOGIN, move |_, _, value| {
//!     sink.lock().unwrap().push(value);
//! });
//!
//! prefs.set(&LAUNCH_AT_LOGIN, &true)?;
//! assert_eq!(*seen.lock().unwrap(), vec![Some(true)]);
//! # Ok::<(), typed_prefs::PrefsError>(())
//! ```

/// External store contract and the in-memory implementation.
pub mod backend;

/// Conversion between raw store values and typed values.
pub mod codec;

/// Default registration tables and bundled resources.
pub mod defaults;

/// Error types and result aliases.
pub mod error;

/// Typed and untyped preference keys.
pub mod key;

/// Per-key change observation.
pub mod observe;

mod store;

pub use backend::{Backend, MemoryBackend, ObserveOptions};
pub use defaults::{Defaults, DefaultsPaths};
pub use error::{PrefsError, Result};
pub use key::{AnyKey, Key};
pub use observe::{ChangeEvent, ChangeStream, Observer};
pub use store::Preferences;
