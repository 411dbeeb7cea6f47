use std::{
    collections::HashSet,
    fmt, mem,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use super::ChangeEvent;
use crate::{
    Preferences,
    backend::{Backend, ChangeHandler, NativeChange, ObserveOptions, SubscriptionId},
    codec,
    key::{AnyKey, Key},
};

/// A live subscription of one callback to one or more keys.
///
/// Lifecycle is one-way: active from creation until [`invalidate`] is called
/// or the handle is dropped, whichever comes first. There is no way to
/// reactivate an invalidated observer; observe again instead.
///
/// [`invalidate`]: Observer::invalidate
#[must_use = "dropping an Observer unsubscribes it immediately"]
pub struct Observer {
    backend: Arc<dyn Backend>,
    keys: Vec<AnyKey>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    active: Arc<AtomicBool>,
}

impl Observer {
    /// Stops delivery and releases the backend subscriptions.
    ///
    /// Idempotent. Once this returns no new callback invocation starts; one
    /// already running on another thread is allowed to finish.
    pub fn invalidate(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        let subscriptions = mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for id in subscriptions {
            self.backend.unsubscribe(id);
        }

        debug!(keys = ?self.keys, "observer invalidated");
    }

    /// Whether callbacks are still being delivered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The observed keys, in subscription order.
    pub fn keys(&self) -> &[AnyKey] {
        &self.keys
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("keys", &self.keys)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl Preferences {
    /// Calls `callback` every time `key` is written.
    ///
    /// The callback receives `None` when the key loses its value (removed with
    /// no default). A value that does not decode as `T` is dropped silently.
    ///
    /// The returned [`Observer`] must be kept alive; see the
    /// [module docs](crate::observe#lifetime).
    pub fn observe<T, F>(&self, key: &Key<T>, callback: F) -> Observer
    where
        T: DeserializeOwned + 'static,
        F: Fn(&Preferences, &Key<T>, Option<T>) + Send + Sync + 'static,
    {
        self.observe_keys_with(std::slice::from_ref(key), ObserveOptions::default(), callback)
    }

    /// Like [`observe`](Self::observe), with explicit subscription options.
    pub fn observe_with<T, F>(
        &self,
        key: &Key<T>,
        options: ObserveOptions,
        callback: F,
    ) -> Observer
    where
        T: DeserializeOwned + 'static,
        F: Fn(&Preferences, &Key<T>, Option<T>) + Send + Sync + 'static,
    {
        self.observe_keys_with(std::slice::from_ref(key), options, callback)
    }

    /// Calls `callback` every time any of `keys` is written, passing the key
    /// that fired. Duplicate keys are observed once.
    pub fn observe_keys<T, F>(&self, keys: &[Key<T>], callback: F) -> Observer
    where
        T: DeserializeOwned + 'static,
        F: Fn(&Preferences, &Key<T>, Option<T>) + Send + Sync + 'static,
    {
        self.observe_keys_with(keys, ObserveOptions::default(), callback)
    }

    /// Like [`observe_keys`](Self::observe_keys), with explicit subscription
    /// options.
    pub fn observe_keys_with<T, F>(
        &self,
        keys: &[Key<T>],
        options: ObserveOptions,
        callback: F,
    ) -> Observer
    where
        T: DeserializeOwned + 'static,
        F: Fn(&Preferences, &Key<T>, Option<T>) + Send + Sync + 'static,
    {
        let keys: Arc<[Key<T>]> = dedup(keys, |key| key.any()).into();
        let raw_keys = keys.iter().map(|key| key.any().clone()).collect();

        self.attach(raw_keys, options, move |prefs, change| {
            let Some(key) = fired_key(&keys[..], change) else {
                return;
            };

            match change.new_value.as_ref() {
                None => callback(prefs, key, None),
                Some(raw) => match codec::decode::<T>(key.name(), raw) {
                    Ok(value) => callback(prefs, key, Some(value)),
                    Err(e) => debug!(error = %e, "dropping change that does not match observer type"),
                },
            }
        })
    }

    /// Calls `callback` every time any of `keys` is written, with the raw
    /// change. Use this to observe keys of different value types together.
    pub fn observe_any<F>(&self, keys: &[AnyKey], callback: F) -> Observer
    where
        F: Fn(&Preferences, &ChangeEvent) + Send + Sync + 'static,
    {
        self.observe_any_with(keys, ObserveOptions::default(), callback)
    }

    /// Like [`observe_any`](Self::observe_any), with explicit subscription
    /// options.
    pub fn observe_any_with<F>(
        &self,
        keys: &[AnyKey],
        options: ObserveOptions,
        callback: F,
    ) -> Observer
    where
        F: Fn(&Preferences, &ChangeEvent) + Send + Sync + 'static,
    {
        let keys: Arc<[AnyKey]> = dedup(keys, |key| key).into();
        let raw_keys = keys.to_vec();

        self.attach(raw_keys, options, move |prefs, change| {
            let Some(key) = fired_key(&keys[..], change) else {
                return;
            };

            let event = ChangeEvent::new(
                key.clone(),
                change.old_value.clone(),
                change.new_value.clone(),
            );
            callback(prefs, &event);
        })
    }

    /// Subscribes `dispatch` to every key, using the key's position as the
    /// subscription context so the firing key can be recovered.
    #[instrument(skip(self, options, dispatch))]
    fn attach<D>(&self, keys: Vec<AnyKey>, options: ObserveOptions, dispatch: D) -> Observer
    where
        D: Fn(&Preferences, &NativeChange) + Send + Sync + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let dispatch = Arc::new(dispatch);
        let store = Arc::downgrade(&self.backend);

        let subscriptions = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let active = Arc::clone(&active);
                let dispatch = Arc::clone(&dispatch);
                let store = store.clone();

                let handler: ChangeHandler = Arc::new(move |change: &NativeChange| {
                    if !active.load(Ordering::Acquire) {
                        return;
                    }
                    let Some(backend) = store.upgrade() else {
                        return;
                    };

                    trace!(key = %change.key, "dispatching change");
                    dispatch(&Preferences { backend }, change);
                });

                self.backend
                    .subscribe(key.as_str(), index as u64, options, handler)
            })
            .collect();

        Observer {
            backend: Arc::clone(&self.backend),
            keys,
            subscriptions: Mutex::new(subscriptions),
            active,
        }
    }
}

fn fired_key<'a, K>(keys: &'a [K], change: &NativeChange) -> Option<&'a K> {
    let key = usize::try_from(change.context)
        .ok()
        .and_then(|index| keys.get(index));

    if key.is_none() {
        debug!(key = %change.key, context = change.context, "change with unknown context");
    }

    key
}

fn dedup<K: Clone>(keys: &[K], raw: impl Fn(&K) -> &AnyKey) -> Vec<K> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|&key| seen.insert(raw(key).clone()))
        .cloned()
        .collect()
}
