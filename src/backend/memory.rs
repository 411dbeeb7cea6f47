use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use toml::{Table, Value};
use tracing::trace;

use super::{Backend, ChangeHandler, NativeChange, ObserveOptions, SubscriptionId};

/// In-memory [`Backend`] with synchronous, in-order change delivery.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct State {
    values: HashMap<String, Value>,
    defaults: HashMap<String, Value>,
}

impl State {
    fn effective(&self, key: &str) -> Option<Value> {
        self.values
            .get(key)
            .or_else(|| self.defaults.get(key))
            .cloned()
    }
}

#[derive(Default)]
struct Subscribers {
    by_key: HashMap<String, Vec<Subscriber>>,
    key_of: HashMap<SubscriptionId, String>,
}

struct Subscriber {
    id: SubscriptionId,
    context: u64,
    handler: ChangeHandler,
}

impl MemoryBackend {
    /// Creates an empty store with no defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscribers()
            .by_key
            .get(key)
            .map_or(0, Vec::len)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Handlers currently subscribed to `key`, in subscription order.
    ///
    /// Writers call this while still holding the state lock, so a change is
    /// delivered to exactly the subscribers present when it was applied.
    /// Lock order is always state, then subscribers.
    fn targets(&self, key: &str) -> Vec<(u64, ChangeHandler)> {
        self.subscribers()
            .by_key
            .get(key)
            .map(|subs| {
                subs.iter()
                    .map(|sub| (sub.context, Arc::clone(&sub.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn deliver(&self, pending: Pending) {
        if pending.targets.is_empty() {
            return;
        }

        trace!(key = %pending.key, subscribers = pending.targets.len(), "delivering change");

        for (context, handler) in pending.targets {
            handler(&NativeChange {
                key: pending.key.clone(),
                old_value: pending.old_value.clone(),
                new_value: pending.new_value.clone(),
                context,
            });
        }
    }
}

/// A change applied under the state lock, awaiting delivery.
struct Pending {
    key: String,
    old_value: Option<Value>,
    new_value: Option<Value>,
    targets: Vec<(u64, ChangeHandler)>,
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_state().effective(key)
    }

    fn set(&self, key: &str, value: Option<Value>) {
        let pending = {
            let mut state = self.write_state();
            let old_value = state.effective(key);

            match value {
                Some(value) => {
                    state.values.insert(key.to_string(), value);
                }
                None => {
                    state.values.remove(key);
                }
            }

            Pending {
                key: key.to_string(),
                old_value,
                new_value: state.effective(key),
                targets: self.targets(key),
            }
        };

        self.deliver(pending);
    }

    fn register_defaults(&self, defaults: Table) {
        let changed: Vec<Pending> = {
            let mut state = self.write_state();

            defaults
                .into_iter()
                .filter_map(|(key, value)| {
                    let old_value = state.effective(&key);
                    state.defaults.insert(key.clone(), value);
                    let new_value = state.effective(&key);

                    (old_value != new_value).then(|| Pending {
                        targets: self.targets(&key),
                        key,
                        old_value,
                        new_value,
                    })
                })
                .collect()
        };

        for pending in changed {
            self.deliver(pending);
        }
    }

    fn subscribe(
        &self,
        key: &str,
        context: u64,
        options: ObserveOptions,
        handler: ChangeHandler,
    ) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let initial = {
            let state = self.read_state();
            let mut subscribers = self.subscribers();

            subscribers
                .by_key
                .entry(key.to_string())
                .or_default()
                .push(Subscriber {
                    id,
                    context,
                    handler: Arc::clone(&handler),
                });
            subscribers.key_of.insert(id, key.to_string());

            options.initial.then(|| state.effective(key))
        };

        if let Some(current) = initial {
            handler(&NativeChange {
                key: key.to_string(),
                old_value: None,
                new_value: current,
                context,
            });
        }

        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.subscribers();

        let Some(key) = subscribers.key_of.remove(&id) else {
            return;
        };

        if let Some(subs) = subscribers.by_key.get_mut(&key) {
            subs.retain(|sub| sub.id != id);
            if subs.is_empty() {
                subscribers.by_key.remove(&key);
            }
        }
    }

    fn snapshot(&self) -> Table {
        let state = self.read_state();
        let mut table: Table = state
            .defaults
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, value) in &state.values {
            table.insert(key.clone(), value.clone());
        }

        table
    }
}
