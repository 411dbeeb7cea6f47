//! Unit tests for the observe module.
//! Everything runs against `MemoryBackend`; no filesystem or timing.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{
    sync::{Arc, Mutex},
    thread,
};

use toml::Value;

use crate::{
    AnyKey, Defaults, Key, MemoryBackend, ObserveOptions, Preferences, backend::Backend,
};

const VOLUME: Key<u8> = Key::from_static("volume");
const BALANCE: Key<u8> = Key::from_static("balance");
const THEME: Key<String> = Key::from_static("theme");

type Log<T> = Arc<Mutex<Vec<T>>>;

fn log<T>() -> Log<T> {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries<T: Clone>(log: &Log<T>) -> Vec<T> {
    log.lock().unwrap().clone()
}

#[test]
fn set_on_observed_key_fires_once_with_value() {
    let prefs = Preferences::in_memory();
    let seen = log();
    let sink = Arc::clone(&seen);

    let _observer = prefs.observe(&VOLUME, move |_, key, value| {
        sink.lock().unwrap().push((key.name().to_string(), value));
    });

    prefs.set(&VOLUME, &7).unwrap();

    assert_eq!(entries(&seen), vec![("volume".to_string(), Some(7))]);
}

#[test]
fn set_on_other_key_does_not_fire() {
    let prefs = Preferences::in_memory();
    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);

    let _observer = prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));

    prefs.set(&BALANCE, &3).unwrap();
    prefs.set(&THEME, &"dark".to_string()).unwrap();

    assert!(entries(&seen).is_empty());
}

#[test]
fn callback_receives_the_store() {
    let prefs = Preferences::in_memory();
    prefs.set(&THEME, &"dark".to_string()).unwrap();

    let seen = log();
    let sink = Arc::clone(&seen);
    let _observer = prefs.observe(&VOLUME, move |store, _, _| {
        sink.lock().unwrap().push(store.get(&THEME));
    });

    prefs.set(&VOLUME, &1).unwrap();
    assert_eq!(entries(&seen), vec![Some("dark".to_string())]);
}

#[test]
fn invalidate_stops_delivery_and_is_idempotent() {
    let prefs = Preferences::in_memory();
    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);

    let observer = prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));
    prefs.set(&VOLUME, &1).unwrap();

    observer.invalidate();
    assert!(!observer.is_active());
    observer.invalidate();

    prefs.set(&VOLUME, &2).unwrap();
    assert_eq!(entries(&seen), vec![Some(1)]);
}

#[test]
fn dropping_the_handle_silently_stops_delivery() {
    let backend = Arc::new(MemoryBackend::new());
    let prefs = Preferences::new(backend.clone());
    let seen: Log<Option<u8>> = log();

    {
        let sink = Arc::clone(&seen);
        let _observer =
            prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));
        prefs.set(&VOLUME, &1).unwrap();
        assert_eq!(backend.subscriber_count("volume"), 1);
    }

    prefs.set(&VOLUME, &2).unwrap();

    assert_eq!(entries(&seen), vec![Some(1)]);
    assert_eq!(backend.subscriber_count("volume"), 0);
}

#[test]
fn discarding_the_handle_immediately_observes_nothing() {
    let prefs = Preferences::in_memory();
    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);

    let _ = prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));

    prefs.set(&VOLUME, &1).unwrap();
    assert!(entries(&seen).is_empty());
}

#[test]
fn multi_key_observer_reports_each_firing_key_in_order() {
    let prefs = Preferences::in_memory();
    let seen = log();
    let sink = Arc::clone(&seen);

    let observer = prefs.observe_keys(&[VOLUME, BALANCE], move |_, key, value| {
        sink.lock().unwrap().push((key.clone(), value));
    });

    prefs.set(&VOLUME, &10).unwrap();
    prefs.set(&BALANCE, &50).unwrap();

    assert_eq!(entries(&seen), vec![(VOLUME, Some(10)), (BALANCE, Some(50))]);
    assert_eq!(observer.keys().len(), 2);
}

#[test]
fn duplicate_keys_are_observed_once() {
    let prefs = Preferences::in_memory();
    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);

    let observer = prefs.observe_keys(&[VOLUME, VOLUME], move |_, _, value| {
        sink.lock().unwrap().push(value);
    });

    prefs.set(&VOLUME, &1).unwrap();
    assert_eq!(entries(&seen), vec![Some(1)]);
    assert_eq!(observer.keys(), &[VOLUME.any().clone()]);
}

#[test]
fn mistyped_value_is_dropped_for_typed_callback() {
    let prefs = Preferences::in_memory();
    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);

    let _observer = prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));

    prefs.set_raw(VOLUME.any(), Some(Value::String("loud".into())));
    prefs.set(&VOLUME, &4).unwrap();

    assert_eq!(entries(&seen), vec![Some(4)]);
}

#[test]
fn removal_without_default_delivers_none() {
    let prefs = Preferences::in_memory();
    prefs.set(&VOLUME, &4).unwrap();

    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);
    let _observer = prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));

    prefs.remove(&VOLUME);
    assert_eq!(entries(&seen), vec![None]);
}

#[test]
fn removal_with_default_delivers_the_default() {
    let prefs = Preferences::in_memory();
    prefs.register(Defaults::new().with(&VOLUME, 5).unwrap());
    prefs.set(&VOLUME, &9).unwrap();

    let seen: Log<Option<u8>> = log();
    let sink = Arc::clone(&seen);
    let _observer = prefs.observe(&VOLUME, move |_, _, value| sink.lock().unwrap().push(value));

    prefs.remove(&VOLUME);
    assert_eq!(entries(&seen), vec![Some(5)]);
}

#[test]
fn initial_delivery_is_opt_in() {
    let prefs = Preferences::in_memory();
    prefs.set(&VOLUME, &3).unwrap();

    let quiet: Log<Option<u8>> = log();
    let quiet_sink = Arc::clone(&quiet);
    let _quiet = prefs.observe(&VOLUME, move |_, _, v| quiet_sink.lock().unwrap().push(v));

    let eager: Log<Option<u8>> = log();
    let eager_sink = Arc::clone(&eager);
    let _eager = prefs.observe_with(&VOLUME, ObserveOptions::with_initial(), move |_, _, v| {
        eager_sink.lock().unwrap().push(v);
    });

    assert!(entries(&quiet).is_empty());
    assert_eq!(entries(&eager), vec![Some(3)]);
}

#[test]
fn observers_of_one_key_fire_in_registration_order() {
    let prefs = Preferences::in_memory();
    let order = log();

    let observers: Vec<_> = (0..3)
        .map(|tag| {
            let order = Arc::clone(&order);
            prefs.observe(&VOLUME, move |_, _, _| order.lock().unwrap().push(tag))
        })
        .collect();

    prefs.set(&VOLUME, &1).unwrap();
    assert_eq!(entries(&order), vec![0, 1, 2]);
    drop(observers);
}

#[test]
fn callbacks_run_on_the_writing_thread() {
    let prefs = Preferences::in_memory();
    let seen = log();
    let sink = Arc::clone(&seen);

    let _observer = prefs.observe(&VOLUME, move |_, _, _| {
        sink.lock().unwrap().push(thread::current().id());
    });

    let writer = prefs.clone();
    let writer_id = thread::spawn(move || {
        writer.set(&VOLUME, &1).unwrap();
        thread::current().id()
    })
    .join()
    .unwrap();

    assert_eq!(entries(&seen), vec![writer_id]);
}

#[test]
fn heterogeneous_observer_checks_key_before_extracting() {
    let prefs = Preferences::in_memory();
    let seen = log();
    let sink = Arc::clone(&seen);

    let keys = [VOLUME.any().clone(), THEME.any().clone()];
    let _observer = prefs.observe_any(&keys, move |_, event| {
        let rendered = if let Some(volume) = event.value_for(&VOLUME) {
            format!("volume={volume}")
        } else if event.is(&THEME) {
            format!("theme={}", event.extract::<String>().unwrap())
        } else {
            panic!("unexpected key {}", event.key);
        };
        sink.lock().unwrap().push(rendered);
    });

    prefs.set(&THEME, &"dark".to_string()).unwrap();
    prefs.set(&VOLUME, &2).unwrap();

    assert_eq!(entries(&seen), vec!["theme=dark", "volume=2"]);
}

#[test]
fn change_event_carries_old_value() {
    let prefs = Preferences::in_memory();
    prefs.set(&VOLUME, &1).unwrap();

    let seen = log();
    let sink = Arc::clone(&seen);
    let _observer = prefs.observe_any(&[VOLUME.any().clone()], move |_, event| {
        sink.lock().unwrap().push(event.extract_old::<u8>().ok());
    });

    prefs.set(&VOLUME, &2).unwrap();
    assert_eq!(entries(&seen), vec![Some(1)]);
}

#[test]
fn callback_may_invalidate_its_own_observer() {
    let prefs = Preferences::in_memory();
    let slot: Arc<Mutex<Option<crate::Observer>>> = Arc::new(Mutex::new(None));
    let count = Arc::new(Mutex::new(0));

    let inner_slot = Arc::clone(&slot);
    let inner_count = Arc::clone(&count);
    let observer = prefs.observe(&VOLUME, move |_, _, _| {
        *inner_count.lock().unwrap() += 1;
        if let Some(observer) = inner_slot.lock().unwrap().as_ref() {
            observer.invalidate();
        }
    });
    *slot.lock().unwrap() = Some(observer);

    prefs.set(&VOLUME, &1).unwrap();
    prefs.set(&VOLUME, &2).unwrap();

    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn invalidation_races_with_writers_without_later_delivery() {
    let prefs = Preferences::in_memory();
    let count = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&count);

    let observer = prefs.observe(&VOLUME, move |_, _, _| *sink.lock().unwrap() += 1);

    let writer = prefs.clone();
    let handle = thread::spawn(move || {
        for i in 0..200_u8 {
            writer.set(&VOLUME, &i).unwrap();
        }
    });

    observer.invalidate();
    handle.join().unwrap();
    let settled = *count.lock().unwrap();

    for i in 0..10_u8 {
        prefs.set(&VOLUME, &i).unwrap();
    }
    assert_eq!(*count.lock().unwrap(), settled);
}

#[test]
fn observer_does_not_keep_the_backend_alive_through_its_callback() {
    let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let prefs = Preferences::new(Arc::clone(&backend));

    let observer = prefs.observe(&VOLUME, |_, _, _| {});
    drop(prefs);
    drop(observer);

    assert_eq!(Arc::strong_count(&backend), 1);
}

#[test]
fn raw_keys_from_runtime_names_observe_the_same_entry() {
    let prefs = Preferences::in_memory();
    let seen = log();
    let sink = Arc::clone(&seen);

    let runtime_key = AnyKey::new("volume").unwrap().typed::<u8>();
    let _observer = prefs.observe(&runtime_key, move |_, _, value| {
        sink.lock().unwrap().push(value);
    });

    prefs.set(&VOLUME, &6).unwrap();
    assert_eq!(entries(&seen), vec![Some(6)]);
}

mod streams {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn stream_yields_changes_in_write_order() {
        let prefs = Preferences::in_memory();
        let mut changes = prefs.changes(&[VOLUME.any().clone(), THEME.any().clone()]);

        prefs.set(&VOLUME, &1).unwrap();
        prefs.set(&THEME, &"light".to_string()).unwrap();
        prefs.set(&BALANCE, &9).unwrap();

        let first = changes.next().await.unwrap();
        let second = changes.next().await.unwrap();

        assert_eq!(first.value_for(&VOLUME), Some(1));
        assert_eq!(second.value_for(&THEME).as_deref(), Some("light"));
    }

    #[tokio::test]
    async fn invalidated_stream_drains_then_ends() {
        let prefs = Preferences::in_memory();
        let mut changes = prefs.changes(&[VOLUME.any().clone()]);

        prefs.set(&VOLUME, &1).unwrap();
        changes.observer().invalidate();
        prefs.set(&VOLUME, &2).unwrap();

        assert_eq!(changes.next().await.unwrap().value_for(&VOLUME), Some(1));
        assert!(changes.next().await.is_none());
    }

    #[tokio::test]
    async fn unpolled_stream_buffers_every_change() {
        let prefs = Preferences::in_memory();
        let changes = prefs.changes(&[VOLUME.any().clone()]);

        for i in 0..100_u8 {
            prefs.set(&VOLUME, &i).unwrap();
        }
        changes.observer().invalidate();

        let buffered: Vec<u8> = changes
            .filter_map(|event| async move { event.value_for(&VOLUME) })
            .collect()
            .await;
        assert_eq!(buffered, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn dropping_stream_unsubscribes() {
        let backend = Arc::new(MemoryBackend::new());
        let prefs = Preferences::new(backend.clone());

        let changes = prefs.changes(&[VOLUME.any().clone()]);
        assert_eq!(backend.subscriber_count("volume"), 1);

        drop(changes);
        assert_eq!(backend.subscriber_count("volume"), 0);
    }
}
