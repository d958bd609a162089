//! Fetch Coordinator
//!
//! Owns per-source load state and the in-flight map. A source id has at most
//! one pending load; callers arriving while it runs join the same shared
//! future. The marker is cleared only by the settling future, so timeouts and
//! cancellation cannot open a second concurrent load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::types::{DataSourceState, SelectOption};
use crate::error::LoadError;

/// Callback invoked synchronously on every state transition.
pub type StateObserver = Arc<dyn Fn(&str, &DataSourceState) + Send + Sync>;

/// Future performing the actual fetch for one source.
pub type LoadFuture = BoxFuture<'static, Result<Vec<SelectOption>, LoadError>>;

/// Handle to a pending load; every clone resolves to the same options.
pub type SharedLoad = Shared<BoxFuture<'static, Vec<SelectOption>>>;

/// Write-through hook run with the fetched options before the state settles.
pub type OnSuccess = Box<dyn FnOnce(&[SelectOption]) + Send>;

/// Broadcast payload for state subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStateChange {
    pub source_id: String,
    pub state: DataSourceState,
}

struct InFlight {
    generation: u64,
    load: SharedLoad,
    cancel: watch::Sender<bool>,
}

struct Inner {
    states: Mutex<HashMap<String, DataSourceState>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    observers: Mutex<Vec<StateObserver>>,
    events: broadcast::Sender<SourceStateChange>,
    next_generation: AtomicU64,
    timeout: Option<Duration>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl FetchCoordinator {
    pub fn new(timeout: Option<Duration>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                states: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                observers: Mutex::new(Vec::new()),
                events,
                next_generation: AtomicU64::new(0),
                timeout,
            }),
        }
    }

    pub fn add_observer(&self, observer: StateObserver) {
        locked(&self.inner.observers).push(observer);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SourceStateChange> {
        self.inner.events.subscribe()
    }

    /// Seed the idle state for a source without notifying anyone.
    pub fn register(&self, source_id: &str) {
        locked(&self.inner.states)
            .entry(source_id.to_string())
            .or_default();
    }

    /// Current state; unknown ids read as idle and empty.
    pub fn state(&self, source_id: &str) -> DataSourceState {
        locked(&self.inner.states)
            .get(source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_pending(&self, source_id: &str) -> bool {
        locked(&self.inner.in_flight).contains_key(source_id)
    }

    /// Signal the pending load of `source_id`. Returns false if none is pending.
    pub fn cancel(&self, source_id: &str) -> bool {
        match locked(&self.inner.in_flight).get(source_id) {
            Some(entry) => {
                debug!("Cancelling pending load of {}", source_id);
                entry.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Join the pending load for `source_id`, or start one from `make`.
    ///
    /// `make` and `on_success` are only used when no load is pending.
    pub fn load<F>(&self, source_id: &str, make: F, on_success: OnSuccess) -> SharedLoad
    where
        F: FnOnce() -> LoadFuture,
    {
        let mut in_flight = locked(&self.inner.in_flight);
        if let Some(existing) = in_flight.get(source_id) {
            debug!("Joining pending load of {}", source_id);
            return existing.load.clone();
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let fetch = make();
        let timeout = self.inner.timeout;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = source_id.to_string();

        let load = async move {
            let Some(inner) = weak.upgrade() else {
                return Vec::new();
            };
            let coordinator = FetchCoordinator { inner };
            coordinator.transition(&id, DataSourceState::loading());
            let outcome = run_guarded(fetch, timeout, cancel_rx).await;
            coordinator.settle(&id, generation, outcome, on_success)
        }
        .boxed()
        .shared();

        in_flight.insert(
            source_id.to_string(),
            InFlight {
                generation,
                load: load.clone(),
                cancel: cancel_tx,
            },
        );
        load
    }

    fn settle(
        &self,
        source_id: &str,
        generation: u64,
        outcome: Result<Vec<SelectOption>, LoadError>,
        on_success: OnSuccess,
    ) -> Vec<SelectOption> {
        if let Ok(data) = &outcome {
            on_success(data);
        }

        {
            let mut in_flight = locked(&self.inner.in_flight);
            if in_flight.get(source_id).map(|e| e.generation) == Some(generation) {
                in_flight.remove(source_id);
            }
        }

        match outcome {
            Ok(data) => {
                self.transition(source_id, DataSourceState::loaded(data.clone()));
                data
            }
            Err(e) => {
                warn!("Data source {} failed to load: {}", source_id, e);
                self.transition(source_id, DataSourceState::failed(e.to_string()));
                Vec::new()
            }
        }
    }

    fn transition(&self, source_id: &str, state: DataSourceState) {
        locked(&self.inner.states).insert(source_id.to_string(), state.clone());

        let observers = locked(&self.inner.observers).clone();
        for observer in &observers {
            observer(source_id, &state);
        }
        // no subscribers is fine
        let _ = self.inner.events.send(SourceStateChange {
            source_id: source_id.to_string(),
            state,
        });
    }
}

async fn run_guarded(
    fetch: LoadFuture,
    timeout: Option<Duration>,
    mut cancel: watch::Receiver<bool>,
) -> Result<Vec<SelectOption>, LoadError> {
    let bounded = async move {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or(Err(LoadError::Timeout(limit))),
            None => fetch.await,
        }
    };

    tokio::select! {
        outcome = bounded => outcome,
        _ = cancelled(&mut cancel) => Err(LoadError::Cancelled),
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}
