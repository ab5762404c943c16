//! # PayKit Runtime
//!
//! Runtime implementation for the PayKit reducer architecture.
//!
//! This crate provides the Store runtime that serializes reducer execution,
//! runs effect descriptions, and notifies observers of state assignments.
//! It also hosts the transport layer the lifecycle talks to: a retrying REST
//! executor and broadcast signals for host-platform notifications.
//!
//! ## Core Components
//!
//! - **Store**: Owns the state, executes effects, tracks keyed tasks
//! - **Observers**: Receive every state assignment, in order
//! - **Retry**: Exponential backoff policy carried by requests
//! - **HTTP**: `RestExecutor` abstraction and its `reqwest` implementation
//! - **Signals**: Multi-subscriber notifications (redirects, foregrounding)
//!
//! ## Example
//!
//! ```ignore
//! use paykit_runtime::Store;
//!
//! let store = Store::new(LifecycleState::NotStarted, LifecycleReducer, environment);
//!
//! let token = store.add_observer(Arc::new(|state: &LifecycleState| {
//!     println!("now {state:?}");
//! }));
//!
//! store.send(LifecycleAction::Enter(LifecycleState::Polling)).await?;
//! let polling = store.is_active(POLLING_TIMER);
//! ```

use paykit_core::effect::Effect;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Retry logic with exponential backoff
pub mod retry;

/// REST transport: requests, exchanges, and the retrying executor
pub mod http;

/// Broadcast signals for host-platform notifications
pub mod signal;

pub use http::{Exchange, HttpRequest, HttpResponse, ResilientRestExecutor, RestExecutor, TransportError};
pub use retry::RetryPolicy;
pub use signal::{Signal, Subscription};
pub use store::{Observer, ObserverToken, Store};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store has been shut down and is not accepting new actions
        ///
        /// This error is returned when `send()` is called after `shutdown()`.
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }
}

/// Lock a std mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{Arc, Effect, Mutex, Weak, error::StoreError, lock};
    use futures::StreamExt;
    use paykit_core::effect::EffectId;
    use paykit_core::reducer::Reducer;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::MissedTickBehavior;

    /// Receives every state assignment made by a [`Store`].
    ///
    /// Notifications are delivered while the store is still serialized, so an
    /// observer sees assignments in exactly the order they happened. Keep
    /// implementations short and never `send` to the same store from inside.
    pub trait Observer<S>: Send + Sync {
        /// Called after the state was assigned and its effects were started
        fn state_did_change(&self, state: &S);
    }

    impl<S, F> Observer<S> for F
    where
        F: Fn(&S) + Send + Sync,
    {
        fn state_did_change(&self, state: &S) {
            self(state);
        }
    }

    /// Handle returned by [`Store::add_observer`], used to remove the observer again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ObserverToken(u64);

    impl ObserverToken {
        /// Raw numeric value, unique per store
        #[must_use]
        pub const fn value(self) -> u64 {
            self.0
        }
    }

    struct Inner<S, A, E, R> {
        state: tokio::sync::Mutex<S>,
        reducer: R,
        environment: E,
        tasks: Mutex<HashMap<EffectId, JoinHandle<()>>>,
        observers: Mutex<BTreeMap<ObserverToken, Arc<dyn Observer<S>>>>,
        next_token: AtomicU64,
        shutdown: AtomicBool,
        _action: std::marker::PhantomData<fn(A)>,
    }

    impl<S, A, E, R> Drop for Inner<S, A, E, R> {
        fn drop(&mut self) {
            for (_, handle) in lock(&self.tasks).drain() {
                handle.abort();
            }
        }
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind a mutex held for the whole transition)
    /// 2. Action processing (via reducer)
    /// 3. Effect execution (spawned tasks, keyed by [`EffectId`] when long-running)
    /// 4. Observer notification
    ///
    /// # Transition Order
    ///
    /// For every action that the reducer accepts:
    /// 1. The reducer assigns the new state and describes effects
    /// 2. Effects are started in the order they were returned
    /// 3. Observers are notified of the new state
    ///
    /// All three steps happen under the state lock, so transitions triggered
    /// from the API, from signals, and from network completions never interleave.
    ///
    /// # Lifetime
    ///
    /// Spawned tasks only hold a weak reference. Dropping the last `Store`
    /// handle aborts every keyed task; in-flight futures finish but their
    /// actions are discarded.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R> {
        inner: Arc<Inner<S, A, E, R>>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                inner: Arc::new(Inner {
                    state: tokio::sync::Mutex::new(initial_state),
                    reducer,
                    environment,
                    tasks: Mutex::new(HashMap::new()),
                    observers: Mutex::new(BTreeMap::new()),
                    next_token: AtomicU64::new(0),
                    shutdown: AtomicBool::new(false),
                    _action: std::marker::PhantomData,
                }),
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer, starts the returned effects, and notifies
        /// observers. Returns once all of that happened; effects keep running
        /// in the background.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store was shut down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            if self.inner.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            tracing::trace!("Acquired state lock");

            let Some(effects) = self
                .inner
                .reducer
                .reduce(state, action, &self.inner.environment)
            else {
                tracing::trace!("Action ignored in current state");
                metrics::counter!("store.commands.ignored").increment(1);
                return Ok(());
            };

            tracing::trace!("Reducer assigned state, executing {} effects", effects.len());
            for effect in effects {
                self.execute_effect(effect);
            }

            self.notify(state);
            Ok(())
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let polling = store.state(|s| matches!(s, LifecycleState::Polling { .. })).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.inner.state.lock().await;
            f(&state)
        }

        /// Start an effect outside of any reduction
        ///
        /// Used for subscriptions that live as long as the store itself.
        pub fn run(&self, effect: Effect<A>) {
            self.execute_effect(effect);
        }

        /// Whether a keyed task with this id is currently alive
        #[must_use]
        pub fn is_active(&self, id: EffectId) -> bool {
            lock(&self.inner.tasks)
                .get(&id)
                .is_some_and(|handle| !handle.is_finished())
        }

        /// Register an observer; it is notified of every later state assignment
        pub fn add_observer(&self, observer: Arc<dyn Observer<S>>) -> ObserverToken {
            let token = ObserverToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
            lock(&self.inner.observers).insert(token, observer);
            tracing::debug!(token = token.0, "Observer added");
            token
        }

        /// Remove an observer; returns `false` if the token was unknown
        pub fn remove_observer(&self, token: ObserverToken) -> bool {
            let removed = lock(&self.inner.observers).remove(&token).is_some();
            tracing::debug!(token = token.0, removed, "Observer removed");
            removed
        }

        /// Number of registered observers
        #[must_use]
        pub fn observer_count(&self) -> usize {
            lock(&self.inner.observers).len()
        }

        /// Stop accepting actions and abort every keyed task
        pub fn shutdown(&self) {
            tracing::info!("Initiating shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.inner.shutdown.store(true, Ordering::Release);
            for (id, handle) in lock(&self.inner.tasks).drain() {
                tracing::debug!(effect_id = %id, "Aborting keyed task");
                handle.abort();
            }
        }

        fn notify(&self, state: &S) {
            let observers: Vec<Arc<dyn Observer<S>>> =
                lock(&self.inner.observers).values().cloned().collect();
            for observer in observers {
                observer.state_did_change(state);
            }
        }

        fn downgrade(&self) -> Weak<Inner<S, A, E, R>> {
            Arc::downgrade(&self.inner)
        }

        fn register(&self, id: EffectId, handle: JoinHandle<()>) {
            if let Some(previous) = lock(&self.inner.tasks).insert(id, handle) {
                tracing::debug!(effect_id = %id, "Replacing keyed task");
                previous.abort();
            }
        }

        /// Feed an action produced by a background task back into the store
        async fn feed(weak: &Weak<Inner<S, A, E, R>>, action: A) {
            let Some(inner) = weak.upgrade() else {
                tracing::trace!("Store dropped, discarding action");
                return;
            };
            let store = Self { inner };
            if let Err(error) = store.send(action).await {
                tracing::debug!(%error, "Discarding action produced by effect");
            }
        }

        #[tracing::instrument(skip(self, effect), name = "execute_effect")]
        fn execute_effect(&self, effect: Effect<A>) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect);
                    }
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);

                    let weak = self.downgrade();
                    tokio::spawn(async move {
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            Self::feed(&weak, action).await;
                        }
                    });
                },
                Effect::Interval { id, period, tick } => {
                    tracing::trace!(effect_id = %id, ?period, "Executing Effect::Interval");
                    metrics::counter!("store.effects.executed", "type" => "interval").increment(1);

                    // tokio panics on a zero period
                    let period = period.max(Duration::from_millis(1));
                    let weak = self.downgrade();
                    let handle = tokio::spawn(async move {
                        let mut ticker = tokio::time::interval(period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        loop {
                            ticker.tick().await;
                            tracing::trace!(effect_id = %id, "Interval tick");
                            let fut = tick();
                            let weak = weak.clone();
                            tokio::spawn(async move {
                                if let Some(action) = fut.await {
                                    Self::feed(&weak, action).await;
                                }
                            });
                        }
                    });
                    self.register(id, handle);
                },
                Effect::Subscribe { id, stream } => {
                    tracing::trace!(effect_id = %id, "Executing Effect::Subscribe");
                    metrics::counter!("store.effects.executed", "type" => "subscribe").increment(1);

                    let weak = self.downgrade();
                    let handle = tokio::spawn(async move {
                        let mut stream = stream;
                        while let Some(action) = stream.next().await {
                            if weak.strong_count() == 0 {
                                break;
                            }
                            Self::feed(&weak, action).await;
                        }
                        tracing::trace!(effect_id = %id, "Subscription ended");
                    });
                    self.register(id, handle);
                },
                Effect::Cancel(id) => {
                    tracing::trace!(effect_id = %id, "Executing Effect::Cancel");
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);

                    if let Some(handle) = lock(&self.inner.tasks).remove(&id) {
                        handle.abort();
                    }
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::error::StoreError;
    use super::*;
    use paykit_core::effect::EffectId;
    use paykit_core::reducer::{Effects, Reducer};
    use paykit_core::{interval, smallvec};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const TICKER: EffectId = EffectId::new("ticker");
    const LISTENER: EffectId = EffectId::new("listener");

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CounterState {
        Idle,
        Counting(u32),
        Done,
    }

    #[derive(Debug, Clone)]
    enum CounterAction {
        Start,
        Tick,
        Finish,
        Echo,
        Listen(Signal<CounterAction>),
        Ignored,
    }

    #[derive(Clone)]
    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut CounterState,
            action: CounterAction,
            _env: &(),
        ) -> Option<Effects<CounterAction>> {
            match action {
                CounterAction::Start => {
                    *state = CounterState::Counting(0);
                    Some(smallvec![interval! {
                        id: TICKER,
                        period: Duration::from_millis(10),
                        capture: [],
                        tick: { Some(CounterAction::Tick) }
                    }])
                },
                CounterAction::Tick => match state {
                    CounterState::Counting(n) if *n >= 2 => {
                        *state = CounterState::Done;
                        Some(smallvec![Effect::Cancel(TICKER)])
                    },
                    CounterState::Counting(n) => {
                        *n += 1;
                        Some(smallvec![Effect::None])
                    },
                    _ => None,
                },
                CounterAction::Finish => {
                    *state = CounterState::Done;
                    Some(smallvec![Effect::Cancel(TICKER), Effect::Cancel(LISTENER)])
                },
                CounterAction::Echo => {
                    *state = CounterState::Idle;
                    Some(smallvec![Effect::Future(Box::pin(async {
                        Some(CounterAction::Finish)
                    }))])
                },
                CounterAction::Listen(signal) => {
                    *state = CounterState::Idle;
                    Some(smallvec![Effect::Subscribe {
                        id: LISTENER,
                        stream: Box::pin(signal.subscribe().into_stream()),
                    }])
                },
                CounterAction::Ignored => None,
            }
        }
    }

    type CounterStore = Store<CounterState, CounterAction, (), CounterReducer>;

    fn recording_store() -> (CounterStore, mpsc::UnboundedReceiver<CounterState>) {
        let store = Store::new(CounterState::Idle, CounterReducer, ());
        let (tx, rx) = mpsc::unbounded_channel();
        store.add_observer(Arc::new(move |state: &CounterState| {
            let _ = tx.send(state.clone());
        }));
        (store, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<CounterState>) -> CounterState {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for state")
            .expect("observer channel closed")
    }

    #[tokio::test]
    async fn test_ignored_action_does_not_notify() {
        let (store, mut rx) = recording_store();

        store.send(CounterAction::Ignored).await.unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(store.state(Clone::clone).await, CounterState::Idle);
    }

    #[tokio::test]
    async fn test_assignment_notifies_even_when_equal() {
        let (store, mut rx) = recording_store();

        store
            .send(CounterAction::Listen(Signal::new()))
            .await
            .unwrap();

        assert_eq!(next(&mut rx).await, CounterState::Idle);
    }

    #[tokio::test]
    async fn test_future_feeds_action_back() {
        let (store, mut rx) = recording_store();

        store.send(CounterAction::Echo).await.unwrap();

        assert_eq!(next(&mut rx).await, CounterState::Idle);
        assert_eq!(next(&mut rx).await, CounterState::Done);
    }

    #[tokio::test]
    async fn test_interval_ticks_until_cancelled() {
        let (store, mut rx) = recording_store();

        store.send(CounterAction::Start).await.unwrap();
        assert!(store.is_active(TICKER));

        assert_eq!(next(&mut rx).await, CounterState::Counting(0));
        assert_eq!(next(&mut rx).await, CounterState::Counting(1));
        assert_eq!(next(&mut rx).await, CounterState::Counting(2));
        assert_eq!(next(&mut rx).await, CounterState::Done);
        assert!(!store.is_active(TICKER));
    }

    #[tokio::test]
    async fn test_subscription_forwards_signal_and_cancels() {
        let (store, mut rx) = recording_store();
        let signal = Signal::new();

        store.send(CounterAction::Listen(signal.clone())).await.unwrap();
        assert_eq!(next(&mut rx).await, CounterState::Idle);
        assert!(store.is_active(LISTENER));

        signal.post(CounterAction::Finish);
        assert_eq!(next(&mut rx).await, CounterState::Done);
        assert!(!store.is_active(LISTENER));
    }

    #[tokio::test]
    async fn test_cancel_without_task_is_noop() {
        let (store, mut rx) = recording_store();

        store.send(CounterAction::Finish).await.unwrap();

        assert_eq!(next(&mut rx).await, CounterState::Done);
        assert!(!store.is_active(TICKER));
    }

    #[tokio::test]
    async fn test_removed_observer_is_not_notified() {
        let store: CounterStore = Store::new(CounterState::Idle, CounterReducer, ());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = store.add_observer(Arc::new(move |state: &CounterState| {
            let _ = tx.send(state.clone());
        }));

        assert!(store.remove_observer(token));
        assert!(!store.remove_observer(token));
        assert_eq!(store.observer_count(), 0);

        store.send(CounterAction::Finish).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_actions_and_aborts_tasks() {
        let (store, _rx) = recording_store();
        store.send(CounterAction::Start).await.unwrap();

        store.shutdown();

        assert!(!store.is_active(TICKER));
        assert_eq!(
            store.send(CounterAction::Finish).await,
            Err(StoreError::ShutdownInProgress)
        );
    }
}
