use super::reducer::{
    FOREGROUND_LISTENER, LifecycleAction, LifecycleEnvironment, LifecycleReducer, POLLING_TIMER,
    REDIRECT_LISTENER,
};
use super::state::LifecycleState;
use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use futures::StreamExt;
use paykit_core::effect::{ActionStream, Effect};
use paykit_core::environment::Clock;
use paykit_runtime::error::StoreError;
use paykit_runtime::{Observer, ObserverToken, Signal, Store};
use std::sync::Arc;
use url::Url;

type LifecycleStore = Store<LifecycleState, LifecycleAction, LifecycleEnvironment, LifecycleReducer>;

/// Runs the customer request lifecycle
///
/// Owns the store the lifecycle state lives in, the redirect subscription
/// that lives as long as the machine, and the observer registry. All
/// transitions are serialized through the store, whichever task triggers
/// them.
pub struct StateMachine {
    store: LifecycleStore,
    analytics: Arc<dyn AnalyticsSink>,
    clock: Arc<dyn Clock>,
    redirects: Signal<Url>,
    foreground: Signal<()>,
}

impl StateMachine {
    /// Start a machine in [`LifecycleState::NotStarted`]
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    #[must_use]
    pub fn new(environment: LifecycleEnvironment, redirects: Signal<Url>) -> Self {
        let analytics = Arc::clone(&environment.analytics);
        let clock = Arc::clone(&environment.clock);
        let foreground = environment.foreground.clone();

        analytics.track(AnalyticsEvent::initialization(clock.now()));

        let store = Store::new(LifecycleState::NotStarted, LifecycleReducer, environment);
        let stream: ActionStream<LifecycleAction> = Box::pin(
            redirects
                .subscribe()
                .into_stream()
                .map(LifecycleAction::RedirectCompleted),
        );
        store.run(Effect::Subscribe {
            id: REDIRECT_LISTENER,
            stream,
        });

        Self {
            store,
            analytics,
            clock,
            redirects,
            foreground,
        }
    }

    /// Assign `state` and run its entry work
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the machine is dropped.
    pub async fn transition(&self, state: LifecycleState) -> Result<(), StoreError> {
        self.store.send(LifecycleAction::Enter(state)).await
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> LifecycleState {
        self.store.state(LifecycleState::clone).await
    }

    /// Register an observer of every later transition
    pub fn add_observer(&self, observer: Arc<dyn Observer<LifecycleState>>) -> ObserverToken {
        let token = self.store.add_observer(observer);
        self.analytics.track(AnalyticsEvent::listener(
            &token.value().to_string(),
            true,
            self.clock.now(),
        ));
        token
    }

    /// Stop notifying the observer registered under `token`
    ///
    /// Returns `false` for an unknown token.
    pub fn remove_observer(&self, token: ObserverToken) -> bool {
        let removed = self.store.remove_observer(token);
        if removed {
            self.analytics.track(AnalyticsEvent::listener(
                &token.value().to_string(),
                false,
                self.clock.now(),
            ));
        }
        removed
    }

    /// Deliver a redirect back from the payment app
    pub fn handle_redirect(&self, url: Url) {
        let receivers = self.redirects.post(url);
        tracing::debug!(receivers, "Redirect posted");
    }

    /// Report that the host application returned to the foreground
    pub fn application_will_enter_foreground(&self) {
        let receivers = self.foreground.post(());
        tracing::trace!(receivers, "Foreground resume posted");
    }

    /// Whether the polling timer is running
    #[must_use]
    pub fn has_polling_timer(&self) -> bool {
        self.store.is_active(POLLING_TIMER)
    }

    /// Whether the foreground listener is registered
    #[must_use]
    pub fn has_foreground_listener(&self) -> bool {
        self.store.is_active(FOREGROUND_LISTENER)
    }

    /// Whether the redirect listener is registered
    #[must_use]
    pub fn has_redirect_listener(&self) -> bool {
        self.store.is_active(REDIRECT_LISTENER)
    }
}

impl Drop for StateMachine {
    fn drop(&mut self) {
        self.store.shutdown();
    }
}
