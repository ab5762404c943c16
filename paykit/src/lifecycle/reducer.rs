use super::state::LifecycleState;
use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::client::CustomerRequestClient;
use crate::error::{RequestError, UnexpectedError};
use crate::model::{CustomerRequest, RequestStatus};
use futures::StreamExt;
use paykit_core::effect::{ActionStream, Effect, EffectId};
use paykit_core::environment::{Clock, UrlOpener};
use paykit_core::reducer::{Effects, Reducer};
use paykit_core::{async_effect, interval, smallvec};
use paykit_runtime::{RetryPolicy, Signal};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Repeating status poll, alive only in [`LifecycleState::Polling`]
pub const POLLING_TIMER: EffectId = EffectId::new("polling_timer");

/// Foreground listener, alive only in [`LifecycleState::Redirecting`]
pub const FOREGROUND_LISTENER: EffectId = EffectId::new("foreground_listener");

/// Redirect listener, alive as long as the machine
pub const REDIRECT_LISTENER: EffectId = EffectId::new("redirect_listener");

/// Retry policy for fetching fresh handshake triggers
pub const REFRESH_RETRY_POLICY: RetryPolicy =
    RetryPolicy::exponential_with(Duration::from_secs(3), 3);

/// Inputs to the lifecycle
#[derive(Debug, Clone)]
pub enum LifecycleAction {
    /// Assign a state unconditionally
    Enter(LifecycleState),
    /// The payment app sent the customer back
    RedirectCompleted(Url),
    /// The host application returned to the foreground
    ForegroundResumed,
    /// A create or update call finished
    RequestLoaded(Result<CustomerRequest, RequestError>),
    /// A refresh call finished
    RequestRefreshed(Result<CustomerRequest, RequestError>),
    /// A poll finished
    RequestPolled(Result<CustomerRequest, RequestError>),
}

/// Dependencies of the lifecycle reducer
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// API client
    pub client: Arc<CustomerRequestClient>,
    /// Analytics destination
    pub analytics: Arc<dyn AnalyticsSink>,
    /// Hands the payment app deep link to the host platform
    pub url_opener: Arc<dyn UrlOpener>,
    /// Time source for analytics timestamps
    pub clock: Arc<dyn Clock>,
    /// Fires when the host application returns to the foreground
    pub foreground: Signal<()>,
    /// Time between polls
    pub poll_interval: Duration,
}

/// The customer request lifecycle
///
/// Every assignment goes through one place, which in order cancels whatever
/// the new state does not keep alive, starts the new state's work, and
/// reports the transition to analytics. The store then notifies observers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleReducer;

impl LifecycleReducer {
    fn enter(
        state: &mut LifecycleState,
        new: LifecycleState,
        env: &LifecycleEnvironment,
    ) -> Effects<LifecycleAction> {
        let new = match new {
            LifecycleState::Redirecting(request) if request.mobile_url().is_none() => {
                tracing::warn!(request_id = %request.id, "Customer request has no mobile URL");
                LifecycleState::UnexpectedError(UnexpectedError::no_redirect_url_for(&request))
            },
            other => other,
        };

        let mut effects: Effects<LifecycleAction> = smallvec![];
        if !matches!(new, LifecycleState::Polling(_)) {
            effects.push(Effect::Cancel(POLLING_TIMER));
        }
        if !matches!(new, LifecycleState::Redirecting(_)) {
            effects.push(Effect::Cancel(FOREGROUND_LISTENER));
        }

        match &new {
            LifecycleState::CreatingCustomerRequest(params) => {
                let client = Arc::clone(&env.client);
                let params = params.clone();
                effects.push(async_effect! {
                    Some(LifecycleAction::RequestLoaded(client.create(&params).await))
                });
            },
            LifecycleState::UpdatingCustomerRequest { request, params } => {
                let client = Arc::clone(&env.client);
                let request = request.clone();
                let params = params.clone();
                effects.push(async_effect! {
                    Some(LifecycleAction::RequestLoaded(client.update(&request, &params).await))
                });
            },
            LifecycleState::Redirecting(request) => {
                // subscribe before the app is opened so no resume is missed
                let stream: ActionStream<LifecycleAction> = Box::pin(
                    env.foreground
                        .subscribe()
                        .into_stream()
                        .map(|()| LifecycleAction::ForegroundResumed),
                );
                effects.push(Effect::Subscribe {
                    id: FOREGROUND_LISTENER,
                    stream,
                });
                if let Some(url) = request.mobile_url() {
                    env.url_opener.open(url);
                }
            },
            LifecycleState::Polling(request) => {
                let client = Arc::clone(&env.client);
                let id = request.id.clone();
                effects.push(interval! {
                    id: POLLING_TIMER,
                    period: env.poll_interval,
                    capture: [client, id],
                    tick: {
                        Some(LifecycleAction::RequestPolled(client.retrieve(&id, None).await))
                    }
                });
            },
            LifecycleState::Refreshing(request) => {
                let client = Arc::clone(&env.client);
                let id = request.id.clone();
                effects.push(async_effect! {
                    let refreshed = client.retrieve(&id, Some(REFRESH_RETRY_POLICY)).await;
                    Some(LifecycleAction::RequestRefreshed(refreshed))
                });
            },
            _ => {},
        }

        tracing::debug!(from = state.name(), to = new.name(), "Lifecycle transition");
        metrics::counter!("paykit.lifecycle.transitions", "state" => new.name()).increment(1);
        if let Some(event) = AnalyticsEvent::for_state(&new, env.clock.now()) {
            env.analytics.track(event);
        }

        *state = new;
        effects
    }

    fn on_polled(request: CustomerRequest) -> Option<LifecycleState> {
        match request.status {
            RequestStatus::Approved => Some(match request.grants.clone() {
                Some(grants) => LifecycleState::Approved { request, grants },
                None => LifecycleState::Declined(request),
            }),
            RequestStatus::Declined => Some(LifecycleState::Declined(request)),
            RequestStatus::Pending | RequestStatus::Processing => {
                tracing::trace!(request_id = %request.id, status = %request.status, "Still waiting");
                None
            },
        }
    }
}

impl Reducer for LifecycleReducer {
    type State = LifecycleState;
    type Action = LifecycleAction;
    type Environment = LifecycleEnvironment;

    fn reduce(
        &self,
        state: &mut LifecycleState,
        action: LifecycleAction,
        env: &LifecycleEnvironment,
    ) -> Option<Effects<LifecycleAction>> {
        let next = match action {
            LifecycleAction::Enter(next) => next,
            LifecycleAction::RedirectCompleted(url) => match &*state {
                LifecycleState::Redirecting(request) | LifecycleState::ReadyToAuthorize(request) => {
                    tracing::debug!(%url, "Redirect completed");
                    LifecycleState::Polling(request.clone())
                },
                _ => {
                    tracing::trace!(%url, state = state.name(), "Ignoring redirect");
                    return None;
                },
            },
            LifecycleAction::ForegroundResumed => match &*state {
                LifecycleState::Redirecting(request) => LifecycleState::Polling(request.clone()),
                _ => return None,
            },
            LifecycleAction::RequestLoaded(result) => match result {
                Ok(request) => LifecycleState::ReadyToAuthorize(request),
                Err(error) => LifecycleState::from_error(error),
            },
            LifecycleAction::RequestRefreshed(result) => match result {
                Ok(request) => LifecycleState::Redirecting(request),
                Err(error) => LifecycleState::from_error(error),
            },
            LifecycleAction::RequestPolled(result) => match result {
                Ok(request) => Self::on_polled(request)?,
                Err(error) => LifecycleState::from_error(error),
            },
        };

        Some(Self::enter(state, next, env))
    }
}
