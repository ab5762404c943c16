//! Integration entry point.
//!
//! [`PayKit`] wires a [`StateMachine`] to the REST client, the analytics sink
//! and the host's signals, and guards the operations that must not start a
//! lifecycle from a terminal request.

use crate::analytics::{AnalyticsSink, TracingAnalytics};
use crate::client::CustomerRequestClient;
use crate::config::{ConfigError, PayKitConfig};
use crate::error::{IntegrationError, RequestError};
use crate::lifecycle::{LifecycleEnvironment, LifecycleState, StateMachine};
use crate::model::{
    CreateCustomerRequestParams, CustomerRequest, RequestStatus, UpdateCustomerRequestParams,
};
use paykit_core::environment::{Clock, SystemClock, UrlOpener};
use paykit_runtime::error::StoreError;
use paykit_runtime::{Observer, ObserverToken, ResilientRestExecutor, RestExecutor, Signal};
use std::sync::Arc;
use url::Url;

/// Customer request SDK
///
/// # Example
///
/// ```ignore
/// let paykit = PayKit::new(PayKitConfig::from_env()?, Arc::new(opener))?;
/// paykit.add_observer(Arc::new(|state: &LifecycleState| println!("{}", state.name())));
///
/// paykit.create_customer_request(params).await?;
/// ```
pub struct PayKit {
    machine: StateMachine,
    client: Arc<CustomerRequestClient>,
    clock: Arc<dyn Clock>,
}

impl PayKit {
    /// SDK with the default executor, analytics sink and system clock
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] for an unusable endpoint.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(config: PayKitConfig, url_opener: Arc<dyn UrlOpener>) -> Result<Self, ConfigError> {
        Self::builder(config, url_opener).build()
    }

    /// Builder for replacing individual collaborators
    #[must_use]
    pub fn builder(config: PayKitConfig, url_opener: Arc<dyn UrlOpener>) -> PayKitBuilder {
        PayKitBuilder {
            config,
            url_opener,
            executor: None,
            analytics: None,
            clock: None,
            redirects: None,
            foreground: None,
        }
    }

    /// Create a customer request and move to `ReadyToAuthorize` on success
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the machine is shutting down; API
    /// failures surface as error states.
    pub async fn create_customer_request(
        &self,
        params: CreateCustomerRequestParams,
    ) -> Result<(), StoreError> {
        self.machine
            .transition(LifecycleState::CreatingCustomerRequest(params))
            .await
    }

    /// Update a request that has not reached a terminal status
    ///
    /// A terminal request moves straight to
    /// [`IntegrationError::terminal_state_error`] without calling the API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the machine is shutting down.
    pub async fn update_customer_request(
        &self,
        request: &CustomerRequest,
        params: UpdateCustomerRequestParams,
    ) -> Result<(), StoreError> {
        let next = if request.status.is_terminal() {
            tracing::warn!(request_id = %request.id, status = %request.status, "Refusing to update terminal request");
            LifecycleState::IntegrationError(IntegrationError::terminal_state_error())
        } else {
            LifecycleState::UpdatingCustomerRequest {
                request: request.clone(),
                params,
            }
        };
        self.machine.transition(next).await
    }

    /// Hand the customer over to the payment app
    ///
    /// Pending requests with expired or missing triggers are refreshed first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the machine is shutting down.
    pub async fn authorize_customer_request(
        &self,
        request: &CustomerRequest,
    ) -> Result<(), StoreError> {
        let next = match request.status {
            RequestStatus::Declined => {
                tracing::warn!(request_id = %request.id, "Refusing to authorize declined request");
                LifecycleState::IntegrationError(IntegrationError::terminal_state_error())
            },
            RequestStatus::Approved => LifecycleState::Redirecting(request.clone()),
            RequestStatus::Pending | RequestStatus::Processing => {
                let now = self.clock.now();
                match &request.auth_flow_triggers {
                    Some(triggers) if !triggers.is_expired(now) => {
                        LifecycleState::Redirecting(request.clone())
                    },
                    _ => LifecycleState::Refreshing(request.clone()),
                }
            },
        };
        self.machine.transition(next).await
    }

    /// Fetch a customer request without touching the lifecycle
    ///
    /// # Errors
    ///
    /// Any classified client failure.
    pub async fn retrieve_customer_request(
        &self,
        id: &str,
    ) -> Result<CustomerRequest, RequestError> {
        self.client.retrieve(id, None).await
    }

    /// Register an observer of every later transition
    pub fn add_observer(&self, observer: Arc<dyn Observer<LifecycleState>>) -> ObserverToken {
        self.machine.add_observer(observer)
    }

    /// Remove an observer; returns `false` for an unknown token
    pub fn remove_observer(&self, token: ObserverToken) -> bool {
        self.machine.remove_observer(token)
    }

    /// Deliver the redirect back from the payment app
    pub fn handle_redirect(&self, url: Url) {
        self.machine.handle_redirect(url);
    }

    /// Report that the host application returned to the foreground
    pub fn application_will_enter_foreground(&self) {
        self.machine.application_will_enter_foreground();
    }

    /// Current lifecycle state
    pub async fn state(&self) -> LifecycleState {
        self.machine.state().await
    }

    /// The underlying state machine
    #[must_use]
    pub const fn machine(&self) -> &StateMachine {
        &self.machine
    }
}

/// Builder for [`PayKit`]
pub struct PayKitBuilder {
    config: PayKitConfig,
    url_opener: Arc<dyn UrlOpener>,
    executor: Option<Arc<dyn RestExecutor>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    clock: Option<Arc<dyn Clock>>,
    redirects: Option<Signal<Url>>,
    foreground: Option<Signal<()>>,
}

impl PayKitBuilder {
    /// Use a different REST executor
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn RestExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Use a different analytics sink
    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Use a different clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share a redirect signal with the host
    #[must_use]
    pub fn with_redirect_signal(mut self, redirects: Signal<Url>) -> Self {
        self.redirects = Some(redirects);
        self
    }

    /// Share a foreground signal with the host
    #[must_use]
    pub fn with_foreground_signal(mut self, foreground: Signal<()>) -> Self {
        self.foreground = Some(foreground);
        self
    }

    /// Build the SDK
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] for an unusable endpoint.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn build(self) -> Result<PayKit, ConfigError> {
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(ResilientRestExecutor::new()));
        let client = Arc::new(CustomerRequestClient::new(executor, &self.config)?);
        let analytics = self
            .analytics
            .unwrap_or_else(|| Arc::new(TracingAnalytics::new(&self.config)));
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let environment = LifecycleEnvironment {
            client: Arc::clone(&client),
            analytics,
            url_opener: self.url_opener,
            clock: Arc::clone(&clock),
            foreground: self.foreground.unwrap_or_default(),
            poll_interval: self.config.poll_interval,
        };
        let machine = StateMachine::new(environment, self.redirects.unwrap_or_default());

        tracing::info!(
            client_id = %self.config.client_id,
            endpoint = %self.config.endpoint,
            "PayKit initialized"
        );
        Ok(PayKit {
            machine,
            client,
            clock,
        })
    }
}
