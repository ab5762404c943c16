//! # PayKit
//!
//! Client-side orchestration of the customer request lifecycle: create a
//! payment request, hand the customer over to the payment app, and follow the
//! request until it is approved or declined.
//!
//! ## Overview
//!
//! - [`model`]: customer requests, payment actions, and their parameters
//! - [`error`]: the closed error taxonomy every failure is classified into
//! - [`client`]: create / update / retrieve over REST, with response classification
//! - [`lifecycle`]: the state machine driving a request through its states
//! - [`analytics`]: one event per transition and per observer change
//! - [`facade`]: [`PayKit`], the entry point integrations use
//!
//! ## Example
//!
//! ```ignore
//! use paykit::{PayKit, PayKitConfig, LifecycleState};
//!
//! let paykit = PayKit::new(PayKitConfig::from_env()?, opener)?;
//! paykit.add_observer(Arc::new(|state: &LifecycleState| {
//!     if let LifecycleState::Approved { grants, .. } = state {
//!         // create the payment with the grants
//!     }
//! }));
//!
//! paykit.create_customer_request(params).await?;
//! ```

#[macro_use]
mod macros;

pub mod analytics;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod lifecycle;
pub mod model;

pub use analytics::{AnalyticsEvent, AnalyticsSink, TracingAnalytics};
pub use client::{CustomerRequestClient, VERSION};
pub use config::{ConfigError, Endpoint, PayKitConfig};
pub use error::{ApiError, IntegrationError, NetworkError, RequestError, UnexpectedError};
pub use facade::{PayKit, PayKitBuilder};
pub use lifecycle::{LifecycleState, StateMachine};
pub use model::{
    CreateCustomerRequestParams, CustomerRequest, PaymentAction, RequestStatus,
    UpdateCustomerRequestParams,
};
pub use paykit_runtime::{Observer, ObserverToken, Signal};
