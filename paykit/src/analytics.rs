//! Analytics events.
//!
//! Each event belongs to a catalog; field keys are prefixed with the catalog
//! name (`mobile_cap_pk_customer_request_status`). Fields carrying
//! customer-identifying data are redacted before they leave the SDK.
//!
//! Batching and upload are the sink's concern. [`TracingAnalytics`] records
//! events as structured log lines.

use crate::client::VERSION;
use crate::config::PayKitConfig;
use crate::lifecycle::LifecycleState;
use crate::model::{
    CreateCustomerRequestParams, CustomerRequest, Grant, PaymentAction,
    UpdateCustomerRequestParams,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Catalog for SDK initialization
pub const INITIALIZATION_CATALOG: &str = "mobile_cap_pk_initialization";
/// Catalog for observer registration changes
pub const LISTENER_CATALOG: &str = "mobile_cap_pk_event_listener";
/// Catalog for lifecycle transitions
pub const CUSTOMER_REQUEST_CATALOG: &str = "mobile_cap_pk_customer_request";

/// Placeholder for redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Platform reported in common fields
pub const PLATFORM: &str = "Rust";

/// A single analytics event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    /// Unique event id
    pub id: Uuid,
    /// When the event was produced
    pub timestamp: DateTime<Utc>,
    /// Catalog the event belongs to
    pub catalog: &'static str,
    /// Prefixed fields
    pub fields: BTreeMap<String, Value>,
}

impl AnalyticsEvent {
    fn new(catalog: &'static str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            catalog,
            fields: BTreeMap::new(),
        }
    }

    /// SDK initialized
    #[must_use]
    pub fn initialization(now: DateTime<Utc>) -> Self {
        Self::new(INITIALIZATION_CATALOG, now)
    }

    /// Observer added or removed
    #[must_use]
    pub fn listener(listener_uid: &str, is_added: bool, now: DateTime<Utc>) -> Self {
        Self::new(LISTENER_CATALOG, now)
            .with("listener_uid", listener_uid)
            .with("is_added", is_added)
    }

    /// Lifecycle entered `state`
    ///
    /// `NotStarted` has nothing to report and yields `None`.
    #[must_use]
    pub fn for_state(state: &LifecycleState, now: DateTime<Utc>) -> Option<Self> {
        let event = Self::new(CUSTOMER_REQUEST_CATALOG, now);
        let event = match state {
            LifecycleState::NotStarted => return None,
            LifecycleState::CreatingCustomerRequest(params) => {
                event.with("action", "create").with_create_params(params)
            },
            LifecycleState::UpdatingCustomerRequest { request, params } => event
                .with("action", "update")
                .with_request(request)
                .with_update_params(params),
            LifecycleState::ReadyToAuthorize(request) => {
                event.with("action", "ready_to_authorize").with_request(request)
            },
            LifecycleState::Redirecting(request) => {
                event.with("action", "redirect").with_request(request)
            },
            LifecycleState::Polling(request) => {
                event.with("action", "polling").with_request(request)
            },
            LifecycleState::Declined(request) => {
                event.with("action", "declined").with_request(request)
            },
            LifecycleState::Approved { request, grants } => event
                .with("action", "approved")
                .with_request(request)
                .with("approved_grants", grants_value(grants)),
            LifecycleState::Refreshing(request) => {
                event.with("action", "refreshing").with_request(request)
            },
            LifecycleState::ApiError(error) => event.with("action", "api_error").with_error(
                error.category.as_str(),
                error.code.as_str(),
                error.detail.as_deref(),
                error.field.as_deref(),
            ),
            LifecycleState::IntegrationError(error) => {
                event.with("action", "integration_error").with_error(
                    error.category.as_str(),
                    error.code.as_str(),
                    error.detail.as_deref(),
                    error.field.as_deref(),
                )
            },
            LifecycleState::UnexpectedError(error) => {
                event.with("action", "unexpected_error").with_error(
                    &error.category,
                    &error.code,
                    error.detail.as_deref(),
                    error.field.as_deref(),
                )
            },
            LifecycleState::NetworkError(error) => {
                let detail = error.to_string();
                event
                    .with("action", "network_error")
                    .with_error("NETWORK_ERROR", network_code(error), Some(&detail), None)
            },
        };
        Some(event)
    }

    /// Prefixed key for `name` in this event's catalog
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        format!("{}_{name}", self.catalog)
    }

    /// Field by unprefixed name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(&self.key(name))
    }

    /// Merge fields shared by every event; event fields win on conflict
    pub fn add_common_fields(&mut self, common: &BTreeMap<String, Value>) {
        for (key, value) in common {
            self.fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// JSON form of the event
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            let key = self.key(name);
            self.fields.insert(key, value);
        }
        self
    }

    fn with_create_params(self, params: &CreateCustomerRequestParams) -> Self {
        self.with("create_actions", actions_value(&params.actions))
            .with("create_channel", params.channel.as_str())
            .with("create_redirect_url", REDACTED)
            .with("create_reference_id", params.reference_id.as_ref().map(|_| REDACTED))
            .with("create_metadata", metadata_value(params.metadata.as_ref()))
    }

    fn with_update_params(self, params: &UpdateCustomerRequestParams) -> Self {
        self.with("update_actions", actions_value(params.actions()))
            .with("update_reference_id", params.reference_id().map(|_| REDACTED))
            .with("update_metadata", metadata_value(params.metadata()))
    }

    fn with_request(self, request: &CustomerRequest) -> Self {
        self.with("customer_request_id", request.id.as_str())
            .with("status", request.status.as_str())
            .with("actions", actions_value(&request.actions))
            .with(
                "auth_mobile_url",
                request.mobile_url().map(url::Url::as_str),
            )
            .with("redirect_url", request.redirect_url.as_ref().map(|_| REDACTED))
            .with("created_at", request.created_at.to_rfc3339())
            .with("updated_at", request.updated_at.to_rfc3339())
            .with(
                "origin_type",
                request.origin.as_ref().map(|origin| origin.origin_type.as_str()),
            )
            .with(
                "origin_id",
                request.origin.as_ref().and_then(|origin| origin.id.as_deref()),
            )
            .with("channel", request.channel.as_str())
            .with("grants", request.grants.as_deref().map(grants_value))
            .with("reference_id", request.reference_id.as_ref().map(|_| REDACTED))
            .with(
                "requester_name",
                request.requester_profile.as_ref().map(|profile| profile.name.as_str()),
            )
            .with(
                "customer_id",
                request.customer_profile.as_ref().map(|profile| profile.id.as_str()),
            )
            .with(
                "customer_cashtag",
                request.customer_profile.as_ref().map(|_| REDACTED),
            )
            .with("metadata", metadata_value(request.metadata.as_ref()))
    }

    fn with_error(self, category: &str, code: &str, detail: Option<&str>, field: Option<&str>) -> Self {
        self.with("error_category", category)
            .with("error_code", code)
            .with("error_detail", detail)
            .with("error_field", field)
    }
}

fn actions_value(actions: &[PaymentAction]) -> Value {
    serde_json::to_value(actions).unwrap_or(Value::Null)
}

fn grants_value(grants: &[Grant]) -> Value {
    serde_json::to_value(grants).unwrap_or(Value::Null)
}

fn metadata_value(metadata: Option<&BTreeMap<String, String>>) -> Value {
    metadata.map_or(Value::Null, |metadata| json!(metadata))
}

const fn network_code(error: &crate::error::NetworkError) -> &'static str {
    use crate::error::NetworkError;
    match error {
        NetworkError::NoResponse => "NO_RESPONSE",
        NetworkError::NilData(_) => "NIL_DATA",
        NetworkError::InvalidJson(_) => "INVALID_JSON",
        NetworkError::SystemError(_) => "SYSTEM_ERROR",
    }
}

/// Destination for analytics events
pub trait AnalyticsSink: Send + Sync {
    /// Record one event. Must not block.
    fn track(&self, event: AnalyticsEvent);
}

/// Sink that records events through `tracing`
///
/// Common fields are merged into every event before it is logged.
#[derive(Debug, Clone, Default)]
pub struct TracingAnalytics {
    common_fields: BTreeMap<String, Value>,
}

impl TracingAnalytics {
    /// Sink with common fields derived from `config`
    #[must_use]
    pub fn new(config: &PayKitConfig) -> Self {
        let common_fields = [
            ("mobile_cap_pk_client_id", json!(config.client_id)),
            ("mobile_cap_pk_platform", json!(PLATFORM)),
            ("mobile_cap_pk_sdk_version", json!(VERSION)),
            ("mobile_cap_pk_client_ua", json!(crate::client::user_agent())),
            ("mobile_cap_pk_environment", json!(config.endpoint.name())),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Self { common_fields }
    }

    /// Fields merged into every event
    #[must_use]
    pub const fn common_fields(&self) -> &BTreeMap<String, Value> {
        &self.common_fields
    }
}

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, mut event: AnalyticsEvent) {
        event.add_common_fields(&self.common_fields);
        tracing::info!(
            target: "paykit::analytics",
            catalog = event.catalog,
            event_id = %event.id,
            event = %event.to_json(),
            "Analytics event"
        );
        metrics::counter!("paykit.analytics.events", "catalog" => event.catalog).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{IntegrationError, NetworkError};
    use crate::model::{Channel, RequestStatus};
    use chrono::TimeZone;
    use url::Url;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn request() -> CustomerRequest {
        serde_json::from_value(json!({
            "id": "GRR_1",
            "status": "PENDING",
            "actions": [{"type": "ON_FILE_PAYMENT", "scope_id": "BRAND_9"}],
            "redirect_url": "myapp://back",
            "created_at": "2025-01-01T00:00:00.000Z",
            "updated_at": "2025-01-01T00:00:00.000Z",
            "expires_at": "2025-01-01T01:00:00.000Z",
            "channel": "IN_APP",
            "reference_id": "order-7",
            "customer_profile": {"id": "C_1", "cashtag": "$jane"}
        }))
        .unwrap()
    }

    #[test]
    fn test_keys_are_prefixed_with_catalog() {
        let event = AnalyticsEvent::listener("3", true, now());

        assert_eq!(event.catalog, LISTENER_CATALOG);
        assert_eq!(
            event.fields.get("mobile_cap_pk_event_listener_listener_uid"),
            Some(&json!("3"))
        );
        assert_eq!(event.field("is_added"), Some(&json!(true)));
    }

    #[test]
    fn test_request_fields_are_redacted() {
        let request = request();
        assert_eq!(request.status, RequestStatus::Pending);

        let event = AnalyticsEvent::for_state(&LifecycleState::Polling(request), now()).unwrap();

        assert_eq!(event.field("action"), Some(&json!("polling")));
        assert_eq!(event.field("customer_request_id"), Some(&json!("GRR_1")));
        assert_eq!(event.field("reference_id"), Some(&json!(REDACTED)));
        assert_eq!(event.field("redirect_url"), Some(&json!(REDACTED)));
        assert_eq!(event.field("customer_cashtag"), Some(&json!(REDACTED)));
        assert_eq!(event.field("customer_id"), Some(&json!("C_1")));
        assert_eq!(event.field("origin_type"), None);
    }

    #[test]
    fn test_create_params_fields() {
        let params = CreateCustomerRequestParams::new(
            vec![PaymentAction::on_file("BRAND_9", None)],
            Url::parse("myapp://back").unwrap(),
        )
        .with_channel(Channel::Online);

        let event =
            AnalyticsEvent::for_state(&LifecycleState::CreatingCustomerRequest(params), now())
                .unwrap();

        assert_eq!(event.field("action"), Some(&json!("create")));
        assert_eq!(event.field("create_channel"), Some(&json!("ONLINE")));
        assert_eq!(event.field("create_redirect_url"), Some(&json!(REDACTED)));
        assert_eq!(event.field("create_reference_id"), None);
    }

    #[test]
    fn test_error_fields() {
        let event = AnalyticsEvent::for_state(
            &LifecycleState::IntegrationError(IntegrationError::terminal_state_error()),
            now(),
        )
        .unwrap();
        assert_eq!(event.field("error_category"), Some(&json!("INVALID_REQUEST_ERROR")));
        assert_eq!(event.field("error_code"), Some(&json!("INVALID_STATE_TRANSITION")));
        assert_eq!(event.field("error_field"), None);

        let event =
            AnalyticsEvent::for_state(&LifecycleState::NetworkError(NetworkError::NoResponse), now())
                .unwrap();
        assert_eq!(event.field("action"), Some(&json!("network_error")));
        assert_eq!(event.field("error_code"), Some(&json!("NO_RESPONSE")));
        assert_eq!(event.field("error_detail"), Some(&json!("no response received")));
    }

    #[test]
    fn test_not_started_has_no_event() {
        assert!(AnalyticsEvent::for_state(&LifecycleState::NotStarted, now()).is_none());
    }

    #[test]
    fn test_common_fields_do_not_override_event_fields() {
        let sink = TracingAnalytics::new(&PayKitConfig::new("CAS-CI_TEST"));
        let mut event = AnalyticsEvent::initialization(now());
        event
            .fields
            .insert("mobile_cap_pk_platform".to_string(), json!("override"));

        event.add_common_fields(sink.common_fields());

        assert_eq!(event.fields["mobile_cap_pk_platform"], json!("override"));
        assert_eq!(event.fields["mobile_cap_pk_client_id"], json!("CAS-CI_TEST"));
        assert_eq!(event.fields["mobile_cap_pk_environment"], json!("production"));
    }
}
