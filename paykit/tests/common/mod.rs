//! Shared fixtures for PayKit integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Duration, Utc};
use paykit::analytics::{AnalyticsEvent, AnalyticsSink};
use paykit::lifecycle::LifecycleEnvironment;
use paykit::model::CreateCustomerRequestParams;
use paykit::{CustomerRequest, CustomerRequestClient, LifecycleState, PayKit, PayKitConfig, PaymentAction};
use paykit_core::environment::Clock;
use paykit_runtime::{Exchange, HttpResponse, Signal};
use paykit_testing::{MockRestExecutor, RecordingObserver, RecordingUrlOpener, test_clock};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use url::Url;

pub const CLIENT_ID: &str = "CAS-CI_INTEGRATION";
pub const REQUEST_ID: &str = "GRR_pbnbc4mt9yd2xq9b9ve5wy7c";
pub const MOBILE_URL: &str = "https://cash.app/f/RWSQR/2qxvz7a";

/// The fixed "now" every test runs at
pub fn now() -> DateTime<Utc> {
    test_clock().now()
}

/// Wire JSON of a customer request in `status`
pub fn request_json(status: &str) -> Value {
    json!({
        "id": REQUEST_ID,
        "status": status,
        "actions": [{
            "type": "ONE_TIME_PAYMENT",
            "scope_id": "BRAND_9kx6p0mkuo97jnl025q9ni94t",
            "amount": 500,
            "currency": "USD"
        }],
        "auth_flow_triggers": {
            "qr_code_image_url": "https://cash.app/qr/RWSQR.png",
            "qr_code_svg_url": "https://cash.app/qr/RWSQR.svg",
            "mobile_url": MOBILE_URL,
            "refreshes_at": (now() + Duration::minutes(5)).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
        },
        "redirect_url": "myapp://checkout/done",
        "created_at": "2024-12-31T23:59:00.000Z",
        "updated_at": "2024-12-31T23:59:30.000Z",
        "expires_at": "2025-01-01T00:59:00.000Z",
        "origin": {"type": "DIRECT"},
        "channel": "IN_APP",
        "reference_id": "order-1042",
        "requester_profile": {"name": "Bean Co", "logo_url": "https://cash.app/logos/bean.png"},
        "metadata": {"cart": "7"}
    })
}

fn grant_json() -> Value {
    json!({
        "id": "GRG_AZYyHv2DwQltw0SiCLTaRb73y40XFe2dWM690WDF9Btqn-uTCYAUROa4ciwCdDnZcG4PuY1m_i3gwHODiO8DSf9zdMmRl1T0SM267vzuldnBs246-duHZhcehhXtmhfU8g",
        "customer_id": "CST_AYVkuLw-sT3OKZ7a_nhNTC_L2ekahLgGrS-EM_QhW4OTrGMbi59X1eCclH0cjaxoLObc",
        "action": {
            "type": "ONE_TIME_PAYMENT",
            "scope_id": "BRAND_9kx6p0mkuo97jnl025q9ni94t",
            "amount": 500,
            "currency": "USD"
        },
        "status": "ACTIVE",
        "type": "ONE_TIME",
        "channel": "IN_APP",
        "created_at": "2025-01-01T00:00:10.000Z",
        "updated_at": "2025-01-01T00:00:10.000Z",
        "expires_at": "2025-01-01T01:00:10.000Z"
    })
}

pub fn pending_request() -> CustomerRequest {
    serde_json::from_value(request_json("PENDING")).unwrap()
}

/// Pending request whose triggers refresh at `refreshes_at`
pub fn pending_request_refreshing_at(refreshes_at: DateTime<Utc>) -> CustomerRequest {
    let mut request = pending_request();
    request.auth_flow_triggers.as_mut().unwrap().refreshes_at = refreshes_at;
    request
}

/// Pending request without handshake triggers
pub fn pending_request_without_triggers() -> CustomerRequest {
    let mut request = pending_request();
    request.auth_flow_triggers = None;
    request
}

pub fn approved_request() -> CustomerRequest {
    let mut json = request_json("APPROVED");
    json["grants"] = json!([grant_json()]);
    json["customer_profile"] = json!({"id": "CST_1", "cashtag": "$bean_lover"});
    serde_json::from_value(json).unwrap()
}

pub fn approved_request_without_grants() -> CustomerRequest {
    serde_json::from_value(request_json("APPROVED")).unwrap()
}

pub fn declined_request() -> CustomerRequest {
    serde_json::from_value(request_json("DECLINED")).unwrap()
}

pub fn processing_request() -> CustomerRequest {
    serde_json::from_value(request_json("PROCESSING")).unwrap()
}

pub fn create_params() -> CreateCustomerRequestParams {
    CreateCustomerRequestParams::new(
        vec![PaymentAction::on_file("BRAND_9kx6p0mkuo97jnl025q9ni94t", None)],
        Url::parse("myapp://checkout/done").unwrap(),
    )
    .with_reference_id("order-1042")
}

/// A successful exchange carrying `request`
pub fn exchange_for(request: &CustomerRequest) -> Exchange {
    Exchange::completed(
        HttpResponse::new(200),
        serde_json::to_vec(&json!({ "request": request })).unwrap(),
    )
}

/// A successful exchange carrying `body`
pub fn exchange_with(status: u16, body: &Value) -> Exchange {
    Exchange::completed(HttpResponse::new(status), serde_json::to_vec(body).unwrap())
}

/// Analytics sink that keeps every event
#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }

    /// The `action` field of every customer request event, in order
    pub fn actions(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.field("action"))
            .filter_map(|action| action.as_str().map(str::to_string))
            .collect()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn config() -> PayKitConfig {
    PayKitConfig::new(CLIENT_ID).with_poll_interval(std::time::Duration::from_millis(20))
}

/// Environment for driving the reducer directly
pub struct ReducerFixture {
    pub executor: MockRestExecutor,
    pub opener: RecordingUrlOpener,
    pub analytics: Arc<RecordingAnalytics>,
    pub foreground: Signal<()>,
    pub environment: LifecycleEnvironment,
}

impl ReducerFixture {
    pub fn new() -> Self {
        let executor = MockRestExecutor::new();
        let opener = RecordingUrlOpener::new();
        let analytics = RecordingAnalytics::new();
        let foreground = Signal::new();
        let client = CustomerRequestClient::new(Arc::new(executor.clone()), &config()).unwrap();

        let environment = LifecycleEnvironment {
            client: Arc::new(client),
            analytics: analytics.clone(),
            url_opener: Arc::new(opener.clone()),
            clock: Arc::new(test_clock()),
            foreground: foreground.clone(),
            poll_interval: config().poll_interval,
        };

        Self {
            executor,
            opener,
            analytics,
            foreground,
            environment,
        }
    }
}

/// A running SDK with every collaborator scripted or recorded
pub struct Harness {
    pub paykit: PayKit,
    pub executor: MockRestExecutor,
    pub opener: RecordingUrlOpener,
    pub analytics: Arc<RecordingAnalytics>,
    pub observer: Arc<RecordingObserver<LifecycleState>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_executor(MockRestExecutor::new())
    }

    pub fn with_executor(executor: MockRestExecutor) -> Self {
        paykit_testing::init_tracing();

        let opener = RecordingUrlOpener::new();
        let analytics = RecordingAnalytics::new();
        let paykit = PayKit::builder(config(), Arc::new(opener.clone()))
            .with_executor(Arc::new(executor.clone()))
            .with_analytics(analytics.clone())
            .with_clock(Arc::new(test_clock()))
            .build()
            .unwrap();

        let observer = RecordingObserver::<LifecycleState>::new();
        paykit.add_observer(observer.clone());

        Self {
            paykit,
            executor,
            opener,
            analytics,
            observer,
        }
    }

    /// Next observed state
    pub async fn next(&self) -> LifecycleState {
        self.observer.next().await
    }

    /// Assert nothing else is observed for a few poll intervals
    pub async fn assert_quiet(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let extra = self.observer.drain().await;
        assert!(extra.is_empty(), "unexpected transitions: {extra:?}");
    }
}
