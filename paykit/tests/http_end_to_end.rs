//! Full lifecycle over real HTTP against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{CLIENT_ID, REQUEST_ID, RecordingAnalytics, create_params, request_json};
use paykit::error::IntegrationErrorCode;
use paykit::{CustomerRequest, Endpoint, LifecycleState, PayKit, PayKitConfig};
use paykit_testing::{RecordingObserver, RecordingUrlOpener, test_clock};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "/customer-request/v1/requests";

fn paykit_for(server: &MockServer) -> (PayKit, Arc<RecordingObserver<LifecycleState>>) {
    paykit_testing::init_tracing();

    let config = PayKitConfig::new(CLIENT_ID)
        .with_endpoint(Endpoint::Custom(Url::parse(&server.uri()).unwrap()))
        .with_poll_interval(Duration::from_millis(20))
        .with_request_timeout(Duration::from_secs(2));
    let paykit = PayKit::builder(config, Arc::new(RecordingUrlOpener::new()))
        .with_analytics(RecordingAnalytics::new())
        .with_clock(Arc::new(test_clock()))
        .build()
        .unwrap();

    let observer = RecordingObserver::<LifecycleState>::new();
    paykit.add_observer(observer.clone());
    (paykit, observer)
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let server = MockServer::start().await;
    let mut approved = request_json("APPROVED");
    approved["grants"] = json!([]);

    Mock::given(method("POST"))
        .and(path(COLLECTION))
        .and(header("Authorization", format!("Client {CLIENT_ID}").as_str()))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({"request": {"channel": "IN_APP"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "request": request_json("PENDING")
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{COLLECTION}/{REQUEST_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "request": approved })))
        .mount(&server)
        .await;

    let (paykit, observer) = paykit_for(&server);

    paykit.create_customer_request(create_params()).await.unwrap();
    assert!(matches!(
        observer.next().await,
        LifecycleState::CreatingCustomerRequest(_)
    ));
    let LifecycleState::ReadyToAuthorize(request) = observer.next().await else {
        panic!("expected the created request");
    };
    assert_eq!(request.id, REQUEST_ID);

    paykit.authorize_customer_request(&request).await.unwrap();
    assert!(matches!(observer.next().await, LifecycleState::Redirecting(_)));

    paykit.handle_redirect(Url::parse("myapp://checkout/done").unwrap());
    assert!(matches!(observer.next().await, LifecycleState::Polling(_)));

    let LifecycleState::Approved { request, grants } = observer.next().await else {
        panic!("expected approval");
    };
    assert!(grants.is_empty());
    assert_eq!(request.grants, Some(Vec::new()));
}

#[tokio::test]
async fn test_integration_error_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COLLECTION))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"errors": [{
            "category": "AUTHENTICATION_ERROR",
            "code": "UNAUTHORIZED",
            "detail": "unknown client"
        }]})))
        .expect(1)
        .mount(&server)
        .await;

    let (paykit, observer) = paykit_for(&server);

    paykit.create_customer_request(create_params()).await.unwrap();
    observer.next().await;

    let LifecycleState::IntegrationError(error) = observer.next().await else {
        panic!("expected an integration error");
    };
    assert_eq!(error.code, IntegrationErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_retrieve_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{COLLECTION}/{REQUEST_ID}")))
        .and(header("Accept", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"request": request_json("PROCESSING")})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (paykit, _observer) = paykit_for(&server);

    let request: CustomerRequest = paykit.retrieve_customer_request(REQUEST_ID).await.unwrap();

    assert_eq!(request.status, paykit::RequestStatus::Processing);
}
