//! Request client.
//!
//! Translates the three customer request operations into REST calls and
//! classifies whatever comes back into a [`CustomerRequest`] or one of the
//! error kinds of [`RequestError`].
//!
//! The API does not tag error payloads with a discriminant, so classification
//! trial-decodes the body against every known shape, in a fixed order.

use crate::config::{ConfigError, PayKitConfig};
use crate::error::{
    ApiError, IntegrationError, NetworkError, RequestError, UnexpectedError,
};
use crate::model::{CreateCustomerRequestParams, CustomerRequest, UpdateCustomerRequestParams};
use paykit_runtime::{Exchange, HttpRequest, RestExecutor, RetryPolicy};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// SDK version reported in headers and analytics
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path of the customer request collection, relative to the endpoint base URL
pub const REQUESTS_PATH: &str = "customer-request/v1/requests";

/// `User-Agent` header value
#[must_use]
pub fn user_agent() -> String {
    format!("PayKit/{VERSION} (Rust)")
}

#[derive(Serialize)]
struct CreateEnvelope<'a> {
    request: &'a CreateCustomerRequestParams,
    idempotency_key: &'a str,
}

#[derive(Serialize)]
struct UpdateEnvelope<'a> {
    request: &'a UpdateCustomerRequestParams,
}

#[derive(Deserialize)]
struct RequestEnvelope {
    request: CustomerRequest,
}

#[derive(Deserialize)]
struct ErrorsEnvelope<E> {
    errors: Vec<E>,
}

/// Client for the customer request API
pub struct CustomerRequestClient {
    executor: Arc<dyn RestExecutor>,
    client_id: String,
    collection: Url,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl CustomerRequestClient {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] when the endpoint base URL
    /// cannot hold the collection path.
    pub fn new(executor: Arc<dyn RestExecutor>, config: &PayKitConfig) -> Result<Self, ConfigError> {
        let collection = config
            .endpoint
            .base_url()
            .and_then(|base| base.join(REQUESTS_PATH))
            .map_err(|error| ConfigError::InvalidEndpoint(format!("{}: {error}", config.endpoint)))?;

        Ok(Self {
            executor,
            client_id: config.client_id.clone(),
            collection,
            timeout: config.request_timeout,
            retry_policy: config.retry_policy(),
        })
    }

    /// URL of the request collection
    #[must_use]
    pub const fn collection_url(&self) -> &Url {
        &self.collection
    }

    /// Create a customer request
    ///
    /// Every call carries a fresh idempotency key, so retries of the same
    /// call never create duplicates.
    ///
    /// # Errors
    ///
    /// Any classified failure, see [`classify`].
    #[tracing::instrument(skip(self, params), name = "create_customer_request")]
    pub async fn create(
        &self,
        params: &CreateCustomerRequestParams,
    ) -> Result<CustomerRequest, RequestError> {
        let idempotency_key = uuid::Uuid::new_v4().to_string();
        let body = encode(&CreateEnvelope {
            request: params,
            idempotency_key: &idempotency_key,
        })?;

        let request = self
            .request(Method::POST, self.collection.clone())
            .with_body(body);
        self.perform(request, Some(self.retry_policy)).await
    }

    /// Update an existing customer request
    ///
    /// # Errors
    ///
    /// Any classified failure, see [`classify`].
    #[tracing::instrument(skip(self, request, params), fields(request_id = %request.id), name = "update_customer_request")]
    pub async fn update(
        &self,
        request: &CustomerRequest,
        params: &UpdateCustomerRequestParams,
    ) -> Result<CustomerRequest, RequestError> {
        let body = encode(&UpdateEnvelope { request: params })?;

        let http = self
            .request(Method::PATCH, self.member_url(&request.id)?)
            .with_body(body);
        self.perform(http, Some(self.retry_policy)).await
    }

    /// Fetch a customer request by id
    ///
    /// `retry_policy` overrides the configured default.
    ///
    /// # Errors
    ///
    /// Any classified failure, see [`classify`].
    #[tracing::instrument(skip(self, retry_policy), name = "retrieve_customer_request")]
    pub async fn retrieve(
        &self,
        id: &str,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<CustomerRequest, RequestError> {
        let request = self.request(Method::GET, self.member_url(id)?);
        self.perform(request, Some(retry_policy.unwrap_or(self.retry_policy)))
            .await
    }

    fn member_url(&self, id: &str) -> Result<Url, RequestError> {
        let mut url = self.collection.clone();
        url.path_segments_mut()
            .map_err(|()| RequestError::Encoding(format!("{} cannot be a base URL", self.collection)))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json")
            .with_header("Authorization", format!("Client {}", self.client_id))
            .with_header("User-Agent", user_agent())
            .with_timeout(self.timeout)
    }

    async fn perform(
        &self,
        request: HttpRequest,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<CustomerRequest, RequestError> {
        let exchange = self.executor.execute(request, retry_policy).await;
        let result = classify(exchange);

        match &result {
            Ok(customer_request) => {
                tracing::debug!(
                    request_id = %customer_request.id,
                    status = %customer_request.status,
                    "Customer request received"
                );
            },
            Err(error) => {
                tracing::warn!(%error, "Customer request call failed");
                metrics::counter!("paykit.client.failures").increment(1);
            },
        }
        result
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RequestError> {
    serde_json::to_vec(value).map_err(|error| RequestError::Encoding(error.to_string()))
}

fn first_error<E: Into<RequestError>>(errors: Vec<E>) -> RequestError {
    errors
        .into_iter()
        .next()
        .map_or_else(|| UnexpectedError::empty_error_array().into(), Into::into)
}

fn decode_errors<E>(body: &[u8]) -> Option<RequestError>
where
    E: DeserializeOwned + Into<RequestError>,
{
    serde_json::from_slice::<ErrorsEnvelope<E>>(body)
        .ok()
        .map(|envelope| first_error(envelope.errors))
}

/// Classify a raw exchange
///
/// Applied in order:
/// 1. transport error → [`NetworkError::SystemError`]
/// 2. no response → [`NetworkError::NoResponse`]
/// 3. no body → [`NetworkError::NilData`]
/// 4. `{"request": …}` → the customer request
/// 5. `{"errors": […]}` of [`ApiError`], then [`IntegrationError`], then
///    [`UnexpectedError`] → the first error, or
///    [`UnexpectedError::empty_error_array`] for an empty list
/// 6. anything else → [`NetworkError::InvalidJson`]
///
/// # Errors
///
/// Every outcome other than step 4.
pub fn classify(exchange: Exchange) -> Result<CustomerRequest, RequestError> {
    if let Some(error) = exchange.error {
        return Err(NetworkError::SystemError(error).into());
    }
    let Some(response) = exchange.response else {
        return Err(NetworkError::NoResponse.into());
    };
    let Some(body) = exchange.body else {
        return Err(NetworkError::NilData(response).into());
    };

    if let Ok(envelope) = serde_json::from_slice::<RequestEnvelope>(&body) {
        return Ok(envelope.request);
    }

    let error = decode_errors::<ApiError>(&body)
        .or_else(|| decode_errors::<IntegrationError>(&body))
        .or_else(|| decode_errors::<UnexpectedError>(&body))
        .unwrap_or(RequestError::Network(NetworkError::InvalidJson(body)));
    Err(error)
}
