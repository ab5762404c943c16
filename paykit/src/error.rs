//! Error taxonomy.
//!
//! Every failure the lifecycle can end up in belongs to one of four closed
//! kinds:
//!
//! - [`ApiError`]: the API reported an operational failure on its side
//! - [`IntegrationError`]: the integration misused the API (auth, validation,
//!   rate limits, invalid state transitions)
//! - [`UnexpectedError`]: the API reported something outside the known code sets
//! - [`NetworkError`]: nothing structured could be obtained from the exchange
//!
//! [`RequestError`] is the union returned by the request client.

use crate::model::CustomerRequest;
use bytes::Bytes;
use paykit_runtime::{HttpResponse, TransportError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

wire_enum! {
    /// Category of an [`ApiError`]
    pub enum ApiErrorCategory {
        /// Server-side failure
        ApiError => "API_ERROR",
    }
}

wire_enum! {
    /// Code of an [`ApiError`]
    pub enum ApiErrorCode {
        /// Unhandled server failure
        InternalServerError => "INTERNAL_SERVER_ERROR",
        /// Service temporarily unavailable
        ServiceUnavailable => "SERVICE_UNAVAILABLE",
        /// Upstream timeout
        GatewayTimeout => "GATEWAY_TIMEOUT",
    }
}

wire_enum! {
    /// Category of an [`IntegrationError`]
    pub enum IntegrationErrorCategory {
        /// Credentials rejected
        AuthenticationError => "AUTHENTICATION_ERROR",
        /// Unknown or misconfigured brand
        BrandError => "BRAND_ERROR",
        /// Misconfigured merchant
        MerchantError => "MERCHANT_ERROR",
        /// Malformed or invalid request
        InvalidRequestError => "INVALID_REQUEST_ERROR",
        /// Too many requests
        RateLimitError => "RATE_LIMIT_ERROR",
    }
}

wire_enum! {
    /// Code of an [`IntegrationError`]
    pub enum IntegrationErrorCode {
        // Authentication
        /// Missing or invalid client credentials
        Unauthorized => "UNAUTHORIZED",
        /// Client has been disabled
        ClientDisabled => "CLIENT_DISABLED",
        /// Client may not perform this operation
        Forbidden => "FORBIDDEN",

        // Invalid request
        /// A value exceeds its maximum length
        ValueTooLong => "VALUE_TOO_LONG",
        /// A value is shorter than its minimum length
        ValueTooShort => "VALUE_TOO_SHORT",
        /// A required value is empty
        ValueEmpty => "VALUE_EMPTY",
        /// A value does not match its expected pattern
        ValueRegexMismatch => "VALUE_REGEX_MISMATCH",
        /// A URL is malformed
        InvalidUrl => "INVALID_URL",
        /// A number exceeds its maximum
        ValueTooHigh => "VALUE_TOO_HIGH",
        /// A number is below its minimum
        ValueTooLow => "VALUE_TOO_LOW",
        /// An array has too many elements
        ArrayLengthTooLong => "ARRAY_LENGTH_TOO_LONG",
        /// An array has too few elements
        ArrayLengthTooShort => "ARRAY_LENGTH_TOO_SHORT",
        /// An array has the wrong element type
        InvalidArrayType => "INVALID_ARRAY_TYPE",
        /// The addressed resource does not exist
        NotFound => "NOT_FOUND",
        /// The request conflicts with the resource's state
        Conflict => "CONFLICT",
        /// The resource cannot move to the requested state
        InvalidStateTransition => "INVALID_STATE_TRANSITION",
        /// Unknown client
        ClientNotFound => "CLIENT_NOT_FOUND",

        // Rate limiting
        /// Too many requests
        RateLimited => "RATE_LIMITED",

        // Brand
        /// Unknown brand
        BrandNotFound => "BRAND_NOT_FOUND",

        // Merchant
        /// Merchant has no address or site configured
        MerchantMissingAddressOrSite => "MERCHANT_MISSING_ADDRESS_OR_SITE",
    }
}

/// Operational failure reported by the API
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category}: {code}")]
pub struct ApiError {
    /// Always `API_ERROR`
    pub category: ApiErrorCategory,
    /// What went wrong
    pub code: ApiErrorCode,
    /// Human-readable explanation
    #[serde(default)]
    pub detail: Option<String>,
    /// Offending field, if any
    #[serde(default)]
    pub field: Option<String>,
}

/// Integration mistake reported by the API, or detected locally
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category}: {code}")]
pub struct IntegrationError {
    /// Error family
    pub category: IntegrationErrorCategory,
    /// What went wrong
    pub code: IntegrationErrorCode,
    /// Human-readable explanation
    #[serde(default)]
    pub detail: Option<String>,
    /// Offending field, if any
    #[serde(default)]
    pub field: Option<String>,
}

impl IntegrationError {
    /// Synthesized when updating or authorizing a request that already reached
    /// a terminal status. Never sent by the server.
    #[must_use]
    pub fn terminal_state_error() -> Self {
        Self {
            category: IntegrationErrorCategory::InvalidRequestError,
            code: IntegrationErrorCode::InvalidStateTransition,
            detail: Some("The request provided was already in a terminal state.".to_string()),
            field: None,
        }
    }
}

/// Error whose category or code is outside the known sets
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category}: {code}")]
pub struct UnexpectedError {
    /// Free-form category
    pub category: String,
    /// Free-form code
    pub code: String,
    /// Human-readable explanation
    #[serde(default)]
    pub detail: Option<String>,
    /// Offending field, if any
    #[serde(default)]
    pub field: Option<String>,
}

impl UnexpectedError {
    /// The API answered with an `errors` envelope that held no errors
    #[must_use]
    pub fn empty_error_array() -> Self {
        Self {
            category: "API_ERROR".to_string(),
            code: "EMPTY_ERROR_ARRAY".to_string(),
            detail: Some(
                "The API returned an error, but the `errors` array was empty. \
                 Please report this bug to Cash App Developer Support."
                    .to_string(),
            ),
            field: Some("errors".to_string()),
        }
    }

    /// A customer request came back without a mobile URL to redirect to
    #[must_use]
    pub fn no_redirect_url_for(request: &CustomerRequest) -> Self {
        Self {
            category: "API_ERROR".to_string(),
            code: "NO_REDIRECT_URL".to_string(),
            detail: Some(format!(
                "The API returned a customer request without a `mobile_url` field to use for \
                 redirecting. Customer request ID: {}. Please report this bug to Cash App \
                 Developer Support.",
                request.id
            )),
            field: Some("auth_flow_triggers.mobile_url".to_string()),
        }
    }

    /// Wraps a failure of a shape the taxonomy does not know
    #[must_use]
    pub fn unknown_error_for(error: &dyn std::error::Error) -> Self {
        Self {
            category: "UNKNOWN_ERROR".to_string(),
            code: "UNKNOWN_ERROR".to_string(),
            detail: Some(format!("Received an Error in an unexpected form: {error}")),
            field: None,
        }
    }
}

/// Failure before any structured answer could be obtained
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The exchange produced no HTTP response
    #[error("no response received")]
    NoResponse,

    /// A response arrived without a body
    #[error("response with status {} carried no data", .0.status)]
    NilData(HttpResponse),

    /// The body matched none of the known shapes
    #[error("response body is not valid JSON ({} bytes)", .0.len())]
    InvalidJson(Bytes),

    /// Transport-level failure (connection, TLS, timeout)
    #[error("transport error: {0}")]
    SystemError(TransportError),
}

/// Failure of a request client operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// See [`ApiError`]
    #[error(transparent)]
    Api(#[from] ApiError),

    /// See [`IntegrationError`]
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// See [`NetworkError`]
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// See [`UnexpectedError`]
    #[error(transparent)]
    Unexpected(#[from] UnexpectedError),

    /// The request could not be built (body serialization, URL construction)
    #[error("failed to build request: {0}")]
    Encoding(String),
}
