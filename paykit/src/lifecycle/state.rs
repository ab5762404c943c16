use crate::error::{ApiError, IntegrationError, NetworkError, RequestError, UnexpectedError};
use crate::model::{
    CreateCustomerRequestParams, CustomerRequest, Grant, UpdateCustomerRequestParams,
};

/// Where a customer request is in its lifecycle
///
/// Every transition replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Nothing has happened yet
    #[default]
    NotStarted,
    /// Creating a request with these parameters
    CreatingCustomerRequest(CreateCustomerRequestParams),
    /// Updating `request` with `params`
    UpdatingCustomerRequest {
        /// Request being updated
        request: CustomerRequest,
        /// Replacement values
        params: UpdateCustomerRequestParams,
    },
    /// The request exists and can be authorized
    ReadyToAuthorize(CustomerRequest),
    /// The customer was handed over to the payment app
    Redirecting(CustomerRequest),
    /// Waiting for the customer's decision
    Polling(CustomerRequest),
    /// The customer declined (terminal)
    Declined(CustomerRequest),
    /// The customer approved (terminal)
    Approved {
        /// Approved request
        request: CustomerRequest,
        /// Grants to create payments with
        grants: Vec<Grant>,
    },
    /// Fetching fresh handshake triggers
    Refreshing(CustomerRequest),
    /// The API failed
    ApiError(ApiError),
    /// The integration misused the API
    IntegrationError(IntegrationError),
    /// The network or the response body failed
    NetworkError(NetworkError),
    /// An error outside the known taxonomy
    UnexpectedError(UnexpectedError),
}

impl LifecycleState {
    /// Error state for a failed client call
    ///
    /// Every failure maps to exactly one error state; failures outside the
    /// taxonomy become an [`UnexpectedError`].
    #[must_use]
    pub fn from_error(error: RequestError) -> Self {
        match error {
            RequestError::Api(error) => Self::ApiError(error),
            RequestError::Integration(error) => Self::IntegrationError(error),
            RequestError::Network(error) => Self::NetworkError(error),
            RequestError::Unexpected(error) => Self::UnexpectedError(error),
            other @ RequestError::Encoding(_) => {
                Self::UnexpectedError(UnexpectedError::unknown_error_for(&other))
            },
        }
    }

    /// Variant name, for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::CreatingCustomerRequest(_) => "CreatingCustomerRequest",
            Self::UpdatingCustomerRequest { .. } => "UpdatingCustomerRequest",
            Self::ReadyToAuthorize(_) => "ReadyToAuthorize",
            Self::Redirecting(_) => "Redirecting",
            Self::Polling(_) => "Polling",
            Self::Declined(_) => "Declined",
            Self::Approved { .. } => "Approved",
            Self::Refreshing(_) => "Refreshing",
            Self::ApiError(_) => "ApiError",
            Self::IntegrationError(_) => "IntegrationError",
            Self::NetworkError(_) => "NetworkError",
            Self::UnexpectedError(_) => "UnexpectedError",
        }
    }

    /// The request this state is about, if any
    #[must_use]
    pub const fn customer_request(&self) -> Option<&CustomerRequest> {
        match self {
            Self::UpdatingCustomerRequest { request, .. }
            | Self::ReadyToAuthorize(request)
            | Self::Redirecting(request)
            | Self::Polling(request)
            | Self::Declined(request)
            | Self::Approved { request, .. }
            | Self::Refreshing(request) => Some(request),
            _ => None,
        }
    }

    /// Whether this is one of the error states
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ApiError(_)
                | Self::IntegrationError(_)
                | Self::NetworkError(_)
                | Self::UnexpectedError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error_keeps_the_error_kind() {
        let state = LifecycleState::from_error(NetworkError::NoResponse.into());
        assert_eq!(state, LifecycleState::NetworkError(NetworkError::NoResponse));
        assert!(state.is_error());

        let state = LifecycleState::from_error(IntegrationError::terminal_state_error().into());
        assert_eq!(state.name(), "IntegrationError");
    }

    #[test]
    fn test_from_error_wraps_encoding_failures() {
        let state = LifecycleState::from_error(RequestError::Encoding("bad url".to_string()));

        let LifecycleState::UnexpectedError(error) = state else {
            unreachable!("encoding failures are unexpected errors");
        };
        assert_eq!(error.code, "UNKNOWN_ERROR");
        assert_eq!(
            error.detail.as_deref(),
            Some("Received an Error in an unexpected form: failed to build request: bad url")
        );
    }

    #[test]
    fn test_not_started_is_default() {
        assert_eq!(LifecycleState::default(), LifecycleState::NotStarted);
        assert!(LifecycleState::NotStarted.customer_request().is_none());
        assert!(!LifecycleState::NotStarted.is_error());
    }
}
