use super::action::PaymentAction;
use super::request::Channel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Parameters for creating a customer request
///
/// Absent optional fields are omitted from the wire body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomerRequestParams {
    /// Payments to request
    pub actions: Vec<PaymentAction>,
    /// Interaction channel
    #[serde(default)]
    pub channel: Channel,
    /// Where the payment app sends the customer back to
    pub redirect_url: Url,
    /// Merchant-side reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Merchant-defined key/value pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CreateCustomerRequestParams {
    /// Parameters for the in-app channel, without reference or metadata
    #[must_use]
    pub fn new(actions: Vec<PaymentAction>, redirect_url: Url) -> Self {
        Self {
            actions,
            channel: Channel::default(),
            redirect_url,
            reference_id: None,
            metadata: None,
        }
    }

    /// Set the channel
    #[must_use]
    pub const fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Set the merchant-side reference
    #[must_use]
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Set the metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Parameters for updating a customer request
///
/// Every field is always sent: `null` clears the server-side value. Actions
/// are converted into their clearing form on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCustomerRequestParams {
    actions: Vec<PaymentAction>,
    #[serde(default)]
    reference_id: Option<String>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
}

impl UpdateCustomerRequestParams {
    /// Build update parameters
    #[must_use]
    pub fn new(
        actions: Vec<PaymentAction>,
        reference_id: Option<String>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            actions: actions.into_iter().map(PaymentAction::into_clearing).collect(),
            reference_id,
            metadata,
        }
    }

    /// Replacement actions
    #[must_use]
    pub fn actions(&self) -> &[PaymentAction] {
        &self.actions
    }

    /// Replacement reference, `None` clears it
    #[must_use]
    pub fn reference_id(&self) -> Option<&str> {
        self.reference_id.as_deref()
    }

    /// Replacement metadata, `None` clears it
    #[must_use]
    pub const fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata.as_ref()
    }
}
