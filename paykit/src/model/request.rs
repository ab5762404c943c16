use super::action::PaymentAction;
use super::timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Triggers are treated as expired this many seconds before `refreshes_at`,
/// to absorb clock skew and latency.
pub const EXPIRY_JITTER_SECONDS: i64 = 20;

wire_enum! {
    /// Status of a [`CustomerRequest`]
    pub enum RequestStatus {
        /// Waiting for the customer
        Pending => "PENDING",
        /// The customer acted; the outcome is being determined
        Processing => "PROCESSING",
        /// Authorized (terminal)
        Approved => "APPROVED",
        /// Rejected (terminal)
        Declined => "DECLINED",
    }
}

impl RequestStatus {
    /// `APPROVED` and `DECLINED` never change again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Declined)
    }
}

wire_enum! {
    /// How the customer is expected to interact with the request
    #[derive(Default)]
    pub enum Channel {
        /// Redirected to the payment app by a native mobile application
        #[default]
        InApp => "IN_APP",
        /// Presents or scans a QR code at a physical location
        InPerson => "IN_PERSON",
        /// Scans a QR code or is redirected from a website
        Online => "ONLINE",
    }
}

wire_enum! {
    /// Who initiated a [`CustomerRequest`]
    pub enum OriginType {
        /// Created directly by the client
        Direct => "DIRECT",
        /// Created on behalf of a request initiator
        RequestInitiator => "REQUEST_INITIATOR",
    }
}

wire_enum! {
    /// Status of a [`Grant`]
    pub enum GrantStatus {
        /// Usable
        Active => "ACTIVE",
        /// Past its expiry
        Expired => "EXPIRED",
        /// Already used
        Consumed => "CONSUMED",
        /// Withdrawn by the customer
        Revoked => "REVOKED",
    }
}

wire_enum! {
    /// Kind of a [`Grant`]
    pub enum GrantType {
        /// Usable for a single payment
        OneTime => "ONE_TIME",
        /// Usable repeatedly
        Extended => "EXTENDED",
    }
}

/// URLs and expiry that drive the redirect-and-poll handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFlowTriggers {
    /// QR code as a raster image
    pub qr_code_image_url: Url,
    /// QR code as SVG
    pub qr_code_svg_url: Url,
    /// Deep link into the payment app
    pub mobile_url: Url,
    /// When new triggers must be fetched
    #[serde(with = "timestamp")]
    pub refreshes_at: DateTime<Utc>,
}

impl AuthFlowTriggers {
    /// Whether the triggers expire within [`EXPIRY_JITTER_SECONDS`] of `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.refreshes_at < now + Duration::seconds(EXPIRY_JITTER_SECONDS)
    }
}

/// Origin of a [`CustomerRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Origin kind
    #[serde(rename = "type")]
    pub origin_type: OriginType,
    /// Initiator id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Authorization artifact issued once a request is approved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant id, used to create the actual payment
    pub id: String,
    /// Customer who approved
    pub customer_id: String,
    /// The action this grant authorizes
    pub action: PaymentAction,
    /// Current status
    pub status: GrantStatus,
    /// Grant kind
    #[serde(rename = "type")]
    pub grant_type: GrantType,
    /// Channel the grant was issued through
    pub channel: Channel,
    /// Creation time
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last update time
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Expiry, for grants that expire
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Display information about the requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterProfile {
    /// Display name
    pub name: String,
    /// Logo image
    pub logo_url: Url,
}

/// The customer who acted on the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Customer id
    pub id: String,
    /// Public handle
    pub cashtag: String,
}

/// Server-issued customer request
///
/// An immutable snapshot: a new status arrives as a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRequest {
    /// Request id
    pub id: String,
    /// Current status
    pub status: RequestStatus,
    /// Payments requested
    pub actions: Vec<PaymentAction>,
    /// Handshake triggers, absent once no authorization is possible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_flow_triggers: Option<AuthFlowTriggers>,
    /// Where the payment app sends the customer back to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<Url>,
    /// Creation time
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last update time
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Expiry time
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
    /// Who created the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    /// Interaction channel
    pub channel: Channel,
    /// Grants, present once approved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants: Option<Vec<Grant>>,
    /// Merchant-side reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Requester display information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_profile: Option<RequesterProfile>,
    /// Customer information, present once the customer acted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_profile: Option<CustomerProfile>,
    /// Merchant-defined key/value pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl CustomerRequest {
    /// Deep link to hand to the payment app, if the request has one
    #[must_use]
    pub fn mobile_url(&self) -> Option<&Url> {
        self.auth_flow_triggers.as_ref().map(|triggers| &triggers.mobile_url)
    }
}
