//! Domain model.
//!
//! Immutable value types for customer requests, their payment actions, and
//! the parameters used to create and update them. All types serialize to the
//! API's snake_case JSON shape.

mod action;
mod params;
mod request;

pub use action::{Currency, Money, PaymentAction, PaymentKind, PaymentType};
pub use params::{CreateCustomerRequestParams, UpdateCustomerRequestParams};
pub use request::{
    AuthFlowTriggers, Channel, CustomerProfile, CustomerRequest, EXPIRY_JITTER_SECONDS, Grant,
    GrantStatus, GrantType, Origin, OriginType, RequestStatus, RequesterProfile,
};

/// Timestamp wire format: `yyyy-MM-ddTHH:mm:ss.SSSZ`, always UTC.
///
/// Decoding accepts any RFC 3339 timestamp.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// `chrono` format string used when encoding
    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    /// Encode a timestamp
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    /// Decode a timestamp
    ///
    /// # Errors
    ///
    /// Fails when the value is not an RFC 3339 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    /// Same format for optional timestamps
    pub mod option {
        use super::{DateTime, Deserialize, Deserializer, FORMAT, Serializer, Utc};

        /// Encode an optional timestamp (`null` when absent)
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        #[allow(clippy::ref_option)] // signature required by `serde(with)`
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.collect_str(&value.format(FORMAT)),
                None => serializer.serialize_none(),
            }
        }

        /// Decode an optional timestamp
        ///
        /// # Errors
        ///
        /// Fails when a present value is not an RFC 3339 string.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|parsed| parsed.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}
