use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

wire_enum! {
    /// Supported currencies
    pub enum Currency {
        /// US dollars, amounts in cents
        Usd => "USD",
    }
}

wire_enum! {
    /// Wire discriminant of a [`PaymentAction`]
    pub enum PaymentType {
        /// A single payment
        OneTimePayment => "ONE_TIME_PAYMENT",
        /// A payment method stored on file
        OnFilePayment => "ON_FILE_PAYMENT",
    }
}

/// An amount in the smallest unit of its currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Money {
    /// Amount in minor units (cents)
    pub amount: u64,
    /// Currency of the amount
    pub currency: Currency,
}

impl Money {
    /// Create an amount
    #[must_use]
    pub const fn new(amount: u64, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

/// Variant-specific part of a [`PaymentAction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentKind {
    /// One-time payment, optionally for a fixed amount
    OneTime {
        /// Amount to authorize, if fixed
        money: Option<Money>,
    },
    /// On-file payment, optionally tied to an account in the merchant's system
    OnFile {
        /// Merchant-side account identifier
        account_reference_id: Option<String>,
    },
}

/// A payment the customer is asked to authorize
///
/// Fields that do not apply to the active variant cannot be represented.
/// When the action is *clearing* (only in update parameters) absent optional
/// fields are encoded as `null` so the server clears them; otherwise they are
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAction {
    scope_id: String,
    kind: PaymentKind,
    clearing: bool,
}

impl PaymentAction {
    /// A one-time payment within `scope_id`
    #[must_use]
    pub fn one_time(scope_id: impl Into<String>, money: Option<Money>) -> Self {
        Self {
            scope_id: scope_id.into(),
            kind: PaymentKind::OneTime { money },
            clearing: false,
        }
    }

    /// An on-file payment within `scope_id`
    #[must_use]
    pub fn on_file(scope_id: impl Into<String>, account_reference_id: Option<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            kind: PaymentKind::OnFile {
                account_reference_id,
            },
            clearing: false,
        }
    }

    /// Scope (brand or merchant) the payment belongs to
    #[must_use]
    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    /// Variant-specific fields
    #[must_use]
    pub const fn kind(&self) -> &PaymentKind {
        &self.kind
    }

    /// Wire discriminant
    #[must_use]
    pub const fn payment_type(&self) -> PaymentType {
        match self.kind {
            PaymentKind::OneTime { .. } => PaymentType::OneTimePayment,
            PaymentKind::OnFile { .. } => PaymentType::OnFilePayment,
        }
    }

    /// Amount of a one-time payment
    #[must_use]
    pub const fn money(&self) -> Option<Money> {
        match self.kind {
            PaymentKind::OneTime { money } => money,
            PaymentKind::OnFile { .. } => None,
        }
    }

    /// Account reference of an on-file payment
    #[must_use]
    pub fn account_reference_id(&self) -> Option<&str> {
        match &self.kind {
            PaymentKind::OnFile {
                account_reference_id,
            } => account_reference_id.as_deref(),
            PaymentKind::OneTime { .. } => None,
        }
    }

    /// Whether absent fields encode as `null`
    #[must_use]
    pub const fn is_clearing(&self) -> bool {
        self.clearing
    }

    /// The same action, encoding absent fields as `null`
    #[must_use]
    pub fn into_clearing(mut self) -> Self {
        self.clearing = true;
        self
    }
}

impl Serialize for PaymentAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.payment_type())?;
        map.serialize_entry("scope_id", &self.scope_id)?;

        match &self.kind {
            PaymentKind::OneTime { money } => {
                if self.clearing || money.is_some() {
                    map.serialize_entry("amount", &money.map(|m| m.amount))?;
                    map.serialize_entry("currency", &money.map(|m| m.currency))?;
                }
            },
            PaymentKind::OnFile {
                account_reference_id,
            } => {
                if self.clearing || account_reference_id.is_some() {
                    map.serialize_entry("account_reference_id", account_reference_id)?;
                }
            },
        }

        map.end()
    }
}

#[derive(Deserialize)]
struct RawPaymentAction {
    #[serde(rename = "type")]
    payment_type: PaymentType,
    scope_id: String,
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    account_reference_id: Option<String>,
}

impl<'de> Deserialize<'de> for PaymentAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPaymentAction::deserialize(deserializer)?;

        Ok(match raw.payment_type {
            PaymentType::OneTimePayment => {
                // an unknown currency drops the amount instead of failing the decode
                let currency = raw
                    .currency
                    .as_deref()
                    .and_then(|code| Currency::ALL.iter().copied().find(|c| c.as_str() == code));
                let money = raw.amount.zip(currency).map(|(amount, currency)| Money::new(amount, currency));
                Self::one_time(raw.scope_id, money)
            },
            PaymentType::OnFilePayment => Self::on_file(raw.scope_id, raw.account_reference_id),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_omits_absent_fields_when_not_clearing() {
        let action = PaymentAction::on_file("BRAND_9", None);
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "ON_FILE_PAYMENT", "scope_id": "BRAND_9"})
        );
    }

    #[test]
    fn test_encodes_nulls_when_clearing() {
        let one_time = PaymentAction::one_time("BRAND_9", None).into_clearing();
        assert_eq!(
            serde_json::to_value(&one_time).unwrap(),
            json!({"type": "ONE_TIME_PAYMENT", "scope_id": "BRAND_9", "amount": null, "currency": null})
        );

        let on_file = PaymentAction::on_file("BRAND_9", None).into_clearing();
        assert_eq!(
            serde_json::to_value(&on_file).unwrap(),
            json!({"type": "ON_FILE_PAYMENT", "scope_id": "BRAND_9", "account_reference_id": null})
        );
    }

    #[test]
    fn test_money_flattens_into_amount_and_currency() {
        let action = PaymentAction::one_time("MMI_1", Some(Money::new(500, Currency::Usd)));
        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(
            value,
            json!({"type": "ONE_TIME_PAYMENT", "scope_id": "MMI_1", "amount": 500, "currency": "USD"})
        );
        assert_eq!(serde_json::from_value::<PaymentAction>(value).unwrap(), action);
    }

    #[test]
    fn test_money_requires_amount_and_known_currency() {
        let unknown_currency: PaymentAction = serde_json::from_value(
            json!({"type": "ONE_TIME_PAYMENT", "scope_id": "MMI_1", "amount": 500, "currency": "EUR"}),
        )
        .unwrap();
        assert_eq!(unknown_currency.money(), None);

        let no_amount: PaymentAction = serde_json::from_value(
            json!({"type": "ONE_TIME_PAYMENT", "scope_id": "MMI_1", "currency": "USD"}),
        )
        .unwrap();
        assert_eq!(no_amount.money(), None);
    }

    #[test]
    fn test_inapplicable_fields_are_dropped() {
        let action: PaymentAction = serde_json::from_value(json!({
            "type": "ON_FILE_PAYMENT",
            "scope_id": "BRAND_9",
            "amount": 100,
            "currency": "USD",
            "account_reference_id": "acct-1"
        }))
        .unwrap();

        assert_eq!(action.money(), None);
        assert_eq!(action.account_reference_id(), Some("acct-1"));
        assert!(!action.is_clearing());
    }
}
