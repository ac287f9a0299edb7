//! Snapshots returned by the provider's Orders API.
//!
//! Status strings are mapped onto closed enums here; anything the provider adds
//! later lands in `Unknown` and is handled as a failure by the engine.

use super::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteOrderStatus {
    Created,
    Pending,
    Authorized,
    Paid,
    Shipping,
    Completed,
    Canceled,
    Expired,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl RemoteOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::Shipping => "shipping",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RemoteOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePaymentStatus {
    Open,
    Pending,
    Authorized,
    Paid,
    Canceled,
    Expired,
    Failed,
    #[serde(other)]
    Unknown,
}

impl RemotePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// A payment attempt that ended without funds.
    pub fn is_unsuccessful(&self) -> bool {
        matches!(self, Self::Canceled | Self::Failed | Self::Expired)
    }
}

impl fmt::Display for RemotePaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePayment {
    pub id: String,
    pub status: RemotePaymentStatus,
    #[serde(default)]
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Physical,
    Digital,
    Discount,
    ShippingFee,
    StoreCredit,
    GiftCard,
    Surcharge,
}

impl LineType {
    /// Lines that are shipped and counted against ordered quantities.
    pub fn is_product(&self) -> bool {
        matches!(self, Self::Physical | Self::Digital)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrderLine {
    pub id: String,
    #[serde(rename = "type")]
    pub line_type: LineType,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub quantity_shipped: u32,
    #[serde(default)]
    pub quantity_refunded: u32,
    #[serde(default)]
    pub quantity_canceled: u32,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub order_id: u64,
    pub store_id: u32,
    pub payment_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedded {
    #[serde(default)]
    pub payments: Vec<RemotePayment>,
}

/// A single fetch of a remote order. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrder {
    pub id: String,
    pub status: RemoteOrderStatus,
    pub amount: Money,
    #[serde(default)]
    pub amount_captured: Option<Money>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub lines: Vec<RemoteOrderLine>,
    #[serde(rename = "_embedded", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Embedded>,
    #[serde(default)]
    pub metadata: Option<OrderMetadata>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl RemoteOrder {
    /// The most recent embedded payment attempt, if payments were embedded.
    pub fn last_payment(&self) -> Option<&RemotePayment> {
        self.embedded.as_ref().and_then(|e| e.payments.last())
    }

    pub fn is_paid(&self) -> bool {
        self.status == RemoteOrderStatus::Paid
    }

    pub fn is_authorized(&self) -> bool {
        self.status == RemoteOrderStatus::Authorized
    }

    pub fn payment_token(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.payment_token.as_str())
    }

    pub fn without_payments(mut self) -> Self {
        self.embedded = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteShipment {
    pub id: String,
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub carrier: String,
    pub code: String,
}

/// A line quantity sent with partial shipment and refund requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantity {
    pub id: String,
    pub quantity: u32,
}

/// Transaction ids issued by the Orders API; anything else is a legacy payment id.
pub fn is_order_id(transaction_id: &str) -> bool {
    match transaction_id.strip_prefix("ord_") {
        Some(rest) => {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "id": "ord_kEn1PlbGa",
        "status": "paid",
        "amount": {"value": "100.00", "currency": "EUR"},
        "amountCaptured": null,
        "method": "ideal",
        "lines": [{
            "id": "odl_dgtxyl",
            "type": "physical",
            "sku": "SKU-1",
            "name": "Mug",
            "quantity": 2,
            "quantityShipped": 1,
            "totalAmount": {"value": "100.00", "currency": "EUR"}
        }],
        "_embedded": {"payments": [
            {"id": "tr_1", "status": "paid"},
            {"id": "tr_2", "status": "expired"}
        ]},
        "metadata": {"order_id": 7, "store_id": 1, "payment_token": "abc"}
    }"#;

    #[test]
    fn test_deserialize_snapshot() {
        let order: RemoteOrder = serde_json::from_str(SNAPSHOT).unwrap();
        assert_eq!(order.status, RemoteOrderStatus::Paid);
        assert_eq!(order.lines[0].quantity_shipped, 1);
        assert_eq!(order.lines[0].quantity_refunded, 0);
        assert_eq!(order.payment_token(), Some("abc"));
        assert_eq!(
            order.last_payment().map(|p| p.status),
            Some(RemotePaymentStatus::Expired)
        );
    }

    #[test]
    fn test_unrecognized_status_maps_to_unknown() {
        let raw = SNAPSHOT.replace(r#""status": "paid","#, r#""status": "on_hold","#);
        let order: RemoteOrder = serde_json::from_str(&raw).unwrap();
        assert_eq!(order.status, RemoteOrderStatus::Unknown);
    }

    #[test]
    fn test_last_payment_absent_without_embed() {
        let order: RemoteOrder = serde_json::from_str(SNAPSHOT).unwrap();
        assert!(order.without_payments().last_payment().is_none());
    }

    #[test]
    fn test_is_order_id() {
        assert!(is_order_id("ord_kEn1PlbGa"));
        assert!(is_order_id("ord_a_b"));
        assert!(!is_order_id("tr_WDqYK6vllg"));
        assert!(!is_order_id("ord_"));
        assert!(!is_order_id("ord_abc-def"));
        assert!(!is_order_id("ord_ābc"));
        assert!(!is_order_id("ord_١٢٣"));
    }

    #[test]
    fn test_unsuccessful_payment_statuses() {
        assert!(RemotePaymentStatus::Canceled.is_unsuccessful());
        assert!(RemotePaymentStatus::Failed.is_unsuccessful());
        assert!(RemotePaymentStatus::Expired.is_unsuccessful());
        assert!(!RemotePaymentStatus::Paid.is_unsuccessful());
        assert!(!RemotePaymentStatus::Open.is_unsuccessful());
    }
}
