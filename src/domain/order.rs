use super::money::{Currency, Money};
use super::remote::LineType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type OrderId = u64;
pub type InvoiceId = u32;

/// Payment information keys written to `Payment::additional_information`.
pub mod info {
    pub const PAYMENT_STATUS: &str = "payment_status";
    pub const CHECKOUT_URL: &str = "checkout_url";
    pub const CHECKOUT_TYPE: &str = "checkout_type";
    pub const EXPIRES_AT: &str = "expires_at";
    pub const SELECTED_ISSUER: &str = "selected_issuer";
    pub const LIMITED_METHODS: &str = "limited_methods";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    New,
    PendingPayment,
    Processing,
    Complete,
    Closed,
    Canceled,
    Holded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Open,
    Paid,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureCase {
    Online,
    Offline,
    NotCapture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub transaction_id: Option<String>,
    pub state: InvoiceState,
    pub capture_case: CaptureCase,
    pub grand_total: Money,
    #[serde(default)]
    pub email_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Authorization,
    Capture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub kind: TransactionKind,
    pub transaction_id: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub method: String,
    pub transaction_id: Option<String>,
    pub currency_code: Option<Currency>,
    pub is_transaction_closed: bool,
    pub additional_information: BTreeMap<String, String>,
    pub transactions: Vec<PaymentTransaction>,
    pub created_invoice: Option<InvoiceId>,
}

impl Payment {
    pub fn info(&self, key: &str) -> Option<&str> {
        self.additional_information.get(key).map(String::as_str)
    }

    pub fn set_info(&mut self, key: &str, value: impl Into<String>) {
        self.additional_information
            .insert(key.to_string(), value.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub company: Option<String>,
    pub prefix: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub street: Vec<String>,
    pub postcode: String,
    pub city: String,
    pub region: Option<String>,
    pub country_id: String,
}

/// A local order line, linked to its remote counterpart once the order exists remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: u32,
    pub line_type: LineType,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub qty_ordered: u32,
    #[serde(default)]
    pub qty_paid: u32,
    #[serde(default)]
    pub qty_shipped: u32,
    #[serde(default)]
    pub qty_refunded: u32,
    #[serde(default)]
    pub qty_canceled: u32,
    pub unit_price: Money,
    pub total_amount: Money,
    #[serde(default)]
    pub vat_rate: Decimal,
    pub vat_amount: Money,
    #[serde(default)]
    pub remote_line_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub item_id: u32,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: u32,
    #[serde(default)]
    pub remote_shipment_id: Option<String>,
    pub items: Vec<ShipmentItem>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Shipment {
    pub fn total_qty(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |total, i| total.saturating_add(i.qty))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: String,
    pub state: OrderState,
    pub comment: String,
    pub customer_notified: bool,
}

/// The local order aggregate: payment, invoices, shipments and status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOrder {
    pub id: OrderId,
    pub increment_id: String,
    #[serde(default)]
    pub store_id: u32,
    #[serde(default)]
    pub quote_id: u64,
    pub state: OrderState,
    pub status: String,
    #[serde(default)]
    pub email_sent: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    pub grand_total: Money,
    pub base_grand_total: Money,
    #[serde(default)]
    pub remote_transaction_id: Option<String>,
    #[serde(default)]
    pub payment: Payment,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl LocalOrder {
    pub fn new(id: OrderId, increment_id: impl Into<String>, grand_total: Money) -> Self {
        Self {
            id,
            increment_id: increment_id.into(),
            store_id: 0,
            quote_id: 0,
            state: OrderState::New,
            status: "pending".to_string(),
            email_sent: false,
            is_virtual: false,
            customer_email: String::new(),
            billing_address: Address::default(),
            shipping_address: None,
            base_grand_total: grand_total.clone(),
            grand_total,
            remote_transaction_id: None,
            payment: Payment::default(),
            lines: Vec::new(),
            invoices: Vec::new(),
            shipments: Vec::new(),
            history: Vec::new(),
        }
    }

    /// The amount the provider is expected to charge for this order.
    pub fn expected_amount(&self, use_base_currency: bool) -> &Money {
        if use_base_currency {
            &self.base_grand_total
        } else {
            &self.grand_total
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.state == OrderState::Canceled
    }

    pub fn set_state(&mut self, state: OrderState) {
        self.state = state;
    }

    /// Appends a history entry, switching to `status` first when one is given.
    pub fn add_status_history(&mut self, status: Option<&str>, comment: &str, notified: bool) {
        if let Some(status) = status {
            self.status = status.to_string();
        }
        self.history.push(HistoryEntry {
            status: self.status.clone(),
            state: self.state,
            comment: comment.to_string(),
            customer_notified: notified,
        });
    }

    pub fn add_comment(&mut self, comment: &str) {
        self.add_status_history(None, comment, false);
    }

    /// Cancels the order because the remote payment ended with `reason`.
    ///
    /// Returns `false` without touching anything when the order is already canceled.
    pub fn register_cancellation(&mut self, reason: &str) -> bool {
        if self.is_canceled() {
            return false;
        }

        for invoice in self
            .invoices
            .iter_mut()
            .filter(|i| i.state == InvoiceState::Open)
        {
            invoice.state = InvoiceState::Canceled;
        }
        for line in &mut self.lines {
            line.qty_canceled = line.qty_ordered.saturating_sub(line.qty_shipped);
        }

        self.state = OrderState::Canceled;
        self.add_status_history(
            Some("canceled"),
            &format!("The order was canceled, reason: payment {reason}"),
            false,
        );
        true
    }

    /// Reverts a cancellation so a late payment can still be registered.
    pub fn uncancel(&mut self, status: &str) -> bool {
        if !self.is_canceled() {
            return false;
        }

        for line in &mut self.lines {
            line.qty_canceled = 0;
        }
        self.state = OrderState::New;
        self.add_status_history(Some(status), "Order uncanceled by webhook", false);
        true
    }

    fn next_invoice_id(&self) -> InvoiceId {
        self.invoices.iter().map(|i| i.id).max().unwrap_or(0) + 1
    }

    pub fn invoice(&self, id: InvoiceId) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    pub fn invoice_mut(&mut self, id: InvoiceId) -> Option<&mut Invoice> {
        self.invoices.iter_mut().find(|i| i.id == id)
    }

    pub fn last_invoice(&self) -> Option<&Invoice> {
        self.invoices.last()
    }

    pub fn has_invoice_for(&self, transaction_id: &str) -> bool {
        self.invoices.iter().any(|i| {
            i.state != InvoiceState::Canceled && i.transaction_id.as_deref() == Some(transaction_id)
        })
    }

    /// Records that `amount` was captured, paying the open invoice of the
    /// transaction or creating a paid one.
    pub fn register_capture_notification(
        &mut self,
        amount: Money,
        transaction_id: &str,
    ) -> InvoiceId {
        let open = self
            .invoices
            .iter()
            .find(|i| {
                i.state == InvoiceState::Open
                    && i.transaction_id.as_deref().is_none_or(|t| t == transaction_id)
            })
            .map(|i| i.id);

        let invoice_id = match open {
            Some(id) => {
                if let Some(invoice) = self.invoice_mut(id) {
                    invoice.state = InvoiceState::Paid;
                    invoice.transaction_id = Some(transaction_id.to_string());
                }
                id
            }
            None => {
                let id = self.next_invoice_id();
                self.invoices.push(Invoice {
                    id,
                    transaction_id: Some(transaction_id.to_string()),
                    state: InvoiceState::Paid,
                    capture_case: CaptureCase::Online,
                    grand_total: amount.clone(),
                    email_sent: false,
                });
                id
            }
        };

        for line in self.lines.iter_mut() {
            line.qty_paid = line.qty_ordered;
        }
        self.payment.transactions.push(PaymentTransaction {
            kind: TransactionKind::Capture,
            transaction_id: transaction_id.to_string(),
            amount,
        });
        self.payment.created_invoice = Some(invoice_id);
        invoice_id
    }

    pub fn register_authorization_notification(&mut self, amount: Money, transaction_id: &str) {
        self.payment.transactions.push(PaymentTransaction {
            kind: TransactionKind::Authorization,
            transaction_id: transaction_id.to_string(),
            amount,
        });
    }

    /// Creates an open invoice that records the sale without claiming the funds.
    pub fn create_pending_invoice(&mut self, transaction_id: &str) -> Invoice {
        let invoice = Invoice {
            id: self.next_invoice_id(),
            transaction_id: Some(transaction_id.to_string()),
            state: InvoiceState::Open,
            capture_case: CaptureCase::NotCapture,
            grand_total: self.base_grand_total.clone(),
            email_sent: false,
        };
        self.invoices.push(invoice.clone());
        self.payment.created_invoice = Some(invoice.id);
        invoice
    }

    pub fn product_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| l.line_type.is_product())
    }

    pub fn total_qty_ordered(&self) -> u32 {
        self.product_lines()
            .fold(0, |total, l| total.saturating_add(l.qty_ordered))
    }

    pub fn has_shipments(&self) -> bool {
        !self.shipments.is_empty()
    }

    pub fn shipment_mut(&mut self, id: u32) -> Option<&mut Shipment> {
        self.shipments.iter_mut().find(|s| s.id == id)
    }
}
