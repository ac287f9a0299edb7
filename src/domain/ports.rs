use super::order::{Invoice, LocalOrder, OrderId};
use super::payload::OrderPayload;
use super::remote::{LineQuantity, RemoteOrder, RemotePayment, RemoteShipment, Tracking};
use crate::config::ApiKey;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Client for the provider's Orders API.
///
/// Implementations report transport failures as `ReconcileError::Transport`
/// and own their own timeout policy.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_order(
        &self,
        key: &ApiKey,
        order_id: &str,
        embed_payments: bool,
    ) -> Result<RemoteOrder>;
    /// Fetches a legacy payment created before the Orders API was used.
    async fn fetch_payment(&self, key: &ApiKey, payment_id: &str) -> Result<RemotePayment>;
    async fn create_order(&self, key: &ApiKey, payload: &OrderPayload) -> Result<RemoteOrder>;
    async fn cancel_order(&self, key: &ApiKey, order_id: &str) -> Result<()>;
    async fn ship_all(&self, key: &ApiKey, order_id: &str) -> Result<RemoteShipment>;
    async fn create_shipment(
        &self,
        key: &ApiKey,
        order_id: &str,
        lines: &[LineQuantity],
    ) -> Result<RemoteShipment>;
    async fn update_shipment_tracking(
        &self,
        key: &ApiKey,
        order_id: &str,
        shipment_id: &str,
        tracking: &Tracking,
    ) -> Result<()>;
    async fn refund_all(&self, key: &ApiKey, order_id: &str) -> Result<()>;
    async fn refund_lines(&self, key: &ApiKey, order_id: &str, lines: &[LineQuantity])
    -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: OrderId) -> Result<Option<LocalOrder>>;
    async fn save(&self, order: &LocalOrder) -> Result<()>;
    /// Persists an invoice together with its order as one unit.
    async fn save_with_invoice(&self, order: &LocalOrder, _invoice: &Invoice) -> Result<()> {
        self.save(order).await
    }
    async fn all(&self) -> Result<Vec<LocalOrder>>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_new_order_email(&self, order: &LocalOrder) -> Result<()>;
    async fn send_invoice_email(&self, order: &LocalOrder, invoice: &Invoice) -> Result<()>;
}

/// Pointers kept in the customer's browser session after checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastOrder {
    pub quote_id: u64,
    pub success_quote_id: u64,
    pub order_id: OrderId,
    pub real_order_id: String,
}

/// The browser session of the customer returning from the hosted checkout.
pub trait CheckoutSession: Send + Sync {
    fn last_order_id(&self) -> Option<OrderId>;
    fn link_order(&self, last: LastOrder);
}

pub type SharedGateway = Arc<dyn PaymentGateway>;
pub type SharedOrderStore = Arc<dyn OrderStore>;
pub type SharedNotifier = Arc<dyn Notifier>;
