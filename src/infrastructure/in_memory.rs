use crate::config::ApiKey;
use crate::domain::order::{Invoice, InvoiceId, LocalOrder, OrderId};
use crate::domain::payload::{MethodSelection, OrderPayload};
use crate::domain::ports::{
    CheckoutSession, LastOrder, Notifier, OrderStore, PaymentGateway,
};
use crate::domain::remote::{
    LineQuantity, RemoteOrder, RemoteOrderLine, RemoteOrderStatus, RemotePayment, RemoteShipment,
    Tracking,
};
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// Uses `Arc<RwLock<HashMap<OrderId, LocalOrder>>>` so clones share the same orders.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, LocalOrder>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: LocalOrder) {
        self.orders.write().await.insert(order.id, order);
    }

    pub async fn get_order(&self, id: OrderId) -> Option<LocalOrder> {
        self.orders.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: OrderId) -> Result<Option<LocalOrder>> {
        Ok(self.get_order(id).await)
    }

    async fn save(&self, order: &LocalOrder) -> Result<()> {
        self.insert(order.clone()).await;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<LocalOrder>> {
        let orders = self.orders.read().await;
        let mut all: Vec<LocalOrder> = orders.values().cloned().collect();
        all.sort_by_key(|o| o.id);
        Ok(all)
    }
}

/// Every call the in-memory gateway received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    FetchOrder { id: String, embed_payments: bool },
    FetchPayment { id: String },
    CreateOrder { payload: Box<OrderPayload> },
    CancelOrder { id: String },
    ShipAll { id: String },
    CreateShipment { id: String, lines: Vec<LineQuantity> },
    UpdateTracking { id: String, shipment_id: String, tracking: Tracking },
    RefundAll { id: String },
    RefundLines { id: String, lines: Vec<LineQuantity> },
}

/// Scripted stand-in for the provider API.
///
/// Remote orders are seeded with `insert_order`; `set_unavailable(true)` makes
/// every call fail with a transport error.
#[derive(Default, Clone)]
pub struct InMemoryGateway {
    orders: Arc<RwLock<HashMap<String, RemoteOrder>>>,
    payments: Arc<RwLock<HashMap<String, RemotePayment>>>,
    calls: Arc<RwLock<Vec<GatewayCall>>>,
    unavailable: Arc<AtomicBool>,
    sequence: Arc<AtomicU32>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_order(&self, order: RemoteOrder) {
        self.orders.write().await.insert(order.id.clone(), order);
    }

    pub async fn insert_payment(&self, payment: RemotePayment) {
        self.payments
            .write()
            .await
            .insert(payment.id.clone(), payment);
    }

    pub async fn remote_order(&self, id: &str) -> Option<RemoteOrder> {
        self.orders.read().await.get(id).cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: GatewayCall) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ReconcileError::Transport(
                "503 Service Unavailable".to_string(),
            ));
        }
        self.calls.write().await.push(call);
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_{n:06}")
    }

    async fn require_order(&self, id: &str) -> Result<RemoteOrder> {
        self.remote_order(id).await.ok_or_else(|| {
            ReconcileError::Transport(format!("404 Not Found: no order with token {id}"))
        })
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn fetch_order(
        &self,
        _key: &ApiKey,
        order_id: &str,
        embed_payments: bool,
    ) -> Result<RemoteOrder> {
        self.record(GatewayCall::FetchOrder {
            id: order_id.to_string(),
            embed_payments,
        })
        .await?;
        let order = self.require_order(order_id).await?;
        Ok(if embed_payments {
            order
        } else {
            order.without_payments()
        })
    }

    async fn fetch_payment(&self, _key: &ApiKey, payment_id: &str) -> Result<RemotePayment> {
        self.record(GatewayCall::FetchPayment {
            id: payment_id.to_string(),
        })
        .await?;
        self.payments
            .read()
            .await
            .get(payment_id)
            .cloned()
            .ok_or_else(|| {
                ReconcileError::Transport(format!("404 Not Found: no payment with id {payment_id}"))
            })
    }

    async fn create_order(&self, _key: &ApiKey, payload: &OrderPayload) -> Result<RemoteOrder> {
        self.record(GatewayCall::CreateOrder {
            payload: Box::new(payload.clone()),
        })
        .await?;

        let id = self.next_id("ord");
        let lines = payload
            .lines
            .iter()
            .map(|line| RemoteOrderLine {
                id: self.next_id("odl"),
                line_type: line.line_type,
                sku: line.sku.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                quantity_shipped: 0,
                quantity_refunded: 0,
                quantity_canceled: 0,
                total_amount: line.total_amount.clone(),
            })
            .collect();
        let method = match &payload.method {
            MethodSelection::Single(method) => Some(method.clone()),
            MethodSelection::Limited(_) => None,
        };

        let order = RemoteOrder {
            checkout_url: Some(format!("https://pay.example/checkout/{id}")),
            id,
            status: RemoteOrderStatus::Created,
            amount: payload.amount.clone(),
            amount_captured: None,
            method,
            lines,
            embedded: None,
            metadata: Some(payload.metadata.clone()),
            expires_at: None,
        };
        self.insert_order(order.clone()).await;
        Ok(order)
    }

    async fn cancel_order(&self, _key: &ApiKey, order_id: &str) -> Result<()> {
        self.record(GatewayCall::CancelOrder {
            id: order_id.to_string(),
        })
        .await?;
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ReconcileError::Transport(format!("404 Not Found: {order_id}")))?;
        order.status = RemoteOrderStatus::Canceled;
        Ok(())
    }

    async fn ship_all(&self, _key: &ApiKey, order_id: &str) -> Result<RemoteShipment> {
        self.record(GatewayCall::ShipAll {
            id: order_id.to_string(),
        })
        .await?;
        self.require_order(order_id).await?;
        Ok(RemoteShipment {
            id: self.next_id("shp"),
            order_id: order_id.to_string(),
        })
    }

    async fn create_shipment(
        &self,
        _key: &ApiKey,
        order_id: &str,
        lines: &[LineQuantity],
    ) -> Result<RemoteShipment> {
        self.record(GatewayCall::CreateShipment {
            id: order_id.to_string(),
            lines: lines.to_vec(),
        })
        .await?;
        self.require_order(order_id).await?;
        Ok(RemoteShipment {
            id: self.next_id("shp"),
            order_id: order_id.to_string(),
        })
    }

    async fn update_shipment_tracking(
        &self,
        _key: &ApiKey,
        order_id: &str,
        shipment_id: &str,
        tracking: &Tracking,
    ) -> Result<()> {
        self.record(GatewayCall::UpdateTracking {
            id: order_id.to_string(),
            shipment_id: shipment_id.to_string(),
            tracking: tracking.clone(),
        })
        .await
    }

    async fn refund_all(&self, _key: &ApiKey, order_id: &str) -> Result<()> {
        self.record(GatewayCall::RefundAll {
            id: order_id.to_string(),
        })
        .await
    }

    async fn refund_lines(
        &self,
        _key: &ApiKey,
        order_id: &str,
        lines: &[LineQuantity],
    ) -> Result<()> {
        self.record(GatewayCall::RefundLines {
            id: order_id.to_string(),
            lines: lines.to_vec(),
        })
        .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    NewOrder { order_id: OrderId },
    Invoice { order_id: OrderId, invoice_id: InvoiceId },
}

/// Collects emails instead of sending them.
#[derive(Default, Clone)]
pub struct OutboxNotifier {
    sent: Arc<RwLock<Vec<SentEmail>>>,
    failing: Arc<AtomicBool>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.read().await.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    async fn push(&self, email: SentEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReconcileError::Notification(
                "mail transport unavailable".to_string(),
            ));
        }
        self.sent.write().await.push(email);
        Ok(())
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send_new_order_email(&self, order: &LocalOrder) -> Result<()> {
        self.push(SentEmail::NewOrder { order_id: order.id }).await
    }

    async fn send_invoice_email(&self, order: &LocalOrder, invoice: &Invoice) -> Result<()> {
        self.push(SentEmail::Invoice {
            order_id: order.id,
            invoice_id: invoice.id,
        })
        .await
    }
}

/// Browser session of a single customer request.
#[derive(Default)]
pub struct InMemorySession {
    last_order: Mutex<Option<LastOrder>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_order(&self) -> Option<LastOrder> {
        self.last_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CheckoutSession for InMemorySession {
    fn last_order_id(&self) -> Option<OrderId> {
        self.last_order().map(|last| last.order_id)
    }

    fn link_order(&self, last: LastOrder) {
        *self
            .last_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(last);
    }
}
