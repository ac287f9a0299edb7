use super::locks::OrderLocks;
use crate::config::{Settings, StoreSettings};
use crate::domain::order::{LocalOrder, OrderId, info};
use crate::domain::order_lines;
use crate::domain::payload::{
    MethodSelection, OrderPayload, PayloadAddress, PayloadLine, PaymentOptions,
};
use crate::domain::ports::{SharedGateway, SharedOrderStore};
use crate::domain::remote::{OrderMetadata, RemoteOrder, RemoteOrderStatus, is_order_id};
use crate::error::{ReconcileError, Result};
use chrono::{Days, Local, NaiveDate};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::Arc;
use tracing::{debug, info};

pub const CHECKOUT_TYPE: &str = "order";
pub const BANKTRANSFER: &str = "banktransfer";
pub const PAYMENT_LINK_METHOD: &str = "paymentlink";
const PAYMENT_TOKEN_LEN: usize = 32;

/// Random token carried in the return URL and the remote order metadata.
pub fn generate_payment_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PAYMENT_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Creates (or reuses) the remote order a customer is sent to at checkout.
pub struct CheckoutService {
    gateway: SharedGateway,
    store: SharedOrderStore,
    settings: Arc<Settings>,
    locks: OrderLocks,
    today: Clock,
}

impl CheckoutService {
    pub fn new(
        gateway: SharedGateway,
        store: SharedOrderStore,
        settings: Arc<Settings>,
        locks: OrderLocks,
    ) -> Self {
        Self {
            gateway,
            store,
            settings,
            locks,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replaces the clock used for bank transfer due dates.
    pub fn with_clock(mut self, today: Clock) -> Self {
        self.today = today;
        self
    }

    /// Returns the URL of the hosted checkout for `order_id`.
    pub async fn start_transaction(&self, order_id: OrderId) -> Result<String> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("Order {order_id} not found")))?;
        let settings = self.settings.for_store(order.store_id);
        let key = settings.require_api_key()?;

        if let Some(transaction_id) = order.remote_transaction_id.clone() {
            if !is_order_id(&transaction_id) {
                let payment = self.gateway.fetch_payment(key, &transaction_id).await?;
                info!(order_id, %transaction_id, "reusing legacy payment");
                return payment.checkout_url.ok_or_else(|| {
                    ReconcileError::Validation("Payment has no checkout URL".to_string())
                });
            }

            let existing = self
                .gateway
                .fetch_order(key, &transaction_id, false)
                .await?;
            if existing.status == RemoteOrderStatus::Created
                && let Some(url) = existing.checkout_url
            {
                info!(order_id, %transaction_id, "reusing remote order");
                return Ok(url);
            }
        }

        let token = generate_payment_token();
        let payload = self.build_payload(&order, settings, &token)?;
        debug!(order_id, request = ?payload, "creating remote order");

        let remote = self.gateway.create_order(key, &payload).await?;
        self.process_response(&mut order, &remote, settings).await?;

        remote.checkout_url.ok_or_else(|| {
            ReconcileError::Transport(format!("Remote order {} has no checkout URL", remote.id))
        })
    }

    pub fn build_payload(
        &self,
        order: &LocalOrder,
        settings: &StoreSettings,
        payment_token: &str,
    ) -> Result<OrderPayload> {
        if order.lines.is_empty() {
            return Err(ReconcileError::Validation(format!(
                "Order {} has no lines",
                order.id
            )));
        }

        let method = match order.payment.info(info::LIMITED_METHODS) {
            Some(methods) => MethodSelection::Limited(
                methods
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            None => MethodSelection::Single(order.payment.method.clone()),
        };

        let mut payment = PaymentOptions {
            issuer: order
                .payment
                .info(info::SELECTED_ISSUER)
                .map(str::to_string),
            due_date: None,
        };
        if order.payment.method == BANKTRANSFER {
            let today = (self.today)();
            payment.due_date =
                today.checked_add_days(Days::new(u64::from(settings.banktransfer_due_days)));
        }

        let shipping_address = match (&order.shipping_address, order.is_virtual) {
            (Some(address), false) => Some(PayloadAddress::from_address(
                address,
                &order.customer_email,
            )),
            _ => None,
        };

        Ok(OrderPayload {
            amount: order.expected_amount(settings.use_base_currency).clone(),
            order_number: order.increment_id.clone(),
            billing_address: PayloadAddress::from_address(
                &order.billing_address,
                &order.customer_email,
            ),
            shipping_address,
            lines: order.lines.iter().map(PayloadLine::from).collect(),
            redirect_url: format!(
                "{}?order_id={}&payment_token={}",
                settings.return_url, order.id, payment_token
            ),
            webhook_url: settings.webhook_url.clone(),
            locale: settings.locale.clone(),
            method,
            payment: (!payment.is_empty()).then_some(payment),
            metadata: OrderMetadata {
                order_id: order.id,
                store_id: order.store_id,
                payment_token: payment_token.to_string(),
            },
        })
    }

    /// Links a freshly created remote order to the local one.
    async fn process_response(
        &self,
        order: &mut LocalOrder,
        remote: &RemoteOrder,
        settings: &StoreSettings,
    ) -> Result<()> {
        info!(order_id = order.id, transaction_id = %remote.id, status = %remote.status, "remote order created");

        if let Some(url) = &remote.checkout_url {
            order.payment.set_info(info::CHECKOUT_URL, url.as_str());
        }
        order.payment.set_info(info::CHECKOUT_TYPE, CHECKOUT_TYPE);
        order
            .payment
            .set_info(info::PAYMENT_STATUS, remote.status.as_str());
        if let Some(expires_at) = &remote.expires_at {
            order.payment.set_info(info::EXPIRES_AT, expires_at.as_str());
        }

        let linked = order_lines::link_remote_lines(order, &remote.lines);
        debug!(order_id = order.id, linked, "linked order lines");

        let comment = if order.payment.method == PAYMENT_LINK_METHOD {
            "Created checkout URL"
        } else {
            "Customer redirected to the payment provider"
        };
        order.add_status_history(Some(&settings.status_pending), comment, false);
        order.remote_transaction_id = Some(remote.id.clone());
        self.store.save(order).await
    }
}
