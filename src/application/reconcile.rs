use super::locks::OrderLocks;
use crate::config::{Settings, StoreSettings};
use crate::domain::money::Money;
use crate::domain::order::{LocalOrder, OrderId, OrderState, info};
use crate::domain::order_lines;
use crate::domain::ports::{
    CheckoutSession, LastOrder, SharedGateway, SharedNotifier, SharedOrderStore,
};
use crate::domain::remote::{RemoteOrder, RemoteOrderStatus};
use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Webhook,
    Redirect,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Webhook => f.write_str("webhook"),
            TriggerKind::Redirect => f.write_str("redirect"),
        }
    }
}

/// What caused a reconciliation pass.
///
/// Only a customer returning from the hosted checkout has a browser session,
/// so only `Redirect` carries one.
pub enum Trigger<'a> {
    Webhook,
    Redirect {
        payment_token: Option<&'a str>,
        session: &'a dyn CheckoutSession,
    },
}

impl Trigger<'_> {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Webhook => TriggerKind::Webhook,
            Trigger::Redirect { .. } => TriggerKind::Redirect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub success: bool,
    pub status: String,
    pub order_id: OrderId,
    #[serde(rename = "type")]
    pub trigger: TriggerKind,
}

/// Applies the latest remote order snapshot to the local order.
///
/// Every pass fetches the remote order fresh, holds the order's lock from load
/// to the last save and may be replayed with the same snapshot without creating
/// a second invoice, email or history entry.
pub struct ReconciliationEngine {
    gateway: SharedGateway,
    store: SharedOrderStore,
    notifier: SharedNotifier,
    settings: Arc<Settings>,
    locks: OrderLocks,
}

impl ReconciliationEngine {
    pub fn new(
        gateway: SharedGateway,
        store: SharedOrderStore,
        notifier: SharedNotifier,
        settings: Arc<Settings>,
        locks: OrderLocks,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            settings,
            locks,
        }
    }

    /// Final state of every stored order.
    pub async fn into_results(self) -> Result<Vec<LocalOrder>> {
        self.store.all().await
    }

    pub async fn reconcile(
        &self,
        order_id: OrderId,
        trigger: Trigger<'_>,
    ) -> Result<ReconciliationResult> {
        let kind = trigger.kind();
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("Order {order_id} not found")))?;
        let settings = self.settings.for_store(order.store_id);

        let transaction_id = order.remote_transaction_id.clone().ok_or_else(|| {
            error!(order_id, trigger = %kind, "transaction id not found");
            ReconcileError::Configuration("Transaction ID not found".to_string())
        })?;
        let key = settings.require_api_key().inspect_err(|_| {
            error!(order_id, store_id = order.store_id, "API key not found");
        })?;

        let remote = self
            .gateway
            .fetch_order(key, &transaction_id, true)
            .await
            .inspect_err(|e| {
                error!(order_id, %transaction_id, trigger = %kind, error = %e, "failed to fetch remote order");
            })?;
        info!(
            order_id,
            %transaction_id,
            trigger = %kind,
            status = %remote.status,
            amount = %remote.amount,
            "fetched remote order"
        );

        let result = self
            .apply(&mut order, &remote, &transaction_id, &trigger, settings)
            .await?;
        info!(
            order_id,
            trigger = %kind,
            success = result.success,
            status = %result.status,
            "reconciliation finished"
        );
        Ok(result)
    }

    async fn apply(
        &self,
        order: &mut LocalOrder,
        remote: &RemoteOrder,
        transaction_id: &str,
        trigger: &Trigger<'_>,
        settings: &StoreSettings,
    ) -> Result<ReconciliationResult> {
        let kind = trigger.kind();

        // The latest attempt wins over the order-level status: a retry may
        // already have failed while an earlier attempt paid.
        if let Some(last) = remote.last_payment()
            && last.status.is_unsuccessful()
        {
            order.payment.set_info(info::PAYMENT_STATUS, last.status.as_str());
            self.store.save(order).await?;
            self.cancel(order, last.status.as_str()).await?;
            return Ok(outcome(order, last.status.as_str(), false, kind));
        }

        let expected = order.expected_amount(settings.use_base_currency).clone();
        if (remote.is_paid() || remote.is_authorized()) && !remote.amount.same_currency(&expected)
        {
            error!(
                order_id = order.id,
                remote_currency = %remote.amount.currency,
                expected_currency = %expected.currency,
                "currency does not match"
            );
            return Ok(outcome(order, RemoteOrderStatus::Paid.as_str(), false, kind));
        }

        order_lines::sync_from_remote(order, &remote.lines, remote.is_paid());
        order
            .payment
            .set_info(info::PAYMENT_STATUS, remote.status.as_str());
        self.store.save(order).await?;

        let status = remote.status.as_str();
        match remote.status {
            RemoteOrderStatus::Paid | RemoteOrderStatus::Authorized => {
                if !order.payment.is_transaction_closed && kind == TriggerKind::Webhook {
                    self.register_payment(order, remote, transaction_id, &expected, settings)
                        .await?;
                }
                link_session(order, remote, trigger);
                Ok(outcome(order, status, true, kind))
            }
            RemoteOrderStatus::Refunded => Ok(outcome(order, status, true, kind)),
            RemoteOrderStatus::Created => {
                self.await_deferred_payment(order, remote, settings).await?;
                link_session(order, remote, trigger);
                Ok(outcome(order, status, true, kind))
            }
            RemoteOrderStatus::Canceled | RemoteOrderStatus::Expired => {
                if kind == TriggerKind::Webhook {
                    self.cancel(order, status).await?;
                }
                Ok(outcome(order, status, false, kind))
            }
            RemoteOrderStatus::Completed => Ok(outcome(order, status, true, kind)),
            RemoteOrderStatus::Pending | RemoteOrderStatus::Shipping | RemoteOrderStatus::Unknown => {
                warn!(order_id = order.id, %status, "unhandled remote order status");
                Ok(outcome(order, status, false, kind))
            }
        }
    }

    async fn register_payment(
        &self,
        order: &mut LocalOrder,
        remote: &RemoteOrder,
        transaction_id: &str,
        expected: &Money,
        settings: &StoreSettings,
    ) -> Result<()> {
        if order.uncancel(&settings.status_pending) {
            info!(order_id = order.id, "reverted cancellation for late payment");
        }

        if remote.amount.within_tolerance(expected) {
            order.payment.transaction_id = Some(transaction_id.to_string());
            order.payment.currency_code = Some(order.base_grand_total.currency.clone());
            let total = order.base_grand_total.clone();

            let mut pending_invoice = None;
            if remote.is_paid() {
                order.payment.is_transaction_closed = true;
                let invoice_id = order.register_capture_notification(total, transaction_id);
                info!(order_id = order.id, invoice_id, "registered capture");
            } else if !order.has_invoice_for(transaction_id) {
                order.payment.is_transaction_closed = false;
                order.register_authorization_notification(total, transaction_id);
                let invoice = order.create_pending_invoice(transaction_id);
                info!(order_id = order.id, invoice_id = invoice.id, "registered authorization");
                pending_invoice = Some(invoice);
            }

            order.set_state(OrderState::Processing);
            match &pending_invoice {
                Some(invoice) => self.store.save_with_invoice(order, invoice).await?,
                None => self.store.save(order).await?,
            }

            if let Some(captured) = &remote.amount_captured
                && !captured.same_currency(&remote.amount)
            {
                let comment = format!(
                    "Order amount {}, captured amount {}",
                    remote.amount, captured
                );
                if !order.history.iter().any(|h| h.comment == comment) {
                    order.add_comment(&comment);
                    self.store.save(order).await?;
                }
            }
        } else {
            warn!(
                order_id = order.id,
                remote_amount = %remote.amount,
                expected_amount = %expected,
                "amount does not match, payment not registered"
            );
        }

        self.send_notifications(order, settings).await
    }

    async fn send_notifications(
        &self,
        order: &mut LocalOrder,
        settings: &StoreSettings,
    ) -> Result<()> {
        if !order.email_sent {
            self.send_order_email(order).await?;
        }

        if settings.send_invoice_email
            && let Some(invoice) = order
                .payment
                .created_invoice
                .and_then(|id| order.invoice(id))
                .filter(|invoice| !invoice.email_sent)
                .cloned()
        {
            match self.notifier.send_invoice_email(order, &invoice).await {
                Ok(()) => {
                    if let Some(sent) = order.invoice_mut(invoice.id) {
                        sent.email_sent = true;
                    }
                    self.store.save(order).await?;
                }
                Err(e) => {
                    warn!(order_id = order.id, invoice_id = invoice.id, error = %e, "failed to send invoice email")
                }
            }
        }

        if !order.is_virtual
            && let Some(status) = &settings.status_processing
            && *status != order.status
        {
            order.status = status.clone();
            self.store.save(order).await?;
        }
        Ok(())
    }

    async fn send_order_email(&self, order: &mut LocalOrder) -> Result<bool> {
        match self.notifier.send_new_order_email(order).await {
            Ok(()) => {
                order.email_sent = true;
                self.store.save(order).await?;
                Ok(true)
            }
            Err(e) => {
                warn!(order_id = order.id, error = %e, "failed to send order email");
                Ok(false)
            }
        }
    }

    /// Deferred methods (bank transfer) get their confirmation before the money arrives.
    async fn await_deferred_payment(
        &self,
        order: &mut LocalOrder,
        remote: &RemoteOrder,
        settings: &StoreSettings,
    ) -> Result<()> {
        let deferred = remote
            .method
            .as_deref()
            .is_some_and(|method| settings.is_deferred_method(method));
        if !deferred || order.email_sent {
            return Ok(());
        }

        let sent = self.send_order_email(order).await?;
        if order.state != OrderState::PendingPayment {
            let status = settings
                .status_pending_banktransfer
                .clone()
                .unwrap_or_else(|| order.status.clone());
            let comment = if sent {
                "New order email sent"
            } else {
                "Awaiting payment, order email not sent"
            };
            order.set_state(OrderState::PendingPayment);
            order.add_status_history(Some(&status), comment, sent);
            self.store.save(order).await?;
        }
        Ok(())
    }

    async fn cancel(&self, order: &mut LocalOrder, reason: &str) -> Result<()> {
        if order.register_cancellation(reason) {
            self.store.save(order).await?;
            info!(order_id = order.id, %reason, "order canceled");
        } else {
            debug!(order_id = order.id, "order already canceled");
        }
        Ok(())
    }
}

/// Points the returning customer's session at this order.
///
/// Skipped unless the return URL carried the token stored in the remote order,
/// so a stale or replayed token cannot take over the session.
fn link_session(order: &LocalOrder, remote: &RemoteOrder, trigger: &Trigger<'_>) {
    let Trigger::Redirect {
        payment_token,
        session,
    } = trigger
    else {
        return;
    };

    if session.last_order_id() == Some(order.id) {
        return;
    }

    match (payment_token, remote.payment_token()) {
        (Some(token), Some(expected)) if *token == expected => {
            session.link_order(LastOrder {
                quote_id: order.quote_id,
                success_quote_id: order.quote_id,
                order_id: order.id,
                real_order_id: order.increment_id.clone(),
            });
            debug!(order_id = order.id, "linked checkout session");
        }
        (Some(_), _) => warn!(order_id = order.id, "payment token mismatch, session not linked"),
        (None, _) => {}
    }
}

fn outcome(
    order: &LocalOrder,
    status: &str,
    success: bool,
    trigger: TriggerKind,
) -> ReconciliationResult {
    ReconciliationResult {
        success,
        status: status.to_string(),
        order_id: order.id,
        trigger,
    }
}
