use super::locks::OrderLocks;
use crate::config::Settings;
use crate::domain::money::AMOUNT_TOLERANCE;
use crate::domain::order::OrderId;
use crate::domain::order_lines;
use crate::domain::ports::{SharedGateway, SharedOrderStore};
use crate::domain::remote::LineQuantity;
use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pay-later methods are only captured, and therefore refundable, after shipment.
pub const PAY_LATER_METHODS: [&str; 2] = ["klarnapaylater", "klarnasliceit"];

/// Whether the shop asked for the refund to be executed at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundMode {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditMemoItem {
    pub item_id: u32,
    pub qty: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditMemo {
    pub items: Vec<CreditMemoItem>,
    pub shipping_amount: Decimal,
    pub shipping_incl_tax: Decimal,
    pub adjustment_positive: Decimal,
    pub adjustment_negative: Decimal,
}

impl CreditMemo {
    pub fn total_qty(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |total, i| total.saturating_add(i.qty))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// Nothing was sent to the provider; the operator has to refund there manually.
    Offline { notice: String },
    RefundedAll,
    RefundedLines(Vec<LineQuantity>),
}

pub struct RefundService {
    gateway: SharedGateway,
    store: SharedOrderStore,
    settings: Arc<Settings>,
    locks: OrderLocks,
}

impl RefundService {
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
        }
    }

    pub async fn create_refund(
        &self,
        order_id: OrderId,
        memo: CreditMemo,
        mode: RefundMode,
    ) -> Result<RefundOutcome> {
        if mode == RefundMode::Offline {
            let notice = "An offline refund has been created, make sure to also create this \
                          refund at the payment provider or use the online refund option."
                .to_string();
            warn!(order_id, "offline refund, provider not notified");
            return Ok(RefundOutcome::Offline { notice });
        }

        let _guard = self.locks.acquire(order_id).await;
        let mut order = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("Order {order_id} not found")))?;

        if PAY_LATER_METHODS.contains(&order.payment.method.as_str()) && !order.has_shipments() {
            return Err(ReconcileError::Validation(
                "Order can only be refunded after it has been captured (after shipment)"
                    .to_string(),
            ));
        }

        let transaction_id = order.remote_transaction_id.clone().ok_or_else(|| {
            error!(order_id, "transaction id not found");
            ReconcileError::Configuration("Transaction ID not found".to_string())
        })?;
        let key = self
            .settings
            .for_store(order.store_id)
            .require_api_key()
            .inspect_err(|_| error!(order_id, "API key not found"))?;

        if memo.adjustment_positive > Decimal::ZERO || memo.adjustment_negative > Decimal::ZERO {
            error!(order_id, "refund with adjustment fees");
            return Err(ReconcileError::Validation(
                "Online refunds with adjustment fees are not supported".to_string(),
            ));
        }

        let mut shipping_item = None;
        if let Some(line) = order_lines::shipping_fee_line(&order)
            && line.qty_refunded == 0
            && memo.shipping_amount > Decimal::ZERO
        {
            if (memo.shipping_incl_tax - line.total_amount.value).abs() > AMOUNT_TOLERANCE {
                error!(
                    order_id,
                    memo_shipping = %memo.shipping_incl_tax,
                    line_shipping = %line.total_amount.value,
                    "shipping costs do not match"
                );
                return Err(ReconcileError::Validation(
                    "Cannot create online refund, shipping costs do not match".to_string(),
                ));
            }
            shipping_item = Some((line.item_id, line.qty_ordered));
        }

        order_lines::check_open_quantities(
            &order,
            memo.items.iter().map(|i| (i.item_id, i.qty)),
            order_lines::refundable_qty,
        )?;

        let memo_qty = memo.total_qty();
        let refund_all = order.total_qty_ordered() == memo_qty
            || order_lines::open_for_refund_qty(&order) == memo_qty;

        let items: Vec<(u32, u32)> = memo
            .items
            .iter()
            .map(|i| (i.item_id, i.qty))
            .chain(shipping_item)
            .collect();

        let outcome = if refund_all {
            self.gateway.refund_all(key, &transaction_id).await.inspect_err(
                |e| error!(order_id, %transaction_id, error = %e, "refund failed"),
            )?;
            order_lines::apply_refund_all(&mut order);
            RefundOutcome::RefundedAll
        } else {
            let lines = order_lines::remote_quantities(&order, items.iter().copied())?;
            self.gateway
                .refund_lines(key, &transaction_id, &lines)
                .await
                .inspect_err(|e| error!(order_id, %transaction_id, error = %e, "refund failed"))?;
            order_lines::apply_refunded(&mut order, items);
            RefundOutcome::RefundedLines(lines)
        };

        order.add_comment(&format!("Refund created at the payment provider ({memo_qty} items)"));
        self.store.save(&order).await?;
        info!(order_id, %transaction_id, refund_all, "refund created");
        Ok(outcome)
    }
}
