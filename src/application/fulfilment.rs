use super::locks::OrderLocks;
use crate::config::{ApiKey, Settings};
use crate::domain::order::{InvoiceState, LocalOrder, OrderId, Shipment, ShipmentItem, Track};
use crate::domain::order_lines;
use crate::domain::ports::{SharedGateway, SharedNotifier, SharedOrderStore};
use crate::domain::remote::Tracking;
use crate::error::{ReconcileError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentRequest {
    pub shipment_id: u32,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipmentOutcome {
    Pushed {
        remote_shipment_id: String,
        ship_all: bool,
    },
    AlreadyPushed,
}

/// Commands that push local fulfilment back to the remote order.
pub struct FulfilmentService {
    gateway: SharedGateway,
    store: SharedOrderStore,
    notifier: SharedNotifier,
    settings: Arc<Settings>,
    locks: OrderLocks,
}

impl FulfilmentService {
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

    async fn load(&self, order_id: OrderId) -> Result<(LocalOrder, String)> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("Order {order_id} not found")))?;
        let transaction_id = order.remote_transaction_id.clone().ok_or_else(|| {
            error!(order_id, "transaction id not found");
            ReconcileError::Configuration("Transaction ID not found".to_string())
        })?;
        Ok((order, transaction_id))
    }

    fn api_key(&self, order: &LocalOrder) -> Result<&ApiKey> {
        self.settings
            .for_store(order.store_id)
            .require_api_key()
            .inspect_err(|_| error!(order_id = order.id, "API key not found"))
    }

    /// Cancels the remote order. Failures are returned to the caller.
    pub async fn cancel_remote(&self, order_id: OrderId) -> Result<()> {
        let _guard = self.locks.acquire(order_id).await;
        let (order, transaction_id) = self.load(order_id).await?;
        let key = self.api_key(&order)?;

        self.gateway
            .cancel_order(key, &transaction_id)
            .await
            .inspect_err(|e| error!(order_id, %transaction_id, error = %e, "remote cancel failed"))?;
        info!(order_id, %transaction_id, "remote order canceled");
        Ok(())
    }

    pub async fn create_shipment(
        &self,
        order_id: OrderId,
        request: ShipmentRequest,
    ) -> Result<ShipmentOutcome> {
        let _guard = self.locks.acquire(order_id).await;
        let (mut order, transaction_id) = self.load(order_id).await?;

        let already_pushed = order
            .shipments
            .iter()
            .any(|s| s.id == request.shipment_id && s.remote_shipment_id.is_some());
        if already_pushed {
            warn!(order_id, shipment_id = request.shipment_id, "shipment already pushed");
            return Ok(ShipmentOutcome::AlreadyPushed);
        }

        let key = self.api_key(&order)?;
        order_lines::check_open_quantities(
            &order,
            request.items.iter().map(|i| (i.item_id, i.qty)),
            order_lines::shippable_qty,
        )?;
        let shipment_qty = request
            .items
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.qty));

        // Shipping the remainder also ships the shipping fee and discount lines.
        let ship_all = order.total_qty_ordered() == shipment_qty
            || order_lines::open_for_shipment_qty(&order) == shipment_qty;

        let remote_shipment = if ship_all {
            self.gateway.ship_all(key, &transaction_id).await
        } else {
            let lines = order_lines::remote_quantities(
                &order,
                request.items.iter().map(|i| (i.item_id, i.qty)),
            )?;
            self.gateway
                .create_shipment(key, &transaction_id, &lines)
                .await
        }
        .inspect_err(|e| error!(order_id, %transaction_id, error = %e, "shipment push failed"))?;

        if ship_all {
            order_lines::apply_ship_all(&mut order);
        } else {
            order_lines::apply_shipped(&mut order, request.items.iter().map(|i| (i.item_id, i.qty)));
        }

        match order.shipment_mut(request.shipment_id) {
            Some(shipment) => shipment.remote_shipment_id = Some(remote_shipment.id.clone()),
            None => order.shipments.push(Shipment {
                id: request.shipment_id,
                remote_shipment_id: Some(remote_shipment.id.clone()),
                items: request.items.clone(),
                tracks: Vec::new(),
            }),
        }
        self.store.save(&order).await?;
        info!(order_id, shipment_id = %remote_shipment.id, ship_all, "shipment pushed");

        self.capture_on_shipment(&mut order, &transaction_id).await?;

        Ok(ShipmentOutcome::Pushed {
            remote_shipment_id: remote_shipment.id,
            ship_all,
        })
    }

    /// Authorized-only methods are captured by the provider once shipped.
    async fn capture_on_shipment(&self, order: &mut LocalOrder, transaction_id: &str) -> Result<()> {
        let pending = order
            .last_invoice()
            .is_some_and(|i| i.state == InvoiceState::Open);
        if !pending {
            return Ok(());
        }

        let total = order.base_grand_total.clone();
        let invoice_id = order.register_capture_notification(total, transaction_id);
        order.payment.is_transaction_closed = true;
        self.store.save(order).await?;
        info!(order_id = order.id, invoice_id, "captured on shipment");

        let send_invoice = self.settings.for_store(order.store_id).send_invoice_email;
        if let Some(invoice) = order.invoice(invoice_id).cloned()
            && send_invoice
            && !invoice.email_sent
        {
            match self.notifier.send_invoice_email(order, &invoice).await {
                Ok(()) => {
                    if let Some(sent) = order.invoice_mut(invoice_id) {
                        sent.email_sent = true;
                    }
                    self.store.save(order).await?;
                }
                Err(e) => warn!(order_id = order.id, invoice_id, error = %e, "failed to send invoice email"),
            }
        }
        Ok(())
    }

    /// Adds carrier tracking to a pushed shipment.
    ///
    /// A failing provider call is logged only; the track is kept locally.
    pub async fn update_tracking(
        &self,
        order_id: OrderId,
        shipment_id: u32,
        track: Track,
    ) -> Result<()> {
        let _guard = self.locks.acquire(order_id).await;
        let (mut order, transaction_id) = self.load(order_id).await?;
        let remote_shipment_id = order
            .shipments
            .iter()
            .find(|s| s.id == shipment_id)
            .and_then(|s| s.remote_shipment_id.clone())
            .ok_or_else(|| {
                error!(order_id, shipment_id, "shipment id not found");
                ReconcileError::NotFound(format!("Shipment {shipment_id} was not pushed"))
            })?;
        let key = self.api_key(&order)?;

        let tracking = Tracking {
            carrier: track.title.clone(),
            code: track.number.clone(),
        };
        match self
            .gateway
            .update_shipment_tracking(key, &transaction_id, &remote_shipment_id, &tracking)
            .await
        {
            Ok(()) => info!(
                order_id,
                carrier = %tracking.carrier,
                %transaction_id,
                "added shipment tracking"
            ),
            Err(e) => error!(order_id, %transaction_id, error = %e, "tracking update failed"),
        }

        if let Some(shipment) = order.shipment_mut(shipment_id) {
            shipment.tracks.push(track);
        }
        self.store.save(&order).await
    }
}
