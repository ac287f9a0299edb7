//! Mapping between local order lines and the lines of the remote order.
//!
//! Shipments and refunds address remote lines by id, while the shop addresses
//! its own items. Quantities flow back from webhook snapshots.

use super::order::{LocalOrder, OrderLine};
use super::remote::{LineQuantity, LineType, RemoteOrderLine};
use crate::error::{ReconcileError, Result};
use std::collections::BTreeMap;

/// Stores the remote line id on each local line with the same type and SKU.
///
/// Lines are matched in order, so duplicate SKUs pair up positionally.
pub fn link_remote_lines(order: &mut LocalOrder, remote_lines: &[RemoteOrderLine]) -> usize {
    let mut linked = 0;
    for remote in remote_lines {
        if let Some(local) = order.lines.iter_mut().find(|l| {
            l.remote_line_id.is_none() && l.line_type == remote.line_type && l.sku == remote.sku
        }) {
            local.remote_line_id = Some(remote.id.clone());
            linked += 1;
        }
    }
    linked
}

/// Copies shipped, refunded and canceled quantities from a webhook snapshot.
pub fn sync_from_remote(order: &mut LocalOrder, remote_lines: &[RemoteOrderLine], is_paid: bool) {
    for remote in remote_lines {
        let Some(local) = order
            .lines
            .iter_mut()
            .find(|l| l.remote_line_id.as_deref() == Some(remote.id.as_str()))
        else {
            continue;
        };

        local.qty_shipped = remote.quantity_shipped;
        local.qty_refunded = remote.quantity_refunded;
        local.qty_canceled = remote.quantity_canceled;
        if is_paid {
            local.qty_paid = local.qty_ordered;
        }
    }
}

/// Physical quantity that still has to be shipped.
pub fn open_for_shipment_qty(order: &LocalOrder) -> u32 {
    order
        .lines
        .iter()
        .filter(|l| l.line_type == LineType::Physical)
        .map(|l| {
            l.qty_ordered
                .saturating_sub(l.qty_shipped)
                .saturating_sub(l.qty_canceled)
        })
        .sum()
}

/// Paid product quantity that has not been refunded yet.
pub fn open_for_refund_qty(order: &LocalOrder) -> u32 {
    order
        .product_lines()
        .map(|l| l.qty_paid.saturating_sub(l.qty_refunded))
        .sum()
}

pub fn shippable_qty(line: &OrderLine) -> u32 {
    line.qty_ordered
        .saturating_sub(line.qty_shipped)
        .saturating_sub(line.qty_canceled)
}

pub fn refundable_qty(line: &OrderLine) -> u32 {
    line.qty_ordered.saturating_sub(line.qty_refunded)
}

/// Rejects `(item_id, qty)` pairs asking for more than `open` allows on the line.
///
/// Repeated items are added up first.
pub fn check_open_quantities<I, F>(order: &LocalOrder, items: I, open: F) -> Result<()>
where
    I: IntoIterator<Item = (u32, u32)>,
    F: Fn(&OrderLine) -> u32,
{
    let mut requested: BTreeMap<u32, u32> = BTreeMap::new();
    for (item_id, qty) in items {
        let total = requested.entry(item_id).or_default();
        *total = total.saturating_add(qty);
    }

    for (item_id, qty) in requested.into_iter().filter(|(_, qty)| *qty > 0) {
        let line = order
            .lines
            .iter()
            .find(|l| l.item_id == item_id)
            .ok_or_else(|| ReconcileError::NotFound(format!("Order item {item_id} not found")))?;
        let available = open(line);
        if qty > available {
            return Err(ReconcileError::Validation(format!(
                "Order item {item_id} has {available} open, {qty} requested"
            )));
        }
    }
    Ok(())
}

pub fn shipping_fee_line(order: &LocalOrder) -> Option<&OrderLine> {
    order
        .lines
        .iter()
        .find(|l| l.line_type == LineType::ShippingFee)
}

/// Translates `(item_id, qty)` pairs into remote line quantities.
pub fn remote_quantities<I>(order: &LocalOrder, items: I) -> Result<Vec<LineQuantity>>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    items
        .into_iter()
        .filter(|(_, qty)| *qty > 0)
        .map(|(item_id, qty)| -> Result<LineQuantity> {
            let line = order
                .lines
                .iter()
                .find(|l| l.item_id == item_id)
                .ok_or_else(|| {
                    ReconcileError::NotFound(format!("Order item {item_id} not found"))
                })?;
            let id = line.remote_line_id.clone().ok_or_else(|| {
                ReconcileError::Validation(format!(
                    "Order item {item_id} is not linked to a remote order line"
                ))
            })?;
            Ok(LineQuantity { id, quantity: qty })
        })
        .collect()
}

pub fn apply_shipped<I>(order: &mut LocalOrder, items: I)
where
    I: IntoIterator<Item = (u32, u32)>,
{
    for (item_id, qty) in items {
        if let Some(line) = order.lines.iter_mut().find(|l| l.item_id == item_id) {
            line.qty_shipped = line.qty_shipped.saturating_add(qty).min(line.qty_ordered);
        }
    }
}

pub fn apply_refunded<I>(order: &mut LocalOrder, items: I)
where
    I: IntoIterator<Item = (u32, u32)>,
{
    for (item_id, qty) in items {
        if let Some(line) = order.lines.iter_mut().find(|l| l.item_id == item_id) {
            line.qty_refunded = line.qty_refunded.saturating_add(qty).min(line.qty_ordered);
        }
    }
}

/// Marks every remaining line as shipped, including shipping and discount lines.
pub fn apply_ship_all(order: &mut LocalOrder) {
    for line in &mut order.lines {
        line.qty_shipped = line.qty_ordered.saturating_sub(line.qty_canceled);
    }
}

pub fn apply_refund_all(order: &mut LocalOrder) {
    for line in &mut order.lines {
        line.qty_refunded = line.qty_paid.max(line.qty_refunded);
    }
}
