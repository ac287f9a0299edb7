mod common;

use common::*;
use order_reconciler::application::refund::{CreditMemo, CreditMemoItem, RefundMode, RefundOutcome};
use order_reconciler::domain::order::{LocalOrder, Shipment, ShipmentItem};
use order_reconciler::domain::remote::{LineQuantity, RemoteOrderStatus};
use order_reconciler::error::ReconcileError;
use order_reconciler::infrastructure::in_memory::GatewayCall;
use rust_decimal_macros::dec;

fn paid_order() -> LocalOrder {
    let mut order = local_order();
    for line in &mut order.lines {
        line.qty_paid = line.qty_ordered;
    }
    order
}

fn memo(items: &[(u32, u32)]) -> CreditMemo {
    CreditMemo {
        items: items
            .iter()
            .map(|&(item_id, qty)| CreditMemoItem { item_id, qty })
            .collect(),
        ..CreditMemo::default()
    }
}

async fn harness_for(order: LocalOrder) -> Harness {
    Harness::new(
        order,
        Some(remote_order(RemoteOrderStatus::Paid, eur(dec!(100.00)))),
    )
    .await
}

#[tokio::test]
async fn test_full_refund_refunds_all() {
    let harness = harness_for(paid_order()).await;

    let outcome = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(1, 2)]), RefundMode::Online)
        .await
        .unwrap();

    assert_eq!(outcome, RefundOutcome::RefundedAll);
    assert_eq!(
        harness.gateway.calls().await,
        vec![GatewayCall::RefundAll {
            id: TRANSACTION_ID.to_string()
        }]
    );

    let order = harness.order().await;
    assert!(order.lines.iter().all(|l| l.qty_refunded == l.qty_paid));
    assert_eq!(
        order.history.last().map(|h| h.comment.as_str()),
        Some("Refund created at the payment provider (2 items)")
    );
}

#[tokio::test]
async fn test_partial_refund_sends_lines() {
    let harness = harness_for(paid_order()).await;

    let outcome = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(1, 1)]), RefundMode::Online)
        .await
        .unwrap();

    let expected = vec![LineQuantity {
        id: "odl_1".to_string(),
        quantity: 1,
    }];
    assert_eq!(outcome, RefundOutcome::RefundedLines(expected.clone()));
    assert_eq!(
        harness.gateway.calls().await,
        vec![GatewayCall::RefundLines {
            id: TRANSACTION_ID.to_string(),
            lines: expected,
        }]
    );
    assert_eq!(harness.order().await.lines[0].qty_refunded, 1);
}

#[tokio::test]
async fn test_remaining_quantity_refunds_all() {
    let harness = harness_for(paid_order()).await;
    let refunds = harness.refunds();

    refunds
        .create_refund(ORDER_ID, memo(&[(1, 1)]), RefundMode::Online)
        .await
        .unwrap();
    let outcome = refunds
        .create_refund(ORDER_ID, memo(&[(1, 1)]), RefundMode::Online)
        .await
        .unwrap();

    assert_eq!(outcome, RefundOutcome::RefundedAll);
}

#[tokio::test]
async fn test_partial_refund_includes_shipping_fee() {
    let harness = harness_for(paid_order()).await;
    let mut memo = memo(&[(1, 1)]);
    memo.shipping_amount = dec!(16.53);
    memo.shipping_incl_tax = dec!(20.00);

    let outcome = harness
        .refunds()
        .create_refund(ORDER_ID, memo, RefundMode::Online)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RefundOutcome::RefundedLines(vec![
            LineQuantity {
                id: "odl_1".to_string(),
                quantity: 1,
            },
            LineQuantity {
                id: "odl_2".to_string(),
                quantity: 1,
            },
        ])
    );
    assert_eq!(harness.order().await.lines[1].qty_refunded, 1);
}

#[tokio::test]
async fn test_shipping_mismatch_is_rejected() {
    let harness = harness_for(paid_order()).await;
    let mut memo = memo(&[(1, 1)]);
    memo.shipping_amount = dec!(12.40);
    memo.shipping_incl_tax = dec!(15.00);

    let err = harness
        .refunds()
        .create_refund(ORDER_ID, memo, RefundMode::Online)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Validation(_)));
    assert!(harness.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn test_adjustment_fees_are_rejected() {
    let harness = harness_for(paid_order()).await;
    let mut memo = memo(&[(1, 1)]);
    memo.adjustment_negative = dec!(5.00);

    let err = harness
        .refunds()
        .create_refund(ORDER_ID, memo, RefundMode::Online)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Validation(_)));
    assert!(harness.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn test_offline_refund_only_returns_notice() {
    let harness = harness_for(paid_order()).await;
    let before = harness.order().await;

    let outcome = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(1, 2)]), RefundMode::Offline)
        .await
        .unwrap();

    let RefundOutcome::Offline { notice } = outcome else {
        panic!("expected an offline outcome");
    };
    assert!(notice.contains("offline refund"));
    assert!(harness.gateway.calls().await.is_empty());
    assert_eq!(harness.order().await, before);
}

#[tokio::test]
async fn test_pay_later_requires_shipment() {
    let mut order = paid_order();
    order.payment.method = "klarnapaylater".to_string();
    let harness = harness_for(order).await;

    let err = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(1, 2)]), RefundMode::Online)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Validation(_)));

    let mut shipped = harness.order().await;
    shipped.shipments.push(Shipment {
        id: 1,
        remote_shipment_id: Some("shp_1".to_string()),
        items: vec![ShipmentItem { item_id: 1, qty: 2 }],
        tracks: Vec::new(),
    });
    harness.store.insert(shipped).await;

    let outcome = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(1, 2)]), RefundMode::Online)
        .await
        .unwrap();
    assert_eq!(outcome, RefundOutcome::RefundedAll);
}

#[tokio::test]
async fn test_failed_refund_changes_nothing() {
    let harness = harness_for(paid_order()).await;
    let before = harness.order().await;
    harness.gateway.set_unavailable(true);

    let err = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(1, 1)]), RefundMode::Online)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Transport(_)));
    assert_eq!(harness.order().await, before);
}

#[tokio::test]
async fn test_refund_above_open_quantity_is_rejected() {
    let harness = harness_for(paid_order()).await;
    let before = harness.order().await;

    for items in [&[(1, u32::MAX)][..], &[(1, 1), (1, u32::MAX)][..], &[(1, 3)][..]] {
        let err = harness
            .refunds()
            .create_refund(ORDER_ID, memo(items), RefundMode::Online)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    let err = harness
        .refunds()
        .create_refund(ORDER_ID, memo(&[(9, 1)]), RefundMode::Online)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::NotFound(_)));

    assert!(harness.gateway.calls().await.is_empty());
    assert_eq!(harness.order().await, before);
}
