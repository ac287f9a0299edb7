mod common;

use common::*;
use order_reconciler::domain::ports::{
    Notifier, OrderStore, PaymentGateway, SharedGateway, SharedNotifier, SharedOrderStore,
};
use order_reconciler::domain::remote::RemoteOrderStatus;
use order_reconciler::infrastructure::in_memory::{
    InMemoryGateway, InMemoryOrderStore, OutboxNotifier,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let store: SharedOrderStore = Arc::new(InMemoryOrderStore::new());
    let gateway = InMemoryGateway::new();
    gateway
        .insert_order(remote_order(RemoteOrderStatus::Paid, eur(dec!(100.00))))
        .await;
    let gateway: SharedGateway = Arc::new(gateway);
    let notifier: SharedNotifier = Arc::new(OutboxNotifier::new());
    let key = settings().default.api_key.unwrap();

    // Verify Send + Sync by spawning tasks
    let store_handle = {
        let store = store.clone();
        tokio::spawn(async move {
            store.save(&local_order()).await.unwrap();
            store.get(ORDER_ID).await.unwrap().unwrap()
        })
    };

    let gateway_handle = tokio::spawn(async move {
        gateway
            .fetch_order(&key, TRANSACTION_ID, false)
            .await
            .unwrap()
    });

    let order = store_handle.await.unwrap();
    assert_eq!(order.increment_id, "100000001");

    let remote = gateway_handle.await.unwrap();
    assert_eq!(remote.status, RemoteOrderStatus::Paid);

    let notify_handle = tokio::spawn(async move { notifier.send_new_order_email(&order).await });
    assert!(notify_handle.await.unwrap().is_ok());
    assert_eq!(store.all().await.unwrap().len(), 1);
}
