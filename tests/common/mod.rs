#![allow(dead_code)]

use order_reconciler::application::checkout::CheckoutService;
use order_reconciler::application::fulfilment::FulfilmentService;
use order_reconciler::application::locks::OrderLocks;
use order_reconciler::application::reconcile::ReconciliationEngine;
use order_reconciler::application::refund::RefundService;
use order_reconciler::config::{ApiKey, Settings};
use order_reconciler::domain::money::{Currency, Money};
use order_reconciler::domain::order::{Address, LocalOrder, OrderLine};
use order_reconciler::domain::remote::{
    Embedded, LineType, OrderMetadata, RemoteOrder, RemoteOrderLine, RemoteOrderStatus,
    RemotePayment, RemotePaymentStatus,
};
use order_reconciler::infrastructure::in_memory::{
    InMemoryGateway, InMemoryOrderStore, OutboxNotifier,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const ORDER_ID: u64 = 1;
pub const TRANSACTION_ID: &str = "ord_pbjz8x";
pub const TOKEN: &str = "Q9xkTg2sLmZ0aPb7";

pub fn money(value: Decimal, currency: &str) -> Money {
    Money::new(value, Currency::new(currency).unwrap())
}

pub fn eur(value: Decimal) -> Money {
    money(value, "EUR")
}

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.default.api_key = Some(ApiKey::new("test_dHar4XY7LxsDOtmnkVtjNVWXLSlXsM"));
    settings
}

fn line(
    item_id: u32,
    line_type: LineType,
    sku: &str,
    qty: u32,
    unit: Decimal,
    remote_id: &str,
) -> OrderLine {
    OrderLine {
        item_id,
        line_type,
        sku: Some(sku.to_string()),
        name: sku.to_string(),
        qty_ordered: qty,
        qty_paid: 0,
        qty_shipped: 0,
        qty_refunded: 0,
        qty_canceled: 0,
        unit_price: eur(unit),
        total_amount: eur(unit * Decimal::from(qty)),
        vat_rate: dec!(21),
        vat_amount: eur(dec!(0)),
        remote_line_id: Some(remote_id.to_string()),
    }
}

/// 2 mugs at 40.00 plus 20.00 shipping, linked to `TRANSACTION_ID`.
pub fn local_order() -> LocalOrder {
    let mut order = LocalOrder::new(ORDER_ID, "100000001", eur(dec!(100.00)));
    order.quote_id = 55;
    order.customer_email = "jan@example.com".to_string();
    order.payment.method = "ideal".to_string();
    order.billing_address = Address {
        firstname: "Jan".to_string(),
        lastname: "Jansen".to_string(),
        street: vec!["Keizersgracht 313".to_string()],
        postcode: "1016 EE".to_string(),
        city: "Amsterdam".to_string(),
        country_id: "NL".to_string(),
        ..Address::default()
    };
    order.shipping_address = Some(order.billing_address.clone());
    order.lines = vec![
        line(1, LineType::Physical, "MUG", 2, dec!(40.00), "odl_1"),
        line(2, LineType::ShippingFee, "shipping", 1, dec!(20.00), "odl_2"),
    ];
    order.remote_transaction_id = Some(TRANSACTION_ID.to_string());
    order
}

pub fn remote_order(status: RemoteOrderStatus, amount: Money) -> RemoteOrder {
    let currency = amount.currency.clone();
    RemoteOrder {
        id: TRANSACTION_ID.to_string(),
        status,
        amount,
        amount_captured: None,
        method: Some("ideal".to_string()),
        lines: vec![
            RemoteOrderLine {
                id: "odl_1".to_string(),
                line_type: LineType::Physical,
                sku: Some("MUG".to_string()),
                name: "MUG".to_string(),
                quantity: 2,
                quantity_shipped: 0,
                quantity_refunded: 0,
                quantity_canceled: 0,
                total_amount: Money::new(dec!(80.00), currency.clone()),
            },
            RemoteOrderLine {
                id: "odl_2".to_string(),
                line_type: LineType::ShippingFee,
                sku: Some("shipping".to_string()),
                name: "shipping".to_string(),
                quantity: 1,
                quantity_shipped: 0,
                quantity_refunded: 0,
                quantity_canceled: 0,
                total_amount: Money::new(dec!(20.00), currency),
            },
        ],
        embedded: None,
        metadata: Some(OrderMetadata {
            order_id: ORDER_ID,
            store_id: 0,
            payment_token: TOKEN.to_string(),
        }),
        checkout_url: None,
        expires_at: None,
    }
}

pub fn with_payments(mut order: RemoteOrder, statuses: &[RemotePaymentStatus]) -> RemoteOrder {
    order.embedded = Some(Embedded {
        payments: statuses
            .iter()
            .enumerate()
            .map(|(i, status)| RemotePayment {
                id: format!("tr_{i}"),
                status: *status,
                checkout_url: None,
            })
            .collect(),
    });
    order
}

/// In-memory collaborators shared by all services under test.
pub struct Harness {
    pub gateway: InMemoryGateway,
    pub store: InMemoryOrderStore,
    pub notifier: OutboxNotifier,
    pub settings: Arc<Settings>,
    pub locks: OrderLocks,
}

impl Harness {
    pub async fn new(order: LocalOrder, remote: Option<RemoteOrder>) -> Self {
        Self::with_settings(order, remote, settings()).await
    }

    pub async fn with_settings(
        order: LocalOrder,
        remote: Option<RemoteOrder>,
        settings: Settings,
    ) -> Self {
        let gateway = InMemoryGateway::new();
        if let Some(remote) = remote {
            gateway.insert_order(remote).await;
        }
        let store = InMemoryOrderStore::new();
        store.insert(order).await;

        Self {
            gateway,
            store,
            notifier: OutboxNotifier::new(),
            settings: Arc::new(settings),
            locks: OrderLocks::new(),
        }
    }

    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(
            Arc::new(self.gateway.clone()),
            Arc::new(self.store.clone()),
            Arc::new(self.notifier.clone()),
            self.settings.clone(),
            self.locks.clone(),
        )
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(
            Arc::new(self.gateway.clone()),
            Arc::new(self.store.clone()),
            self.settings.clone(),
            self.locks.clone(),
        )
    }

    pub fn fulfilment(&self) -> FulfilmentService {
        FulfilmentService::new(
            Arc::new(self.gateway.clone()),
            Arc::new(self.store.clone()),
            Arc::new(self.notifier.clone()),
            self.settings.clone(),
            self.locks.clone(),
        )
    }

    pub fn refunds(&self) -> RefundService {
        RefundService::new(
            Arc::new(self.gateway.clone()),
            Arc::new(self.store.clone()),
            self.settings.clone(),
            self.locks.clone(),
        )
    }

    pub async fn order(&self) -> LocalOrder {
        self.store.get_order(ORDER_ID).await.unwrap()
    }

    pub async fn set_remote(&self, remote: RemoteOrder) {
        self.gateway.insert_order(remote).await;
    }
}
