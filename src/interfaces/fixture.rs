//! JSON snapshot of local orders and the matching remote orders, used to seed
//! the in-memory adapters for batch replays.

use crate::domain::order::LocalOrder;
use crate::domain::ports::OrderStore;
use crate::domain::remote::RemoteOrder;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryGateway;
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub orders: Vec<LocalOrder>,
    pub remote_orders: Vec<RemoteOrder>,
}

impl Fixture {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Seeds the gateway with every remote order and saves local orders the
    /// store does not know yet.
    pub async fn seed(self, gateway: &InMemoryGateway, store: &dyn OrderStore) -> Result<()> {
        for remote in self.remote_orders {
            gateway.insert_order(remote).await;
        }
        for order in self.orders {
            if store.get(order.id).await?.is_none() {
                store.save(&order).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryOrderStore;

    const FIXTURE: &str = r#"{
        "orders": [{
            "id": 1,
            "increment_id": "100000001",
            "state": "new",
            "status": "pending",
            "grand_total": {"value": "10.00", "currency": "EUR"},
            "base_grand_total": {"value": "10.00", "currency": "EUR"},
            "remote_transaction_id": "ord_1"
        }],
        "remote_orders": [{
            "id": "ord_1",
            "status": "paid",
            "amount": {"value": "10.00", "currency": "EUR"}
        }]
    }"#;

    #[tokio::test]
    async fn test_seed_fixture() {
        let fixture = Fixture::from_reader(FIXTURE.as_bytes()).unwrap();
        let gateway = InMemoryGateway::new();
        let store = InMemoryOrderStore::new();

        fixture.seed(&gateway, &store).await.unwrap();

        assert!(gateway.remote_order("ord_1").await.is_some());
        let order = store.get_order(1).await.unwrap();
        assert_eq!(order.remote_transaction_id.as_deref(), Some("ord_1"));
        assert!(!order.payment.is_transaction_closed);
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_orders() {
        let store = InMemoryOrderStore::new();
        let gateway = InMemoryGateway::new();
        Fixture::from_reader(FIXTURE.as_bytes())
            .unwrap()
            .seed(&gateway, &store)
            .await
            .unwrap();

        let mut order = store.get_order(1).await.unwrap();
        order.email_sent = true;
        store.insert(order).await;

        Fixture::from_reader(FIXTURE.as_bytes())
            .unwrap()
            .seed(&gateway, &store)
            .await
            .unwrap();
        assert!(store.get_order(1).await.unwrap().email_sent);
    }
}
