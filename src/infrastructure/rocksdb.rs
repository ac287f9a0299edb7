use crate::domain::order::{Invoice, LocalOrder, OrderId};
use crate::domain::ports::OrderStore;
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column Family for order aggregates.
pub const CF_ORDERS: &str = "orders";
/// Column Family for invoices, keyed by order id and invoice id.
pub const CF_INVOICES: &str = "invoices";

/// A persistent order store using RocksDB.
///
/// Orders are stored as JSON. Each save also rewrites the order's invoices into
/// their own column family, in the same write batch as the order.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbOrderStore {
    db: Arc<DB>,
}

impl RocksDbOrderStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_invoices = ColumnFamilyDescriptor::new(CF_INVOICES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_invoices])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ReconcileError::Store(format!("{name} column family not found")))
    }

    /// Writes the order and every one of its invoices in one batch, so the
    /// invoice column family never lags behind the order.
    fn write(&self, order: &LocalOrder, extra: Option<&Invoice>) -> Result<()> {
        let orders = self.cf(CF_ORDERS)?;
        let invoices = self.cf(CF_INVOICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(orders, order.id.to_be_bytes(), serde_json::to_vec(order)?);
        let extra = extra.filter(|invoice| order.invoice(invoice.id).is_none());
        for invoice in order.invoices.iter().chain(extra) {
            batch.put_cf(
                invoices,
                invoice_key(order.id, invoice.id),
                serde_json::to_vec(invoice)?,
            );
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Reads an invoice as last saved with its order.
    pub fn invoice(&self, order_id: OrderId, invoice_id: u32) -> Result<Option<Invoice>> {
        let cf = self.cf(CF_INVOICES)?;
        match self.db.get_cf(cf, invoice_key(order_id, invoice_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn invoice_key(order_id: OrderId, invoice_id: u32) -> Vec<u8> {
    let mut key = order_id.to_be_bytes().to_vec();
    key.extend_from_slice(&invoice_id.to_be_bytes());
    key
}

#[async_trait]
impl OrderStore for RocksDbOrderStore {
    async fn get(&self, id: OrderId) -> Result<Option<LocalOrder>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, order: &LocalOrder) -> Result<()> {
        self.write(order, None)
    }

    async fn save_with_invoice(&self, order: &LocalOrder, invoice: &Invoice) -> Result<()> {
        self.write(order, Some(invoice))
    }

    async fn all(&self) -> Result<Vec<LocalOrder>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            orders.push(serde_json::from_slice(&value)?);
        }
        Ok(orders)
    }
}
