//! Application layer orchestrating the order lifecycle against the provider.
//!
//! `ReconciliationEngine` is the entry point for webhook deliveries and customer
//! returns. The checkout, fulfilment and refund services issue commands to the
//! remote order. All of them receive their collaborators through constructors,
//! including a shared `OrderLocks` that serializes commands per order.

pub mod checkout;
pub mod fulfilment;
pub mod locks;
pub mod reconcile;
pub mod refund;
