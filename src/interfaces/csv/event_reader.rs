use crate::application::reconcile::TriggerKind;
use crate::domain::order::OrderId;
use crate::error::{ReconcileError, Result};
use serde::Deserialize;
use std::io::Read;

/// One webhook delivery or customer return to replay.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ReconcileEvent {
    pub order_id: OrderId,
    pub r#type: TriggerKind,
    #[serde(default)]
    pub payment_token: Option<String>,
}

/// Reads reconciliation events from a CSV source.
///
/// Expects the header `order_id, type, payment_token`. Whitespace is trimmed and
/// the token column may be left out.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes events.
    pub fn events(self) -> impl Iterator<Item = Result<ReconcileEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ReconcileError::from))
    }
}
