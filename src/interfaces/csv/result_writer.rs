use crate::application::reconcile::{ReconciliationResult, TriggerKind};
use crate::domain::order::OrderId;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ResultRow<'a> {
    order_id: OrderId,
    r#type: TriggerKind,
    status: &'a str,
    success: bool,
}

/// Writes reconciliation outcomes as CSV, one row per processed event.
pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_result(&mut self, result: &ReconciliationResult) -> Result<()> {
        self.writer.serialize(ResultRow {
            order_id: result.order_id,
            r#type: result.trigger,
            status: &result.status,
            success: result.success,
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
