use clap::Parser;
use miette::{IntoDiagnostic, Result};
use order_reconciler::application::locks::OrderLocks;
use order_reconciler::application::reconcile::{
    ReconciliationEngine, ReconciliationResult, Trigger, TriggerKind,
};
use order_reconciler::config::Settings;
use order_reconciler::domain::ports::SharedOrderStore;
use order_reconciler::infrastructure::in_memory::{
    InMemoryGateway, InMemoryOrderStore, InMemorySession, OutboxNotifier,
};
#[cfg(feature = "storage-rocksdb")]
use order_reconciler::infrastructure::rocksdb::RocksDbOrderStore;
use order_reconciler::interfaces::csv::event_reader::{EventReader, ReconcileEvent};
use order_reconciler::interfaces::csv::result_writer::ResultWriter;
use order_reconciler::interfaces::fixture::Fixture;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Replays webhook deliveries and customer returns against a snapshot of
/// local and remote orders.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Events CSV file (order_id, type, payment_token)
    events: PathBuf,

    /// JSON file with local orders and remote order snapshots
    #[arg(long)]
    fixture: PathBuf,

    /// JSON settings file; ORDERS_API_KEY overrides the default store key
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Writes the final state of every order as JSON to this file
    #[arg(long)]
    orders_out: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<SharedOrderStore> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(RocksDbOrderStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryOrderStore::new()))
        }
        None => Ok(Arc::new(InMemoryOrderStore::new())),
    }
}

async fn process(
    engine: &ReconciliationEngine,
    event: &ReconcileEvent,
) -> order_reconciler::error::Result<ReconciliationResult> {
    match event.r#type {
        TriggerKind::Webhook => engine.reconcile(event.order_id, Trigger::Webhook).await,
        TriggerKind::Redirect => {
            // Each customer return arrives with its own browser session.
            let session = InMemorySession::new();
            let result = engine
                .reconcile(
                    event.order_id,
                    Trigger::Redirect {
                        payment_token: event.payment_token.as_deref(),
                        session: &session,
                    },
                )
                .await?;
            if let Some(last) = session.last_order() {
                info!(order_id = last.order_id, quote_id = last.quote_id, "session linked");
            }
            Ok(result)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = Arc::new(Settings::load(cli.config.as_deref()).into_diagnostic()?);
    let store = open_store(cli.db_path)?;

    let gateway = InMemoryGateway::new();
    let fixture = Fixture::from_reader(File::open(&cli.fixture).into_diagnostic()?)
        .into_diagnostic()?;
    fixture
        .seed(&gateway, store.as_ref())
        .await
        .into_diagnostic()?;

    let engine = ReconciliationEngine::new(
        Arc::new(gateway),
        store,
        Arc::new(OutboxNotifier::new()),
        settings,
        OrderLocks::new(),
    );

    let reader = EventReader::new(File::open(cli.events).into_diagnostic()?);
    let stdout = io::stdout();
    let mut writer = ResultWriter::new(stdout.lock());

    for event in reader.events() {
        match event {
            Ok(event) => match process(&engine, &event).await {
                Ok(result) => writer.write_result(&result).into_diagnostic()?,
                Err(e) => error!(order_id = event.order_id, error = %e, "Error processing event"),
            },
            Err(e) => error!(error = %e, "Error reading event"),
        }
    }

    writer.flush().into_diagnostic()?;

    // Collect final state from engine
    if let Some(path) = cli.orders_out {
        let orders = engine.into_results().await.into_diagnostic()?;
        let file = File::create(&path).into_diagnostic()?;
        serde_json::to_writer_pretty(file, &orders).into_diagnostic()?;
        info!(orders = orders.len(), path = %path.display(), "final order state written");
    }
    Ok(())
}
