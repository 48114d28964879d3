//! newsfeed-ingest entry point.
//!
//! Starts the ops HTTP server, then runs the firehose subscription until the
//! stream fails fatally or the process receives Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use newsfeed_ingest::api;
use newsfeed_ingest::app_state::AppState;
use newsfeed_ingest::config::IngestConfig;
use newsfeed_ingest::domain::IngestStatus;
use newsfeed_ingest::error::IngestError;
use newsfeed_ingest::firehose::FirehoseStream;
use newsfeed_ingest::lists::XrpcClient;
use newsfeed_ingest::persistence::{
    CursorStore, IngestWriter, MemoryPersistence, PostgresPersistence, RetentionStore,
};
use newsfeed_ingest::service::{FirehoseSubscription, SubscriptionSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = IngestConfig::from_env()?;

    // Initialize tracing
    init_tracing(config.log_json);
    tracing::info!(?config, "starting newsfeed-ingest");

    // Start ops server
    let status = Arc::new(IngestStatus::new());
    let app = api::build_router(AppState::new(Arc::clone(&status)));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "ops server listening");
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "ops server failed");
        }
    });

    // Run the pipeline
    let result = if config.persistence_enabled {
        let store = PostgresPersistence::connect(&config).await?;
        run_until_shutdown(Arc::new(store), &config, status).await
    } else {
        tracing::warn!("persistence disabled, rows are kept in memory only");
        run_until_shutdown(Arc::new(MemoryPersistence::new()), &config, status).await
    };

    server.abort();
    result?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_until_shutdown<S>(
    store: Arc<S>,
    config: &IngestConfig,
    status: Arc<IngestStatus>,
) -> Result<(), IngestError>
where
    S: IngestWriter + CursorStore + RetentionStore,
{
    let lists = XrpcClient::new(
        &config.atproto_service,
        &config.atproto_identifier,
        &config.atproto_password,
    )?;
    let source = FirehoseStream::new(
        &config.subscription_endpoint,
        Duration::from_millis(config.reconnect_delay_ms),
    );
    let mut subscription = FirehoseSubscription::new(
        store,
        lists,
        source,
        config.lists.clone(),
        SubscriptionSettings::from_config(config),
        status,
    );

    tokio::select! {
        result = subscription.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    }
}
