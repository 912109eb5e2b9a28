//! argus-server: HTTP surface plus the long-running ingestion scheduler and
//! enrichment workers, all wired to one Postgres store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Router};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use argus_common::Config;
use argus_enrich::{
    Correlator, Enricher, EnrichmentWorker, LifecycleManager, LlmCorrelator, LlmEnricher,
};
use argus_ingest::{FeedConnector, IngestScheduler};
use argus_store::Store;

mod rest;
mod rss;

pub struct AppState {
    pub store: Store,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("argus=info,argus_server=info"));

    let json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Argus starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let store = Store::connect(&config.database_url).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ingestion scheduler
    let scheduler = IngestScheduler::new(
        store.clone(),
        FeedConnector::new(),
        Duration::from_secs(config.ingest_tick_secs),
    );
    tokio::spawn(scheduler.run(shutdown_rx.clone()));

    // Enrichment workers
    let llm_timeout = Duration::from_secs(config.llm_timeout_secs);
    let stale_after = chrono::Duration::minutes(config.claim_stale_after_minutes);
    for worker_id in 0..config.worker_count {
        let enricher = Enricher::Llm(LlmEnricher::new(
            Claude::new(&config.anthropic_api_key, &config.enrich_model)
                .with_timeout(llm_timeout),
            config.enrich_system_prompt.clone(),
            llm_timeout,
        ));
        let correlator = Correlator::Llm(LlmCorrelator::new(
            Claude::new(&config.anthropic_api_key, &config.correlate_model)
                .with_timeout(llm_timeout),
            llm_timeout,
        ));
        let lifecycle = LifecycleManager::new(store.clone(), correlator, config.auto_publish);
        let worker =
            EnrichmentWorker::new(store.clone(), enricher, lifecycle, stale_after, worker_id);
        tokio::spawn(worker.run(shutdown_rx.clone()));
    }

    let state = Arc::new(AppState { store });

    let app = Router::new()
        // Health check
        .route("/healthz", get(rest::healthz))
        // Public read surface
        .route("/api/events", get(rest::api_events))
        .route("/api/events/{id}", get(rest::api_event_detail))
        .route("/api/feed.rss", get(rss::api_feed_rss))
        .route("/api/stats", get(rest::api_stats))
        // Admin config seam (auth is handled by an outer layer)
        .route(
            "/api/admin/thresholds",
            get(rest::get_thresholds).put(rest::put_thresholds),
        )
        .route(
            "/api/admin/feeds",
            get(rest::list_feeds).post(rest::add_feed),
        )
        .with_state(state)
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!(%addr, workers = config.worker_count, "Argus listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
