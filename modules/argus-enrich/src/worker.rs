//! Enrichment worker: claims pending sources, enriches them, and hands the
//! result to the lifecycle manager. Safe to run many of, in-process or
//! across processes — all coordination is the store's claim primitive.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use argus_common::types::{EnrichmentStatus, IngestStage, Source};
use argus_store::Store;

use crate::enricher::Enricher;
use crate::lifecycle::LifecycleManager;

/// Sources claimed per loop iteration.
const CLAIM_BATCH: i64 = 1;

/// Idle sleep when the claim comes back empty.
const IDLE_SLEEP: Duration = Duration::from_secs(10);

/// Backoff after a store error.
const STORE_BACKOFF: Duration = Duration::from_secs(5);

/// Deadline for one claimed batch (enrich + lifecycle).
const BATCH_DEADLINE: Duration = Duration::from_secs(600);

pub struct EnrichmentWorker {
    store: Store,
    enricher: Enricher,
    lifecycle: LifecycleManager,
    stale_after: chrono::Duration,
    worker_id: usize,
}

impl EnrichmentWorker {
    pub fn new(
        store: Store,
        enricher: Enricher,
        lifecycle: LifecycleManager,
        stale_after: chrono::Duration,
        worker_id: usize,
    ) -> Self {
        Self {
            store,
            enricher,
            lifecycle,
            stale_after,
            worker_id,
        }
    }

    /// Run until shutdown. Crashing mid-batch is safe: the claim ages out
    /// and another worker picks the source back up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = self.worker_id, "enrichment worker started");

        loop {
            if *shutdown.borrow() {
                info!(worker = self.worker_id, "enrichment worker stopping");
                return;
            }

            let claimed = match self
                .store
                .claim_for_enrichment(CLAIM_BATCH, self.stale_after)
                .await
            {
                Ok(claimed) => claimed,
                Err(e) => {
                    warn!(worker = self.worker_id, error = %e, "claim failed, backing off");
                    sleep_or_shutdown(STORE_BACKOFF, &mut shutdown).await;
                    continue;
                }
            };

            if claimed.is_empty() {
                sleep_or_shutdown(IDLE_SLEEP, &mut shutdown).await;
                continue;
            }

            for source in claimed {
                let source_id = source.id;
                match tokio::time::timeout(BATCH_DEADLINE, self.process_source(source)).await {
                    Ok(()) => {}
                    Err(_) => {
                        warn!(worker = self.worker_id, %source_id, "batch deadline exceeded");
                        let message = format!(
                            "enrichment timed out after {}s",
                            BATCH_DEADLINE.as_secs()
                        );
                        if let Err(e) = self
                            .store
                            .update_enrichment_status(
                                source_id,
                                EnrichmentStatus::Failed,
                                Some(&message),
                            )
                            .await
                        {
                            error!(%source_id, error = %e, "failed to mark source failed");
                        }
                        self.store
                            .record_ingestion_error(
                                IngestStage::Enrichment,
                                &source_id.to_string(),
                                &message,
                            )
                            .await;
                    }
                }
            }
        }
    }

    /// Enrich one claimed source and run lifecycle. Every failure is
    /// confined to this source; the loop never propagates.
    async fn process_source(&self, source: Source) {
        let enriched = match self.enricher.enrich(&source).await {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "enrichment failed");
                let message = e.to_string();
                if let Err(store_err) = self
                    .store
                    .update_enrichment_status(source.id, EnrichmentStatus::Failed, Some(&message))
                    .await
                {
                    error!(source_id = %source.id, error = %store_err, "failed to record enrichment failure");
                }
                self.store
                    .record_ingestion_error(
                        IngestStage::Enrichment,
                        &source.id.to_string(),
                        &message,
                    )
                    .await;
                return;
            }
        };

        // Release the claim before lifecycle: correlation can be slow, and a
        // source still marked enriching would cross the stale-after boundary
        // and get reclaimed by another worker mid-flight.
        if let Err(e) = self
            .store
            .update_enrichment_status(source.id, EnrichmentStatus::Completed, None)
            .await
        {
            error!(source_id = %source.id, error = %e, "failed to mark source completed");
            return;
        }

        match self.lifecycle.process_event(enriched, &source).await {
            Ok(outcome) => {
                info!(worker = self.worker_id, source_id = %source.id, ?outcome, "source processed");
            }
            Err(e) => {
                // The source stays completed; the failure is logged, not
                // rolled back
                warn!(source_id = %source.id, error = %e, "lifecycle processing failed");
                self.store
                    .record_ingestion_error(
                        IngestStage::Lifecycle,
                        &source.id.to_string(),
                        &e.to_string(),
                    )
                    .await;
            }
        }
    }
}

async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}
