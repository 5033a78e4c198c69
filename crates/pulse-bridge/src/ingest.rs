//! Upstream event ingestion.
//!
//! One consumer task per process reads all configured upstream streams
//! through the shared consumer group: exactly one node applies a given
//! entry, peers learn about it through the backplane broadcast of the
//! resulting transition. Entries are acknowledged only after the
//! registry mutation is applied, so a crash mid-batch redelivers;
//! at-least-once, made safe by the de-duplication window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use pulse_core::events::log::UpstreamEvent;
use pulse_core::health::HealthState;
use pulse_core::traits::event_log::EventLogConsumer;
use pulse_registry::service::PresenceService;

/// Backoff applied after a failed read before polling again.
const READ_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Consume upstream topics into the registry until shutdown.
pub async fn run_ingest(
    consumer: Arc<dyn EventLogConsumer>,
    service: Arc<PresenceService>,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        let batch = tokio::select! {
            batch = consumer.read_batch() => batch,
            _ = shutdown.changed() => {
                debug!("Ingest consumer stopping");
                return;
            }
        };

        let entries = match batch {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Upstream read failed, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(READ_RETRY_BACKOFF) => continue,
                    _ = shutdown.changed() => return,
                }
            }
        };

        health.record_ingest(Utc::now(), entries.len() as u64);

        for entry in entries {
            match UpstreamEvent::parse(&entry.payload) {
                Ok(event) => {
                    service.apply_upstream(event, &entry.dedup_key()).await;
                }
                Err(e) => {
                    // Malformed messages are logged and skipped; the
                    // consumer loop never dies over one.
                    service.metrics().record_malformed();
                    warn!(
                        stream = %entry.stream,
                        entry_id = %entry.entry_id,
                        error = %e,
                        "Skipping malformed upstream event"
                    );
                }
            }

            // Ack after the mutation (or the skip decision). An ack
            // failure just means redelivery, which the dedup window
            // absorbs.
            if let Err(e) = consumer.ack(&entry.stream, &entry.entry_id).await {
                warn!(
                    stream = %entry.stream,
                    entry_id = %entry.entry_id,
                    error = %e,
                    "Failed to ack upstream entry"
                );
            }
        }
    }
}
