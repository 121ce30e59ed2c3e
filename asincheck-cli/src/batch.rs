//! Batch ASIN processor
//!
//! Splits user input into ASINs and checks them one at a time against the
//! gateway, prepending each result to the [`ResultSet`] and streaming
//! progress over the event bus. Per-ASIN failures count as errors and never
//! stop the batch; only a failed pre-batch readiness check aborts it.

use std::sync::Arc;
use std::time::Duration;

use asincheck_common::api::UsageReport;
use asincheck_common::events::{AsincheckEvent, EventBus, NoticeLevel, ProgressCounters};
use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gateway::{Gateway, GatewayError};
use crate::results::ResultSet;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No ASINs found in input")]
    EmptyInput,

    #[error("Batch aborted: {0}")]
    Aborted(#[source] GatewayError),
}

/// Split on runs of whitespace and/or commas, dropping empty tokens
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Outcome of a batch that got past the readiness check
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub progress: ProgressCounters,
    pub cancelled: bool,
    /// Last usage block the backend returned during the batch
    pub reported_usage: Option<UsageReport>,
}

pub struct BatchProcessor {
    gateway: Arc<dyn Gateway>,
    event_bus: EventBus,
    request_delay: Duration,
}

impl BatchProcessor {
    pub fn new(gateway: Arc<dyn Gateway>, event_bus: EventBus, request_delay: Duration) -> Self {
        Self {
            gateway,
            event_bus,
            request_delay,
        }
    }

    /// Check every ASIN in `input`, strictly sequentially
    pub async fn run(
        &self,
        input: &str,
        results: &mut ResultSet,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, BatchError> {
        let asins = tokenize(input);
        if asins.is_empty() {
            self.event_bus
                .notice(NoticeLevel::Error, "Please enter at least one ASIN");
            return Err(BatchError::EmptyInput);
        }

        let batch_id = Uuid::new_v4();

        if let Err(e) = self.gateway.ensure_ready().await {
            warn!(batch_id = %batch_id, error = %e, "Batch aborted before first request");
            self.event_bus.emit_lossy(AsincheckEvent::BatchAborted {
                batch_id,
                reason: e.to_string(),
                timestamp: Utc::now(),
            });
            self.event_bus
                .notice(NoticeLevel::Error, format!("Check failed: {}", e));
            return Err(BatchError::Aborted(e));
        }

        let total = asins.len();
        let mut progress = ProgressCounters::new(total);
        let mut reported_usage = None;
        let mut cancelled = false;

        info!(batch_id = %batch_id, total, "Batch started");
        self.event_bus.emit_lossy(AsincheckEvent::BatchStarted {
            batch_id,
            total,
            timestamp: Utc::now(),
        });

        for (index, asin) in asins.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            match self.gateway.check_asins(std::slice::from_ref(asin)).await {
                Ok(response) => {
                    if response.usage.is_some() {
                        reported_usage = response.usage;
                    }
                    match response.results.into_iter().next() {
                        Some(result) => {
                            let class = result.counter_class();
                            debug!(batch_id = %batch_id, asin = %asin, class = %class, "ASIN checked");
                            progress.record(class);
                            results.prepend(result.clone());
                            self.event_bus.emit_lossy(AsincheckEvent::AsinChecked {
                                batch_id,
                                result,
                                timestamp: Utc::now(),
                            });
                        }
                        None => {
                            warn!(batch_id = %batch_id, asin = %asin, "No result returned");
                            progress.record_failure();
                        }
                    }
                }
                Err(e) => {
                    warn!(batch_id = %batch_id, asin = %asin, error = %e, "ASIN check failed");
                    progress.record_failure();
                }
            }

            self.event_bus.emit_lossy(AsincheckEvent::BatchProgress {
                batch_id,
                progress,
                timestamp: Utc::now(),
            });

            if index + 1 < total {
                tokio::select! {
                    _ = tokio::time::sleep(self.request_delay) => {}
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        // Ctrl+C during the final call still counts as a cancel
        if cancel.is_cancelled() {
            cancelled = true;
        }

        info!(
            batch_id = %batch_id,
            processed = progress.processed,
            success = progress.success,
            warning = progress.warning,
            error = progress.error,
            cancelled,
            "Batch finished"
        );

        self.event_bus.emit_lossy(AsincheckEvent::BatchCompleted {
            batch_id,
            processed: progress.processed,
            cancelled,
            reported_usage,
            timestamp: Utc::now(),
        });

        if cancelled {
            self.event_bus.notice(
                NoticeLevel::Warning,
                format!(
                    "Batch cancelled after {} of {} ASINs",
                    progress.processed, total
                ),
            );
        } else {
            self.event_bus.notice(
                NoticeLevel::Success,
                format!("Processed {} ASINs", progress.processed),
            );
        }

        Ok(BatchSummary {
            batch_id,
            progress,
            cancelled,
            reported_usage,
        })
    }
}
