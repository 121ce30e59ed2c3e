//! Event types for the asincheck event system
//!
//! Provides shared event definitions and the EventBus every component talks
//! through. Emitters and listeners each hold a clone of the same bus handle.

mod batch_types;

pub use batch_types::{NoticeLevel, ProgressCounters};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::{CheckResult, UsageReport, UserProfile};

/// asincheck event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AsincheckEvent {
    /// Authenticated identity changed (login, logout, user switch)
    ///
    /// Triggers:
    /// - Subscription state: refresh (or clear on logout)
    SessionChanged {
        /// New user, `None` after logout
        user: Option<UserProfile>,
        timestamp: DateTime<Utc>,
    },

    /// Someone learned a new usage number and wants every surface to show it
    ///
    /// Triggers:
    /// - Subscription state: optimistic update of `usage.current`
    UsageUpdated {
        current: i64,
        limit: Option<i64>,
        timestamp: DateTime<Utc>,
    },

    /// Subscription state applied a usage change (optimistic or authoritative)
    ///
    /// Triggers:
    /// - Header/status displays
    UsageChanged {
        current: i64,
        limit: i64,
        percentage: f64,
        /// True until the next successful refresh confirms the number
        pending_reconciliation: bool,
        timestamp: DateTime<Utc>,
    },

    /// Subscription snapshot replaced from the backend
    SubscriptionRefreshed {
        plan_code: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Batch accepted and about to issue its first request
    BatchStarted {
        batch_id: Uuid,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One ASIN returned a result (already prepended to the result list)
    AsinChecked {
        batch_id: Uuid,
        result: CheckResult,
        timestamp: DateTime<Utc>,
    },

    /// Counters after each per-ASIN outcome
    BatchProgress {
        batch_id: Uuid,
        progress: ProgressCounters,
        timestamp: DateTime<Utc>,
    },

    /// Batch loop finished (possibly cancelled part way)
    ///
    /// Triggers:
    /// - Subscription state: optimistic usage bump by `processed`, or to
    ///   `reported_usage.current` when the backend reported one
    BatchCompleted {
        batch_id: Uuid,
        processed: usize,
        cancelled: bool,
        /// Last usage block returned by the backend during the batch
        reported_usage: Option<UsageReport>,
        timestamp: DateTime<Utc>,
    },

    /// Batch failed before the first request; no progress is retained
    BatchAborted {
        batch_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// User-facing notice (toast)
    Notice {
        level: NoticeLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl AsincheckEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            AsincheckEvent::SessionChanged { .. } => "SessionChanged",
            AsincheckEvent::UsageUpdated { .. } => "UsageUpdated",
            AsincheckEvent::UsageChanged { .. } => "UsageChanged",
            AsincheckEvent::SubscriptionRefreshed { .. } => "SubscriptionRefreshed",
            AsincheckEvent::BatchStarted { .. } => "BatchStarted",
            AsincheckEvent::AsinChecked { .. } => "AsinChecked",
            AsincheckEvent::BatchProgress { .. } => "BatchProgress",
            AsincheckEvent::BatchCompleted { .. } => "BatchCompleted",
            AsincheckEvent::BatchAborted { .. } => "BatchAborted",
            AsincheckEvent::Notice { .. } => "Notice",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use asincheck_common::events::{AsincheckEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(AsincheckEvent::UsageUpdated {
///     current: 42,
///     limit: Some(500),
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.event_type(), "UsageUpdated");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AsincheckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped for that subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AsincheckEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AsincheckEvent,
    ) -> Result<usize, broadcast::error::SendError<AsincheckEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AsincheckEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit a user-facing notice
    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit_lossy(AsincheckEvent::Notice {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(AsincheckEvent::UsageUpdated {
            current: 1,
            limit: None,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.notice(NoticeLevel::Success, "Processed 2 ASINs");

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().expect("should receive notice") {
                AsincheckEvent::Notice { level, message, .. } => {
                    assert_eq!(level, NoticeLevel::Success);
                    assert_eq!(message, "Processed 2 ASINs");
                }
                other => panic!("unexpected event {}", other.event_type()),
            }
        }
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let mut _rx = bus.subscribe();

        for i in 0..10 {
            bus.emit_lossy(AsincheckEvent::UsageUpdated {
                current: i,
                limit: Some(100),
                timestamp: Utc::now(),
            });
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_batch_completed_serializes_with_type_tag() {
        let event = AsincheckEvent::BatchCompleted {
            batch_id: Uuid::nil(),
            processed: 2,
            cancelled: false,
            reported_usage: Some(UsageReport {
                current: 12,
                limit: Some(100),
            }),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"BatchCompleted\""));
        assert!(json.contains("\"processed\":2"));

        let back: AsincheckEvent = serde_json::from_str(&json).expect("deserialize");
        match back {
            AsincheckEvent::BatchCompleted {
                processed,
                reported_usage,
                ..
            } => {
                assert_eq!(processed, 2);
                assert_eq!(reported_usage.map(|u| u.current), Some(12));
            }
            other => panic!("wrong event {}", other.event_type()),
        }
    }

    #[test]
    fn test_asin_checked_carries_result() {
        let event = AsincheckEvent::AsinChecked {
            batch_id: Uuid::new_v4(),
            result: CheckResult {
                asin: "B0C31QBVQ1".to_string(),
                detailed_status: Some("Eligible".to_string()),
                ..Default::default()
            },
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "AsinChecked");
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"detailedStatus\":\"Eligible\""));
    }
}
