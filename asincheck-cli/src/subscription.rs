//! Usage/subscription state
//!
//! Owns the subscription snapshot (plan, usage, statistics) and billing info
//! for the signed-in user. Refreshes are throttled and never overlap; a batch
//! completion or a `UsageUpdated` event bumps the usage counter optimistically
//! until the next refresh reconciles it with the backend.
//!
//! Every identity change bumps an epoch; a refresh started under an older
//! epoch discards its results, and fetches again when a user is signed in.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asincheck_common::api::{BillingInfo, SubscriptionData, Usage, UserProfile};
use asincheck_common::events::{AsincheckEvent, EventBus};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::gateway::Gateway;

/// In-memory copy of the backend's subscription and billing data
#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
    pub data: Option<SubscriptionData>,
    pub billing: Option<BillingInfo>,
    /// Last refresh failure; prior data is kept alongside it
    pub error: Option<String>,
    /// Set by an optimistic update, cleared by the next successful refresh
    pub pending_reconciliation: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl UsageSnapshot {
    pub fn usage(&self) -> Option<&Usage> {
        self.data.as_ref().map(|d| &d.usage)
    }

    pub fn has_pending_change(&self, plan_code: &str) -> bool {
        self.billing
            .as_ref()
            .and_then(|b| b.pending_change.as_ref())
            .is_some_and(|change| change.target_plan == plan_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Both halves fetched
    Refreshed,
    /// One half failed; the other was applied
    Partial,
    /// Both halves failed; prior data kept
    Failed,
    /// Inside the throttle window, nothing fetched
    Throttled,
    /// Another refresh was already running
    InFlight,
    /// The identity changed mid-fetch and nobody is signed in; results dropped
    Superseded,
    /// A running refresh will fetch again for the new identity
    Queued,
}

/// Clears the in-flight flag when the refresh finishes or is dropped
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct SubscriptionState {
    gateway: Arc<dyn Gateway>,
    event_bus: EventBus,
    throttle: Duration,
    snapshot: RwLock<UsageSnapshot>,
    last_fetch: Mutex<Option<Instant>>,
    refreshing: AtomicBool,
    current_user: Mutex<Option<String>>,
    identity_epoch: AtomicU64,
}

impl SubscriptionState {
    pub fn new(gateway: Arc<dyn Gateway>, event_bus: EventBus, throttle: Duration) -> Self {
        Self {
            gateway,
            event_bus,
            throttle,
            snapshot: RwLock::new(UsageSnapshot::default()),
            last_fetch: Mutex::new(None),
            refreshing: AtomicBool::new(false),
            current_user: Mutex::new(None),
            identity_epoch: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> UsageSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn usage(&self) -> Option<Usage> {
        self.snapshot.read().await.usage().cloned()
    }

    pub async fn has_pending_change(&self, plan_code: &str) -> bool {
        self.snapshot.read().await.has_pending_change(plan_code)
    }

    /// Record the user the snapshot belongs to, without fetching
    pub async fn set_identity(&self, user: Option<&UserProfile>) {
        *self.current_user.lock().await = user.map(|u| u.id.clone());
    }

    /// Throttled refresh
    pub async fn refresh(&self) -> RefreshOutcome {
        if let Some(last) = *self.last_fetch.lock().await {
            if last.elapsed() < self.throttle {
                debug!("Subscription refresh throttled");
                return RefreshOutcome::Throttled;
            }
        }
        self.fetch_and_apply().await
    }

    /// Refresh ignoring the throttle window
    pub async fn force_refresh(&self) -> RefreshOutcome {
        self.fetch_and_apply().await
    }

    async fn fetch_and_apply(&self) -> RefreshOutcome {
        let Some(mut guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("Subscription refresh already in flight");
            return RefreshOutcome::InFlight;
        };

        loop {
            let epoch = self.identity_epoch.load(Ordering::SeqCst);
            let outcome = self.fetch_once(epoch).await;
            drop(guard);

            // Identity moved on while fetching: go again for the new user
            if self.identity_epoch.load(Ordering::SeqCst) == epoch
                || self.current_user.lock().await.is_none()
            {
                return outcome;
            }
            guard = match RefreshGuard::acquire(&self.refreshing) {
                Some(guard) => guard,
                None => return outcome,
            };
            debug!("Identity changed during refresh, fetching again");
        }
    }

    /// One fetch round; results are applied only if `epoch` is still current
    async fn fetch_once(&self, epoch: u64) -> RefreshOutcome {
        let (data, billing) = tokio::join!(
            self.gateway.subscription_data(),
            self.gateway.billing_info()
        );

        let (outcome, applied) = {
            let mut snapshot = self.snapshot.write().await;
            if self.identity_epoch.load(Ordering::SeqCst) != epoch {
                info!("Identity changed during refresh, discarding results");
                return RefreshOutcome::Superseded;
            }

            let outcome = match (&data, &billing) {
                (Ok(_), Ok(_)) => RefreshOutcome::Refreshed,
                (Err(_), Err(_)) => RefreshOutcome::Failed,
                _ => RefreshOutcome::Partial,
            };

            match data {
                Ok(mut fresh) => {
                    if snapshot.pending_reconciliation {
                        let optimistic = snapshot.usage().map(|u| u.current);
                        if optimistic != Some(fresh.usage.current) {
                            info!(
                                optimistic = ?optimistic,
                                server = fresh.usage.current,
                                "Usage diverged from optimistic value, using server count"
                            );
                        }
                        snapshot.pending_reconciliation = false;
                    }
                    fresh.usage.set_current(fresh.usage.current);
                    snapshot.data = Some(fresh);
                }
                Err(ref e) => warn!("Subscription data fetch failed: {}", e),
            }

            match billing {
                Ok(info) => snapshot.billing = Some(info),
                Err(ref e) => warn!("Billing info fetch failed: {}", e),
            }

            if outcome == RefreshOutcome::Failed {
                snapshot.error = Some("Unable to load subscription data".to_string());
            } else {
                snapshot.error = None;
                snapshot.last_refreshed_at = Some(Utc::now());
            }

            *self.last_fetch.lock().await = Some(Instant::now());

            let applied = snapshot.data.as_ref().map(|d| (d.plan.code.clone(), d.usage.clone()));
            (outcome, applied)
        };

        if outcome != RefreshOutcome::Failed {
            if let Some((plan_code, usage)) = applied {
                self.event_bus.emit_lossy(AsincheckEvent::SubscriptionRefreshed {
                    plan_code: Some(plan_code),
                    timestamp: Utc::now(),
                });
                self.emit_usage_changed(&usage, false);
            }
        }

        outcome
    }

    /// Overwrite `usage.current` ahead of the backend; no-op without a snapshot
    pub async fn update_usage_optimistically(&self, new_current: i64) -> Option<Usage> {
        let usage = {
            let mut snapshot = self.snapshot.write().await;
            let data = snapshot.data.as_mut()?;
            data.usage.set_current(new_current);
            let usage = data.usage.clone();
            snapshot.pending_reconciliation = true;
            usage
        };

        debug!(current = usage.current, percentage = usage.percentage, "Usage updated optimistically");
        self.emit_usage_changed(&usage, true);
        Some(usage)
    }

    /// React to login, logout or a user switch
    pub async fn on_identity_changed(&self, user: Option<&UserProfile>) -> Option<RefreshOutcome> {
        let new_id = user.map(|u| u.id.clone());
        {
            let mut current = self.current_user.lock().await;
            if *current == new_id {
                return None;
            }
            *current = new_id.clone();
        }

        {
            // Bumped under the snapshot lock so no in-flight round applies afterwards
            let mut snapshot = self.snapshot.write().await;
            self.identity_epoch.fetch_add(1, Ordering::SeqCst);
            *snapshot = UsageSnapshot::default();
        }
        *self.last_fetch.lock().await = None;

        match new_id {
            None => {
                info!("Signed out, cleared subscription state");
                None
            }
            Some(id) => {
                info!(user_id = %id, "Identity changed, refreshing subscription");
                match self.force_refresh().await {
                    RefreshOutcome::InFlight => Some(RefreshOutcome::Queued),
                    outcome => Some(outcome),
                }
            }
        }
    }

    pub async fn handle_event(&self, event: &AsincheckEvent) {
        match event {
            AsincheckEvent::UsageUpdated { current, .. } => {
                self.update_usage_optimistically(*current).await;
            }
            AsincheckEvent::BatchCompleted {
                processed,
                reported_usage,
                ..
            } => {
                let target = match reported_usage {
                    Some(report) => Some(report.current),
                    None => self
                        .usage()
                        .await
                        .map(|u| u.current + *processed as i64),
                };
                if let Some(current) = target {
                    self.update_usage_optimistically(current).await;
                }
            }
            AsincheckEvent::SessionChanged { user, .. } => {
                self.on_identity_changed(user.as_ref()).await;
            }
            _ => {}
        }
    }

    /// Listen on the event bus for the lifetime of the application
    ///
    /// The receiver is created before spawning so no event emitted after
    /// this call returns is missed.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();
        let state = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => state.handle_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscription listener lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed, subscription listener exiting");
                        break;
                    }
                }
            }
        })
    }

    fn emit_usage_changed(&self, usage: &Usage, pending_reconciliation: bool) {
        self.event_bus.emit_lossy(AsincheckEvent::UsageChanged {
            current: usage.current,
            limit: usage.limit,
            percentage: usage.percentage,
            pending_reconciliation,
            timestamp: Utc::now(),
        });
    }
}
