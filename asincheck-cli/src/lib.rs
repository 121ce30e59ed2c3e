//! asincheck-cli library interface
//!
//! Exposes the gateway client, session store, batch processor, subscription
//! state and result view so the binary and integration tests share them.

pub mod batch;
pub mod cli;
pub mod gateway;
pub mod render;
pub mod results;
pub mod session;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use asincheck_common::config::ClientConfig;
use asincheck_common::events::EventBus;

use crate::batch::BatchProcessor;
use crate::gateway::{GatewayError, HttpGateway};
use crate::session::SessionStore;
use crate::subscription::SubscriptionState;

/// Components wired to one shared event bus
#[derive(Clone)]
pub struct AppContext {
    pub config: ClientConfig,
    pub event_bus: EventBus,
    pub session: Arc<SessionStore>,
    pub gateway: Arc<HttpGateway>,
    pub subscription: Arc<SubscriptionState>,
}

impl AppContext {
    /// Load the session and build the gateway and subscription state
    ///
    /// The subscription listener is not started here; call
    /// [`SubscriptionState::spawn_listener`] when events should be applied.
    pub async fn init(config: ClientConfig) -> Result<Self, GatewayError> {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let session = Arc::new(SessionStore::load(&config.session_file, event_bus.clone()).await?);
        let gateway = Arc::new(HttpGateway::new(&config, Arc::clone(&session))?);
        let subscription = Arc::new(SubscriptionState::new(
            gateway.clone(),
            event_bus.clone(),
            config.refresh_throttle,
        ));
        subscription.set_identity(session.user().await.as_ref()).await;

        Ok(Self {
            config,
            event_bus,
            session,
            gateway,
            subscription,
        })
    }

    pub fn batch_processor(&self) -> BatchProcessor {
        BatchProcessor::new(
            self.gateway.clone(),
            self.event_bus.clone(),
            self.config.request_delay,
        )
    }
}
