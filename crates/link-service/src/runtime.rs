//! # Link Runtime
//!
//! Wires the service together:
//!
//! ```text
//! EventBus ──► BridgeHandle ──► ActionClient ──► HTTP router
//!    ▲              │
//!    └── events ────┘
//! ```
//!
//! The runtime owns the bridge; shutting it down closes the gateway link
//! and fails any call still in flight.

use crate::captcha::CaptchaVerifier;
use crate::config::ServiceConfig;
use crate::routes::{self, AppState};
use crate::store::UserStore;
use axum::Router;
use onebot_bridge::{ActionClient, BridgeHandle, Connector};
use shared_bus::{BusEvent, Channel, EventBus, ListenerHandle};
use shared_types::GatewayEvent;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct LinkRuntime {
    config: ServiceConfig,
    bus: EventBus,
    bridge: BridgeHandle,
    state: AppState,
    listeners: Vec<ListenerHandle>,
}

impl LinkRuntime {
    /// Start the gateway bridge and prepare the HTTP state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: ServiceConfig,
        connector: Arc<dyn Connector>,
        store: Arc<dyn UserStore>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> Self {
        let bus = EventBus::new();
        let bridge = BridgeHandle::start(config.bridge_config(), connector, bus.clone());
        let listeners = subscribe_gateway_logging(&bus);

        let state = AppState {
            store,
            captcha,
            actions: ActionClient::new(bridge.clone()),
            binding: config.binding.clone(),
        };

        info!(gateway = %config.onebot.ws_url, "Link runtime started");
        Self {
            config,
            bus,
            bridge,
            state,
            listeners,
        }
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    pub fn actions(&self) -> &ActionClient {
        &self.state.actions
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve HTTP on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(%addr, "HTTP server listening");
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }

    /// Stop the bridge and detach the runtime's listeners.
    pub async fn shutdown(self) {
        for handle in &self.listeners {
            self.bus.unsubscribe(handle);
        }
        self.bridge.shutdown().await;
        info!("Link runtime stopped");
    }
}

fn subscribe_gateway_logging(bus: &EventBus) -> Vec<ListenerHandle> {
    let mut handles = Vec::new();

    let link_events = [Channel::LinkEstablished, Channel::LinkLost];
    for channel in link_events {
        let subscribed = bus.subscribe(&channel, |event| {
            match event {
                BusEvent::LinkEstablished { endpoint } => info!(%endpoint, "Gateway online"),
                BusEvent::LinkLost { endpoint, reason } => {
                    warn!(%endpoint, %reason, "Gateway offline")
                }
                _ => {}
            }
            Ok(())
        });
        handles.extend(subscribed.ok());
    }

    let messages = bus.subscribe(&Channel::GroupMessage, |event| {
        if let BusEvent::Gateway(GatewayEvent::GroupMessage(message)) = event {
            info!(
                group_id = message.group_id,
                user_id = message.user_id,
                message_id = message.message_id,
                text = %message.message.plain_text(),
                "Group message"
            );
        }
        Ok(())
    });
    handles.extend(messages.ok());

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::{CaptchaError, CaptchaOutcome};
    use crate::store::InMemoryUserStore;
    use async_trait::async_trait;
    use onebot_bridge::{ConnectionState, MemoryConnector};
    use std::net::IpAddr;
    use std::time::Duration;
    use tokio::time::timeout;

    struct NoCaptcha;

    #[async_trait]
    impl CaptchaVerifier for NoCaptcha {
        async fn verify(&self, _: &str, _: Option<IpAddr>) -> Result<CaptchaOutcome, CaptchaError> {
            Ok(CaptchaOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_runtime_connects_and_shuts_down() {
        let (connector, mut gateway) = MemoryConnector::pair();
        let runtime = LinkRuntime::start(
            ServiceConfig::default(),
            Arc::new(connector),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(NoCaptcha),
        );

        let _peer = timeout(Duration::from_secs(2), gateway.accept())
            .await
            .unwrap()
            .unwrap();
        timeout(Duration::from_secs(2), runtime.bridge().wait_until_open())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runtime.bus().listener_count(&Channel::GroupMessage), Some(1));
        assert_eq!(runtime.bus().listener_count(&Channel::LinkLost), Some(1));

        let bridge = runtime.bridge().clone();
        runtime.shutdown().await;
        assert_eq!(bridge.state(), ConnectionState::Closed);
        assert_eq!(bridge.bus().listener_count(&Channel::GroupMessage), Some(0));
    }
}
