//! Connection supervisor: connect, pump, reconnect.

use super::inbound::{route_frame, Routed};
use super::Shared;
use crate::transport::{Connector, Link};
use shared_bus::{BusEvent, Channel};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Why a pump loop ended.
enum LinkEnd {
    Shutdown,
    Lost(String),
}

pub(crate) struct Supervisor {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    pub(crate) fn new(
        shared: Arc<Shared>,
        connector: Arc<dyn Connector>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared,
            connector,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        let url = self.shared.config().url.clone();
        let delay = self.shared.config().reconnect_delay;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.shared.mark_connecting();
            info!(url = %url, "Connecting to gateway");

            // `changed()` also returns once every handle, and with them the
            // sender, is gone. Both mean stop.
            let attempt = tokio::select! {
                result = self.connector.connect(&url) => result,
                _ = self.shutdown.changed() => break,
            };

            match attempt {
                Ok(link) => {
                    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                    self.shared.mark_open(outbound_tx);
                    info!(url = %url, "Gateway link established");
                    self.publish(
                        &Channel::LinkEstablished,
                        BusEvent::LinkEstablished {
                            endpoint: url.clone(),
                        },
                    );

                    let end = self.pump(link, outbound_rx).await;
                    let rejected = self.shared.mark_closed();
                    let reason = match &end {
                        LinkEnd::Shutdown => "shutdown".to_string(),
                        LinkEnd::Lost(reason) => reason.clone(),
                    };
                    self.publish(
                        &Channel::LinkLost,
                        BusEvent::LinkLost {
                            endpoint: url.clone(),
                            reason: reason.clone(),
                        },
                    );

                    if let LinkEnd::Shutdown = end {
                        break;
                    }
                    warn!(
                        url = %url,
                        reason = %reason,
                        rejected_calls = rejected,
                        "Gateway link lost, reconnecting in {}s",
                        delay.as_secs_f64()
                    );
                }
                Err(e) => {
                    self.shared.mark_closed();
                    warn!(
                        url = %url,
                        error = %e,
                        "Gateway connection failed, retrying in {}s",
                        delay.as_secs_f64()
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        self.shared.mark_closed();
        info!(url = %url, "Gateway bridge stopped");
    }

    /// Move frames between the link and the bridge until either side ends.
    async fn pump(
        &mut self,
        mut link: Box<dyn Link>,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) -> LinkEnd {
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    link.close().await;
                    return LinkEnd::Shutdown;
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        return LinkEnd::Lost("outbound queue closed".into());
                    };
                    if let Err(e) = link.send(frame).await {
                        return LinkEnd::Lost(e.to_string());
                    }
                }
                incoming = link.recv() => match incoming {
                    Some(Ok(text)) => match route_frame(&text, self.shared.pending(), self.shared.bus()) {
                        Routed::Response(id) => debug!(correlation_id = %id, "Gateway response settled call"),
                        Routed::Event(channel) => debug!(channel = %channel, "Gateway event published"),
                        Routed::Ignored | Routed::Malformed => {}
                    },
                    Some(Err(e)) => return LinkEnd::Lost(e.to_string()),
                    None => return LinkEnd::Lost("closed by gateway".into()),
                },
            }
        }
    }

    fn publish(&self, channel: &Channel, event: BusEvent) {
        if let Err(e) = self.shared.bus().publish(channel, event) {
            error!(error = %e, "Failed to publish link event");
        }
    }
}
