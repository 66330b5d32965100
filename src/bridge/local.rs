//! In-process bridge wiring.
//!
//! [`LocalFrameFactory`] creates frames whose message port delivers straight
//! into a [`VendorBridgeEndpoint`] on a spawned task, with replies coming
//! back over an `mpsc` channel that the transport listens on. Origins are
//! stamped exactly as a browser would stamp them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BridgeError, BridgeFrame, BridgeTransport, FrameFactory, VendorBridgeEndpoint, VendorSdk};
use crate::config::BridgeConfig;
use crate::model::{ChannelMessage, MessageKind};

struct LocalFrame {
    endpoint: Arc<VendorBridgeEndpoint>,
    host_origin: String,
    host_sender: mpsc::UnboundedSender<ChannelMessage>,
}

impl BridgeFrame for LocalFrame {
    fn post_message(
        &self,
        data: serde_json::Value,
        target_origin: &str,
    ) -> Result<(), BridgeError> {
        if target_origin != self.endpoint.origin() {
            return Err(BridgeError::FramePost(format!(
                "target origin {} does not match frame origin {}",
                target_origin,
                self.endpoint.origin()
            )));
        }

        let message = ChannelMessage {
            kind: MessageKind::Message,
            origin: self.host_origin.clone(),
            data,
        };
        let endpoint = Arc::clone(&self.endpoint);
        let host_sender = self.host_sender.clone();
        tokio::spawn(async move {
            if let Some(reply) = endpoint.handle_message(message).await {
                // The host may already be gone; nothing left to notify then.
                let _ = host_sender.send(reply);
            }
        });
        Ok(())
    }
}

/// Creates frames backed by an in-process [`VendorBridgeEndpoint`]
pub struct LocalFrameFactory {
    endpoint: Arc<VendorBridgeEndpoint>,
    host_origin: String,
    host_sender: mpsc::UnboundedSender<ChannelMessage>,
    created: AtomicUsize,
}

impl LocalFrameFactory {
    pub fn new(
        endpoint: Arc<VendorBridgeEndpoint>,
        host_origin: String,
        host_sender: mpsc::UnboundedSender<ChannelMessage>,
    ) -> Self {
        Self {
            endpoint,
            host_origin,
            host_sender,
            created: AtomicUsize::new(0),
        }
    }

    /// How many frames this factory has created
    pub fn frames_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameFactory for LocalFrameFactory {
    async fn create_frame(&self, bridge_origin: &str) -> Result<Arc<dyn BridgeFrame>, BridgeError> {
        if bridge_origin != self.endpoint.origin() {
            return Err(BridgeError::Unavailable(format!(
                "no bridge is served at {}",
                bridge_origin
            )));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Local bridge frame created for {}", bridge_origin);
        Ok(Arc::new(LocalFrame {
            endpoint: Arc::clone(&self.endpoint),
            host_origin: self.host_origin.clone(),
            host_sender: self.host_sender.clone(),
        }))
    }
}

/// A transport connected to an in-process endpoint.
pub struct LocalBridge {
    pub transport: Arc<BridgeTransport>,
    pub factory: Arc<LocalFrameFactory>,
}

impl LocalBridge {
    /// Wires `sdk` behind an endpoint at `config.bridge_origin` that accepts
    /// commands from `config.host_origin`. Must be called within a tokio runtime.
    pub fn connect(config: BridgeConfig, sdk: Arc<dyn VendorSdk>) -> Self {
        let endpoint = Arc::new(VendorBridgeEndpoint::new(
            sdk,
            config.bridge_origin.clone(),
            vec![config.host_origin.clone()],
        ));
        Self::connect_endpoint(config, endpoint)
    }

    /// Like [`Self::connect`] with a pre-built endpoint, e.g. one that only
    /// trusts some other owner.
    pub fn connect_endpoint(config: BridgeConfig, endpoint: Arc<VendorBridgeEndpoint>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let factory = Arc::new(LocalFrameFactory::new(
            endpoint,
            config.host_origin.clone(),
            sender,
        ));
        let transport = Arc::new(BridgeTransport::new(config, factory.clone()));
        transport.listen(receiver);
        Self { transport, factory }
    }
}
