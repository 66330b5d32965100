use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{BridgeError, BridgeFrame, FrameFactory};
use crate::config::BridgeConfig;
use crate::model::{BridgeCommand, BridgeRequest, ChannelMessage, MessageKind, ResponsePayload};

type PendingTable = HashMap<String, oneshot::Sender<Result<ResponsePayload, BridgeError>>>;

/// Host side of the cross-context bridge.
///
/// Owns the sandboxed frame (created lazily, at most once) and the table of
/// pending requests. Responses are matched strictly by correlation id.
pub struct BridgeTransport {
    config: BridgeConfig,
    factory: Arc<dyn FrameFactory>,
    frame: AsyncMutex<Option<Arc<dyn BridgeFrame>>>,
    /// Only one frame creation may be in flight
    frame_creation_semaphore: Semaphore,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for BridgeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeTransport")
            .field("config", &self.config)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

/// Removes its pending entry when dropped, so an abandoned or timed out
/// request never leaves a waiter behind.
struct PendingGuard<'a> {
    transport: &'a BridgeTransport,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.transport.pending_table().remove(&self.id);
    }
}

impl BridgeTransport {
    pub fn new(config: BridgeConfig, factory: Arc<dyn FrameFactory>) -> Self {
        Self {
            config,
            factory,
            frame: AsyncMutex::new(None),
            frame_creation_semaphore: Semaphore::new(1),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending_table().len()
    }

    /// Whether the bridge frame has been created yet
    pub async fn has_frame(&self) -> bool {
        self.frame.lock().await.is_some()
    }

    /// Sends `request` to the bridge and waits for its response
    ///
    /// # Errors
    ///
    /// - `BridgeError::Unavailable` if the frame cannot be created
    /// - `BridgeError::Timeout` if no response arrives within the request deadline
    /// - `BridgeError::FramePost` if the frame rejects the message
    pub async fn send(&self, request: BridgeRequest) -> Result<ResponsePayload, BridgeError> {
        let command = BridgeCommand {
            id: String::new(),
            owner: String::new(),
            request,
        };
        self.send_command(command).await
    }

    /// Sends a pre-built command, keeping its id and owner when already set
    pub async fn send_command(
        &self,
        mut command: BridgeCommand,
    ) -> Result<ResponsePayload, BridgeError> {
        if command.id.is_empty() {
            command.id = self.next_correlation_id();
        }
        if command.owner.is_empty() {
            command.owner = self.config.host_origin.clone();
        }

        let frame = self.frame().await?;
        let data = serde_json::to_value(&command)?;

        // Register before dispatch: a fast response must find its entry.
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending_table();
            if pending.contains_key(&command.id) {
                return Err(BridgeError::DuplicateCorrelationId(command.id));
            }
            pending.insert(command.id.clone(), sender);
        }
        let _guard = PendingGuard {
            transport: self,
            id: command.id.clone(),
        };

        tracing::debug!(
            "Dispatching bridge command {} with id {}",
            command.request.command_name(),
            command.id
        );
        frame.post_message(data, &self.config.bridge_origin)?;

        match timeout(self.config.request_timeout(), receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::ChannelClosed),
            Err(_) => {
                tracing::warn!(
                    "Bridge command {} with id {} timed out after {}ms",
                    command.request.command_name(),
                    command.id,
                    self.config.request_timeout_ms
                );
                Err(BridgeError::Timeout {
                    timeout_ms: self.config.request_timeout_ms,
                })
            }
        }
    }

    /// Feeds one inbound channel message to the transport.
    ///
    /// Messages of the wrong type, from another origin or for an unknown id
    /// are dropped silently. Returns `true` if a pending request was resolved.
    pub fn handle_message(&self, message: ChannelMessage) -> bool {
        if message.kind != MessageKind::Message {
            tracing::debug!("Ignoring channel event of kind {:?}", message.kind);
            return false;
        }
        if message.origin != self.config.bridge_origin {
            tracing::debug!("Ignoring message from unexpected origin {}", message.origin);
            return false;
        }

        let Some(id) = message.data.get("id").and_then(Value::as_str) else {
            tracing::debug!("Ignoring bridge message without a correlation id");
            return false;
        };

        let Some(sender) = self.pending_table().remove(id) else {
            tracing::debug!("Ignoring bridge message for unknown id {}", id);
            return false;
        };

        let result = serde_json::from_value::<crate::model::BridgeResponse>(message.data)
            .map(|response| response.payload)
            .map_err(BridgeError::from);
        sender.send(result).is_ok()
    }

    /// Drains `receiver` into [`Self::handle_message`] on a background task.
    ///
    /// The task ends when the channel closes or the transport is dropped.
    pub fn listen(
        self: &Arc<Self>,
        mut receiver: mpsc::UnboundedReceiver<ChannelMessage>,
    ) -> JoinHandle<()> {
        let transport: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let Some(transport) = transport.upgrade() else {
                    break;
                };
                transport.handle_message(message);
            }
            tracing::debug!("Bridge listener stopped");
        })
    }

    /// Returns the bridge frame, creating it on first use.
    ///
    /// Concurrent first callers share a single creation.
    async fn frame(&self) -> Result<Arc<dyn BridgeFrame>, BridgeError> {
        // Fast path
        if let Some(frame) = self.frame.lock().await.as_ref() {
            return Ok(Arc::clone(frame));
        }

        let _permit = self
            .frame_creation_semaphore
            .acquire()
            .await
            .map_err(|e| BridgeError::Unavailable(format!("frame creation guard closed: {}", e)))?;

        // Another caller may have finished creating it while we waited
        if let Some(frame) = self.frame.lock().await.as_ref() {
            return Ok(Arc::clone(frame));
        }

        tracing::info!("Creating bridge frame for {}", self.config.bridge_origin);
        let created = timeout(
            self.config.frame_load_timeout(),
            self.factory.create_frame(&self.config.bridge_origin),
        )
        .await;

        let frame = match created {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                tracing::error!("Bridge frame creation failed: {}", e);
                return Err(BridgeError::Unavailable(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    "Bridge frame did not load within {}ms",
                    self.config.frame_load_timeout_ms
                );
                return Err(BridgeError::Unavailable(format!(
                    "frame did not load within {}ms",
                    self.config.frame_load_timeout_ms
                )));
            }
        };

        *self.frame.lock().await = Some(Arc::clone(&frame));
        Ok(frame)
    }

    fn next_correlation_id(&self) -> String {
        use rand::Rng;

        let counter = self.next_id.fetch_add(1, Ordering::Relaxed);
        let nonce: u32 = rand::thread_rng().gen();
        format!("{}-{:08x}", counter, nonce)
    }

    fn pending_table(&self) -> std::sync::MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
