//! # Bridge Module
//!
//! The vendor SDKs run inside a sandboxed frame that the wallet page does
//! not trust, and the page reaches them only through a message channel.
//! This module holds both ends of that channel:
//!
//! - [`transport::BridgeTransport`] lives on the host side. It assigns
//!   correlation ids, keeps one pending entry per outstanding request,
//!   validates every inbound message (event type, sender origin, id) and
//!   enforces a per-request deadline.
//! - [`endpoint::VendorBridgeEndpoint`] lives inside the sandbox. It verifies
//!   the sender origin, invokes the [`endpoint::VendorSdk`] and answers with
//!   a generic response envelope.
//! - [`local`] wires the two together in-process, which is what tests and
//!   native embedders use.
//!
//! ```text
//!   host page                               sandboxed frame
//! ┌──────────────────────┐  BridgeCommand  ┌────────────────────────┐
//! │ BridgeTransport      │ ──────────────▶ │ VendorBridgeEndpoint   │
//! │  pending: id → waiter│                 │  origin check          │
//! │  origin/type/id check│ ◀────────────── │  VendorSdk             │
//! └──────────────────────┘  BridgeResponse └────────────────────────┘
//! ```

pub mod endpoint;
pub mod error;
pub mod local;
pub mod transport;

pub use endpoint::{SdkError, VendorBridgeEndpoint, VendorSdk};
pub use error::BridgeError;
pub use local::{LocalBridge, LocalFrameFactory};
pub use transport::BridgeTransport;

use std::sync::Arc;

use async_trait::async_trait;

/// The host's handle on the sandboxed frame's message port.
pub trait BridgeFrame: Send + Sync {
    /// Posts `data` into the frame. Delivery only happens if the frame's
    /// origin equals `target_origin`.
    fn post_message(&self, data: serde_json::Value, target_origin: &str)
        -> Result<(), BridgeError>;
}

/// Creates the sandboxed frame. Called at most once per successful creation.
#[async_trait]
pub trait FrameFactory: Send + Sync {
    /// Creates the frame for `bridge_origin` and resolves once it has loaded
    async fn create_frame(&self, bridge_origin: &str) -> Result<Arc<dyn BridgeFrame>, BridgeError>;
}
