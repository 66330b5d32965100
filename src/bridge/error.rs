use thiserror::Error;

/// Failures of the cross-context bridge channel
///
/// None of these describe what the device did; they describe whether the
/// request ever made it to the sandboxed bridge and back.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The sandboxed frame could not be created or never finished loading
    #[error("Bridge frame unavailable: {0}")]
    Unavailable(String),

    /// No response arrived before the per-request deadline
    #[error("Bridge request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The pending entry was dropped without a response
    #[error("Bridge channel closed before a response arrived")]
    ChannelClosed,

    /// The frame refused to accept an outgoing message
    #[error("Failed to post message to bridge frame: {0}")]
    FramePost(String),

    /// Envelope could not be encoded or decoded
    #[error("Bridge envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request with this correlation id is already outstanding
    #[error("Correlation id {0} is already pending")]
    DuplicateCorrelationId(String),

    /// The bridge answered with a payload for a different command
    #[error("Unexpected bridge payload: expected {expected}, got {actual}")]
    UnexpectedPayload {
        expected: &'static str,
        actual: &'static str,
    },
}

impl BridgeError {
    /// True when the bridge itself is unreachable (as opposed to a bad payload)
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            BridgeError::Unavailable(_)
                | BridgeError::Timeout { .. }
                | BridgeError::ChannelClosed
                | BridgeError::FramePost(_)
        )
    }
}
