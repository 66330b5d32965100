use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{
    BridgeCommand, BridgeRequest, BridgeResponse, ChannelMessage, DeviceFailure, DeviceSignature,
    GetAccountsResponse, MessageKind, PublicKeyEntry, ResponsePayload, SignResponse,
    TransactionSignRequest, UnlockResponse,
};

/// Error raised by a vendor SDK call inside the bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SdkError {
    pub message: String,
    /// Vendor-specific numeric code, kept for support diagnostics
    pub code: Option<String>,
}

impl SdkError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code<S: Into<String>, C: Into<String>>(message: S, code: C) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// The vendor library as seen from inside the sandboxed bridge.
///
/// Each method corresponds to one bridge command.
#[async_trait]
pub trait VendorSdk: Send + Sync {
    /// Initializes the SDK session
    async fn init(&self) -> Result<(), SdkError>;

    /// Returns the public key for each requested derivation path
    async fn get_public_keys(&self, paths: &[String]) -> Result<Vec<PublicKeyEntry>, SdkError>;

    /// Signs a transaction on the device
    async fn sign_transaction(
        &self,
        path: &str,
        request: &TransactionSignRequest,
    ) -> Result<DeviceSignature, SdkError>;

    /// Signs a personal message on the device
    async fn sign_message(&self, path: &str, message: &str) -> Result<DeviceSignature, SdkError>;
}

/// Sandbox side of the bridge: turns generic commands into SDK calls.
pub struct VendorBridgeEndpoint {
    sdk: Arc<dyn VendorSdk>,
    origin: String,
    allowed_owners: Vec<String>,
}

impl VendorBridgeEndpoint {
    /// `origin` is the endpoint's own origin; `allowed_owners` lists the host
    /// origins permitted to issue device commands.
    pub fn new<S: Into<String>>(
        sdk: Arc<dyn VendorSdk>,
        origin: S,
        allowed_owners: Vec<String>,
    ) -> Self {
        Self {
            sdk,
            origin: origin.into(),
            allowed_owners,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Handles one inbound message and returns the reply to post back, if any.
    ///
    /// The message is dropped unless it is a regular message event, parses as
    /// a command, was sent from the origin it claims as `owner`, and that
    /// owner is allowed.
    pub async fn handle_message(&self, message: ChannelMessage) -> Option<ChannelMessage> {
        if message.kind != MessageKind::Message {
            return None;
        }

        let command: BridgeCommand = match serde_json::from_value(message.data) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Bridge endpoint dropped unparseable message: {}", e);
                return None;
            }
        };

        if command.owner != message.origin {
            tracing::warn!(
                "Bridge endpoint dropped command {}: sender origin {} does not match owner {}",
                command.id,
                message.origin,
                command.owner
            );
            return None;
        }
        if !self.allowed_owners.iter().any(|owner| owner == &command.owner) {
            tracing::warn!(
                "Bridge endpoint dropped command {} from disallowed owner {}",
                command.id,
                command.owner
            );
            return None;
        }

        let payload = self.dispatch(command.request).await;
        let response = BridgeResponse {
            id: command.id,
            payload,
        };

        match ChannelMessage::message(&self.origin, &response) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::error!("Bridge endpoint failed to encode response: {}", e);
                None
            }
        }
    }

    /// Invokes the SDK for `request`. SDK errors become failure payloads.
    pub async fn dispatch(&self, request: BridgeRequest) -> ResponsePayload {
        match request {
            BridgeRequest::Unlock => {
                let response = match self.sdk.init().await {
                    Ok(()) => UnlockResponse {
                        result: true,
                        error: None,
                    },
                    Err(e) => UnlockResponse {
                        result: false,
                        error: Some(e.message),
                    },
                };
                ResponsePayload::Unlock(response)
            }
            BridgeRequest::GetAccounts { paths } => {
                let response = match self.sdk.get_public_keys(&paths).await {
                    Ok(accounts) => GetAccountsResponse {
                        success: true,
                        accounts,
                        error: None,
                    },
                    Err(e) => GetAccountsResponse {
                        success: false,
                        accounts: Vec::new(),
                        error: Some(e.message),
                    },
                };
                ResponsePayload::GetAccounts(response)
            }
            BridgeRequest::SignTransaction { path, transaction } => ResponsePayload::SignTransaction(
                sign_response(self.sdk.sign_transaction(&path, &transaction).await),
            ),
            BridgeRequest::SignMessage { path, message } => ResponsePayload::SignMessage(
                sign_response(self.sdk.sign_message(&path, &message).await),
            ),
        }
    }
}

fn sign_response(result: Result<DeviceSignature, SdkError>) -> SignResponse {
    match result {
        Ok(signature) => SignResponse {
            success: true,
            payload: Some(signature),
            error: None,
        },
        Err(e) => SignResponse {
            success: false,
            payload: None,
            error: Some(DeviceFailure {
                error: e.message,
                code: e.code,
            }),
        },
    }
}
