//! Interface to the browser-side wallet service
//!
//! The signing pipeline reaches the wallet only through [`WalletBackend`].
//! Both the production binding and the test [`crate::mock_backend::MockWalletBackend`]
//! implement this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::model::{MessageToSign, NonceInfo, ProcessSignatureResult, SigningErrorKey};

/// Errors reported by a [`WalletBackend`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend answered but refused the request
    #[error("Wallet backend rejected the request: {0}")]
    Rejected(String),

    /// The backend could not be reached
    #[error("Wallet backend unavailable: {0}")]
    Unavailable(String),
}

/// Wallet service calls needed to sign a hardware transaction
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Nonce assigned to an approved transaction, if any
    async fn get_nonce_for_hardware_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<NonceInfo>, BackendError>;

    /// Canonical bytes the device must sign for `tx_id`
    async fn get_transaction_message_to_sign(
        &self,
        tx_id: &str,
    ) -> Result<Option<MessageToSign>, BackendError>;

    /// Submits the device signature for final transaction assembly.
    ///
    /// `v`, `r` and `s` are `0x` prefixed hex.
    async fn process_hardware_signature(
        &self,
        tx_id: &str,
        v: &str,
        r: &str,
        s: &str,
    ) -> Result<ProcessSignatureResult, BackendError>;

    /// Chain id of the selected network, e.g. `"0x1"`
    async fn get_chain_id(&self) -> Result<String, BackendError>;
}

/// Resolves error keys to user-facing text
pub trait Localizer: Send + Sync {
    fn localize(&self, key: &str) -> String;
}

static ENGLISH: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            SigningErrorKey::UnlockError.as_str(),
            "Unable to unlock the hardware wallet. Make sure it is connected and unlocked.",
        ),
        (
            SigningErrorKey::UnknownScheme.as_str(),
            "This derivation scheme is not supported by the hardware wallet.",
        ),
        (
            SigningErrorKey::ApproveTransactionError.as_str(),
            "The transaction has not been approved yet.",
        ),
        (
            SigningErrorKey::NoMessageToSignError.as_str(),
            "There is nothing to sign for this transaction.",
        ),
        (
            SigningErrorKey::SignOnDeviceError.as_str(),
            "The hardware wallet did not sign the transaction.",
        ),
        (
            SigningErrorKey::ValidationError.as_str(),
            "The hardware wallet returned an invalid signature.",
        ),
        (
            SigningErrorKey::ProcessTransactionError.as_str(),
            "The signed transaction could not be processed.",
        ),
        (
            SigningErrorKey::BridgeUnavailable.as_str(),
            "The hardware wallet bridge is not responding.",
        ),
    ])
});

/// Built-in English strings. Unknown keys are returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishLocalizer;

impl Localizer for EnglishLocalizer {
    fn localize(&self, key: &str) -> String {
        ENGLISH
            .get(key)
            .map_or_else(|| key.to_string(), |text| (*text).to_string())
    }
}
