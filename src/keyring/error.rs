use thiserror::Error;

use crate::bridge::BridgeError;
use crate::model::SigningErrorKey;

/// Errors returned by keyring operations
///
/// Device SDK failures are caught at the bridge and arrive here as typed
/// variants with the vendor's message preserved for diagnostics.
#[derive(Error, Debug)]
pub enum KeyringError {
    /// The device session could not be established
    ///
    /// Covers SDK initialization failures, the device being locked or
    /// disconnected, and identity derivation failing during unlock.
    #[error("Unable to unlock device: {0}")]
    Unlock(String),

    /// The derivation scheme is not known to this vendor's keyring
    #[error("Unknown derivation scheme: {0}")]
    UnknownScheme(String),

    /// The device rejected or failed the signing request, or the user declined
    #[error("Device signing failed: {message}")]
    SignOnDevice {
        message: String,
        /// Vendor numeric error code, when the device reported one
        code: Option<String>,
    },

    /// The device returned a structurally invalid signature
    #[error("Invalid signature from device: {0}")]
    Validation(String),

    /// The device returned a public key that is not a curve point
    #[error("Invalid public key from device: {0}")]
    InvalidPublicKey(String),

    /// The requested account index range cannot be derived
    #[error("Invalid account range: {0}")]
    AccountRange(String),

    /// Account derivation failed on the device
    #[error("Unable to get accounts: {0}")]
    Accounts(String),

    /// The bridge could not deliver the request or its response
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl KeyringError {
    pub fn sign_on_device<S: Into<String>>(message: S, code: Option<String>) -> Self {
        Self::SignOnDevice {
            message: message.into(),
            code,
        }
    }

    /// True when the sandboxed bridge could not be reached
    pub fn is_bridge_unavailable(&self) -> bool {
        matches!(self, KeyringError::Bridge(e) if e.is_unavailable())
    }

    /// Vendor device code, if the device reported one
    pub fn device_code(&self) -> Option<&str> {
        match self {
            KeyringError::SignOnDevice { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// The localizable key a UI should show for this error
    pub fn error_key(&self) -> SigningErrorKey {
        match self {
            KeyringError::Unlock(_) | KeyringError::Accounts(_) => SigningErrorKey::UnlockError,
            KeyringError::UnknownScheme(_) => SigningErrorKey::UnknownScheme,
            KeyringError::SignOnDevice { .. } => SigningErrorKey::SignOnDeviceError,
            KeyringError::Validation(_)
            | KeyringError::InvalidPublicKey(_)
            | KeyringError::AccountRange(_) => SigningErrorKey::ValidationError,
            KeyringError::Bridge(e) if e.is_unavailable() => SigningErrorKey::BridgeUnavailable,
            KeyringError::Bridge(_) => SigningErrorKey::SignOnDeviceError,
        }
    }
}
