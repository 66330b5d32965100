//! # Signing Orchestrator
//!
//! Drives one hardware transaction signing attempt through four strictly
//! sequential steps:
//!
//! | Step | Call | Failure |
//! |------|------|---------|
//! | nonce | [`WalletBackend::get_nonce_for_hardware_transaction`] | `ApproveTransactionError` |
//! | message | [`WalletBackend::get_transaction_message_to_sign`] | `NoMessageToSignError` |
//! | device | [`HardwareKeyring::sign_transaction`] | `SignOnDeviceError` |
//! | submit | [`WalletBackend::process_hardware_signature`] | `ProcessTransactionError` |
//!
//! The first failing step ends the attempt. [`SigningOutcome::Success`] is
//! only produced once the backend accepted the signature.

use std::collections::HashMap;
use std::sync::Arc;

use crate::address::strip_hex_prefix;
use crate::backend::{EnglishLocalizer, Localizer, WalletBackend};
use crate::keyring::HardwareKeyring;
use crate::model::{
    SigningErrorKey, SigningOutcome, TransactionInfo, TransactionSignRequest, TxBase, VendorTag,
};

/// Returns `value` with a lowercase `0x` prefix, replacing `0X` if present
pub fn with_hex_prefix(value: &str) -> String {
    format!("0x{}", strip_hex_prefix(value))
}

/// Signs `tx_info` with the account at `path` on `keyring` and submits the
/// signature to `backend`.
///
/// Every error from [`HardwareKeyring::sign_transaction`] reports
/// `SignOnDeviceError`, including unlock and signature validation failures
/// raised inside it. Only bridge unavailability reports `BridgeUnavailable`.
pub async fn sign_hardware_transaction(
    backend: &dyn WalletBackend,
    keyring: &dyn HardwareKeyring,
    path: &str,
    tx_info: &TransactionInfo,
) -> SigningOutcome {
    let tx_id = tx_info.id.as_str();

    let nonce = match backend.get_nonce_for_hardware_transaction(tx_id).await {
        Ok(Some(info)) if !info.nonce.is_empty() => info.nonce,
        Ok(_) => {
            tracing::warn!("No nonce for hardware transaction {}", tx_id);
            return SigningOutcome::failure(SigningErrorKey::ApproveTransactionError);
        }
        Err(e) => {
            tracing::warn!("Failed to get nonce for {}: {}", tx_id, e);
            return SigningOutcome::failure(SigningErrorKey::ApproveTransactionError);
        }
    };
    tracing::debug!("Transaction {} has nonce {}", tx_id, nonce);

    let message = match backend.get_transaction_message_to_sign(tx_id).await {
        Ok(Some(to_sign)) if !to_sign.message.is_empty() => to_sign.message,
        Ok(_) => {
            tracing::warn!("No message to sign for {}", tx_id);
            return SigningOutcome::failure(SigningErrorKey::NoMessageToSignError);
        }
        Err(e) => {
            tracing::warn!("Failed to get message to sign for {}: {}", tx_id, e);
            return SigningOutcome::failure(SigningErrorKey::NoMessageToSignError);
        }
    };

    let chain_id = match backend.get_chain_id().await {
        Ok(chain_id) => chain_id,
        Err(e) => {
            tracing::error!("Failed to get chain id for {}: {}", tx_id, e);
            return SigningOutcome::failure(SigningErrorKey::SignOnDeviceError);
        }
    };

    let request = TransactionSignRequest {
        transaction: TxBase {
            nonce,
            ..tx_info.base.clone()
        },
        chain_id,
        message,
    };

    let signature = match keyring.sign_transaction(path, &request).await {
        Ok(signature) => signature,
        Err(e) => {
            tracing::error!("{} failed to sign {}: {}", keyring.vendor(), tx_id, e);
            let error_key = if e.is_bridge_unavailable() {
                SigningErrorKey::BridgeUnavailable
            } else {
                SigningErrorKey::SignOnDeviceError
            };
            return SigningOutcome::Failure {
                error_key,
                device_code: e.device_code().map(str::to_string),
            };
        }
    };

    let v = format!("0x{:x}", signature.v);
    let r = with_hex_prefix(&signature.r);
    let s = with_hex_prefix(&signature.s);
    match backend.process_hardware_signature(tx_id, &v, &r, &s).await {
        Ok(result) if result.status => {
            tracing::info!("Hardware transaction {} signed", tx_id);
            SigningOutcome::Success
        }
        Ok(_) => {
            tracing::warn!("Backend rejected signature for {}", tx_id);
            SigningOutcome::failure(SigningErrorKey::ProcessTransactionError)
        }
        Err(e) => {
            tracing::warn!("Failed to process signature for {}: {}", tx_id, e);
            SigningOutcome::failure(SigningErrorKey::ProcessTransactionError)
        }
    }
}

/// Owns a backend and one keyring per vendor
pub struct SigningOrchestrator {
    backend: Arc<dyn WalletBackend>,
    keyrings: HashMap<VendorTag, Arc<dyn HardwareKeyring>>,
    localizer: Arc<dyn Localizer>,
}

impl SigningOrchestrator {
    pub fn new(backend: Arc<dyn WalletBackend>) -> Self {
        Self {
            backend,
            keyrings: HashMap::new(),
            localizer: Arc::new(EnglishLocalizer),
        }
    }

    /// Registers `keyring` under its vendor, replacing any previous one
    pub fn with_keyring(mut self, keyring: Arc<dyn HardwareKeyring>) -> Self {
        self.keyrings.insert(keyring.vendor(), keyring);
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn keyring(&self, vendor: VendorTag) -> Option<Arc<dyn HardwareKeyring>> {
        self.keyrings.get(&vendor).cloned()
    }

    /// Runs [`sign_hardware_transaction`] with the keyring for `vendor`.
    /// A vendor without a registered keyring fails with `UnlockError`.
    pub async fn sign_transaction(
        &self,
        vendor: VendorTag,
        path: &str,
        tx_info: &TransactionInfo,
    ) -> SigningOutcome {
        let Some(keyring) = self.keyrings.get(&vendor) else {
            tracing::warn!("No {} keyring registered", vendor);
            return SigningOutcome::failure(SigningErrorKey::UnlockError);
        };
        sign_hardware_transaction(self.backend.as_ref(), keyring.as_ref(), path, tx_info).await
    }

    /// User-facing text for a failed outcome; the device code, if any, is
    /// appended for support diagnostics
    pub fn failure_message(&self, outcome: &SigningOutcome) -> Option<String> {
        match outcome {
            SigningOutcome::Success => None,
            SigningOutcome::Failure {
                error_key,
                device_code,
            } => {
                let text = self.localizer.localize(error_key.as_str());
                Some(match device_code {
                    Some(code) => format!("{} ({})", text, code),
                    None => text,
                })
            }
        }
    }
}
