use std::sync::Arc;

use async_trait::async_trait;

use super::{
    assemble_message_signature, index_range, normalize_transaction_signature, parse_v,
    DerivationScheme, HardwareKeyring, KeyringCore, KeyringError,
};
use crate::bridge::BridgeTransport;
use crate::model::{Account, DeviceId, SignatureVrs, TransactionSignRequest, VendorTag};

/// Offset Ledger adds to the recovery id of personal message signatures
const MESSAGE_V_OFFSET: u64 = 27;

/// Keyring for Ledger devices.
///
/// Unlocking also derives the `ledger-live` index-0 address so the device
/// identity is known before any account is listed.
pub struct LedgerKeyring {
    core: KeyringCore,
}

impl LedgerKeyring {
    pub fn new(transport: Arc<BridgeTransport>) -> Self {
        Self {
            core: KeyringCore::new(VendorTag::Ledger, transport),
        }
    }

    fn identity_path() -> String {
        DerivationScheme::LedgerLive.path_for_index(0)
    }

    /// Caller must hold the device permit
    async fn unlock_locked(&self) -> Result<bool, KeyringError> {
        if self.core.is_unlocked().await {
            return Ok(true);
        }

        self.core.request_unlock().await?;
        self.core.ensure_identity(&Self::identity_path()).await?;
        self.core.set_unlocked().await;

        tracing::info!("Ledger unlocked");
        Ok(true)
    }
}

#[async_trait]
impl HardwareKeyring for LedgerKeyring {
    fn vendor(&self) -> VendorTag {
        self.core.vendor()
    }

    async fn is_unlocked(&self) -> bool {
        self.core.is_unlocked().await
    }

    async fn unlock(&self) -> Result<bool, KeyringError> {
        let _permit = self.core.permit().await?;
        self.unlock_locked().await
    }

    async fn get_accounts(
        &self,
        from: i64,
        to: i64,
        scheme: &str,
    ) -> Result<Vec<Account>, KeyringError> {
        let Some((first, last)) = index_range(from, to)? else {
            return Ok(Vec::new());
        };
        let scheme = DerivationScheme::parse(VendorTag::Ledger, scheme)?;

        let _permit = self.core.permit().await?;
        self.unlock_locked().await?;

        let paths = (first..=last).map(|i| scheme.path_for_index(i)).collect();
        let accounts = self
            .core
            .accounts_for_paths(paths, &Self::identity_path())
            .await?;
        tracing::debug!("Ledger derived {} {} accounts", accounts.len(), scheme);
        Ok(accounts)
    }

    async fn sign_transaction(
        &self,
        path: &str,
        request: &TransactionSignRequest,
    ) -> Result<SignatureVrs, KeyringError> {
        let _permit = self.core.permit().await?;
        self.unlock_locked().await?;

        let signature = self.core.request_transaction_signature(path, request).await?;
        let vrs = normalize_transaction_signature(&signature)?;
        tracing::info!("Ledger signed transaction with {}", path);
        Ok(vrs)
    }

    async fn sign_personal_message(
        &self,
        path: &str,
        address: &str,
        message: &[u8],
    ) -> Result<String, KeyringError> {
        let _permit = self.core.permit().await?;
        self.unlock_locked().await?;

        let signature = self.core.request_message_signature(path, message).await?;
        let v = parse_v(&signature.v)?;
        let recovery = v.checked_sub(MESSAGE_V_OFFSET).ok_or_else(|| {
            KeyringError::Validation(format!("message v must be 27 or 28, got {}", v))
        })?;

        let signed = assemble_message_signature(&signature.r, &signature.s, recovery)?;
        tracing::info!("Ledger signed personal message for {}", address);
        Ok(signed)
    }

    async fn device_id(&self) -> Option<DeviceId> {
        self.core.device_id().await
    }
}
