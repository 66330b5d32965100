use std::sync::Arc;

use async_trait::async_trait;

use super::{
    assemble_message_signature, index_range, normalize_transaction_signature, parse_v,
    DerivationScheme, HardwareKeyring, KeyringCore, KeyringError,
};
use crate::bridge::BridgeTransport;
use crate::model::{Account, DeviceId, SignatureVrs, TransactionSignRequest, VendorTag};

/// Keyring for Trezor devices.
///
/// The device identity is established on unlock, or by the first
/// `get_accounts` call which derives it in the same device request. Trezor
/// reports `v` as `0x` hex and already applies the chain bias,
/// and prefixes `r`/`s` with `0x`.
pub struct TrezorKeyring {
    core: KeyringCore,
}

impl TrezorKeyring {
    pub fn new(transport: Arc<BridgeTransport>) -> Self {
        Self {
            core: KeyringCore::new(VendorTag::Trezor, transport),
        }
    }

    fn identity_path() -> String {
        DerivationScheme::TrezorDefault.path_for_index(0)
    }

    /// Caller must hold the device permit.
    ///
    /// `derive_identity` is false only for `get_accounts`, which adds the
    /// identity path to its own request.
    async fn unlock_locked(&self, derive_identity: bool) -> Result<bool, KeyringError> {
        if self.core.is_unlocked().await {
            if derive_identity {
                self.core.ensure_identity(&Self::identity_path()).await?;
            }
            return Ok(true);
        }
        self.core.request_unlock().await?;
        if derive_identity {
            self.core.ensure_identity(&Self::identity_path()).await?;
        }
        self.core.set_unlocked().await;
        tracing::info!("Trezor unlocked");
        Ok(true)
    }
}

#[async_trait]
impl HardwareKeyring for TrezorKeyring {
    fn vendor(&self) -> VendorTag {
        self.core.vendor()
    }

    async fn is_unlocked(&self) -> bool {
        self.core.is_unlocked().await
    }

    async fn unlock(&self) -> Result<bool, KeyringError> {
        let _permit = self.core.permit().await?;
        self.unlock_locked(true).await
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
        let scheme = DerivationScheme::parse(VendorTag::Trezor, scheme)?;

        let _permit = self.core.permit().await?;
        self.unlock_locked(false).await?;

        let paths = (first..=last).map(|i| scheme.path_for_index(i)).collect();
        let accounts = self
            .core
            .accounts_for_paths(paths, &Self::identity_path())
            .await?;
        tracing::debug!("Trezor derived {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn sign_transaction(
        &self,
        path: &str,
        request: &TransactionSignRequest,
    ) -> Result<SignatureVrs, KeyringError> {
        if request.chain_id.is_empty() {
            return Err(KeyringError::Validation(
                "Trezor transactions require a chain id".to_string(),
            ));
        }

        let _permit = self.core.permit().await?;
        self.unlock_locked(true).await?;

        let signature = self.core.request_transaction_signature(path, request).await?;
        let vrs = normalize_transaction_signature(&signature)?;
        tracing::info!("Trezor signed transaction with {}", path);
        Ok(vrs)
    }

    async fn sign_personal_message(
        &self,
        path: &str,
        address: &str,
        message: &[u8],
    ) -> Result<String, KeyringError> {
        let _permit = self.core.permit().await?;
        self.unlock_locked(true).await?;

        let signature = self.core.request_message_signature(path, message).await?;
        let recovery = parse_v(&signature.v)?;
        let signed = assemble_message_signature(&signature.r, &signature.s, recovery)?;
        tracing::info!("Trezor signed personal message for {}", address);
        Ok(signed)
    }

    async fn device_id(&self) -> Option<DeviceId> {
        self.core.device_id().await
    }
}
