//! Scripted vendor SDKs for tests and demos.
//!
//! [`MockVendorSdk`] stands in for the Ledger or Trezor library inside the
//! bridge. Public keys are derived deterministically from a seed and the
//! requested path, so the same "device" always yields the same accounts.
//! Signatures mimic each vendor's wire quirks.

#![allow(clippy::missing_panics_doc)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::bridge::{SdkError, VendorSdk};
use crate::model::{DeviceSignature, PublicKeyEntry, SignatureV, TransactionSignRequest, VendorTag};

pub const MOCK_R: &str = "9b4d6d5ea0ab3a1f3f7d0c4f8a3e5b2c1d0e9f8a7b6c5d4e3f2a1b0c9d8e7f6a";
pub const MOCK_S: &str = "1f2e3d4c5b6a79880716253443526170f1e2d3c4b5a69788796a5b4c3d2e1f00";

#[derive(Debug, Clone)]
pub struct MockVendorSdk {
    vendor: VendorTag,
    seed: String,
    init_error: Option<String>,
    accounts_error: Option<String>,
    sign_error: Option<SdkError>,
    transaction_signature: DeviceSignature,
    message_signature: DeviceSignature,
    hang_on_sign: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockVendorSdk {
    /// A Ledger-like SDK: raw integer `v`, bare hex `r`/`s`, messages signed
    /// with `v` in 27/28
    pub fn ledger() -> Self {
        Self {
            vendor: VendorTag::Ledger,
            seed: "ledger-device".to_string(),
            init_error: None,
            accounts_error: None,
            sign_error: None,
            transaction_signature: DeviceSignature {
                v: SignatureV::Raw(37),
                r: MOCK_R.to_string(),
                s: MOCK_S.to_string(),
            },
            message_signature: DeviceSignature {
                v: SignatureV::Raw(28),
                r: MOCK_R.to_string(),
                s: MOCK_S.to_string(),
            },
            hang_on_sign: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A Trezor-like SDK: `0x` hex `v`, `0x` prefixed `r`/`s`, message `v`
    /// already biased to 0/1
    pub fn trezor() -> Self {
        Self {
            vendor: VendorTag::Trezor,
            seed: "trezor-device".to_string(),
            transaction_signature: DeviceSignature {
                v: SignatureV::Hex("0x25".to_string()),
                r: format!("0x{MOCK_R}"),
                s: format!("0x{MOCK_S}"),
            },
            message_signature: DeviceSignature {
                v: SignatureV::Hex("0x1".to_string()),
                r: format!("0x{MOCK_R}"),
                s: format!("0x{MOCK_S}"),
            },
            ..Self::ledger()
        }
    }

    /// Different seeds behave as different physical devices
    pub fn with_seed<S: Into<String>>(mut self, seed: S) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_init_error<S: Into<String>>(mut self, message: S) -> Self {
        self.init_error = Some(message.into());
        self
    }

    pub fn with_accounts_error<S: Into<String>>(mut self, message: S) -> Self {
        self.accounts_error = Some(message.into());
        self
    }

    pub fn with_sign_error(mut self, error: SdkError) -> Self {
        self.sign_error = Some(error);
        self
    }

    pub fn with_transaction_signature(mut self, signature: DeviceSignature) -> Self {
        self.transaction_signature = signature;
        self
    }

    pub fn with_message_signature(mut self, signature: DeviceSignature) -> Self {
        self.message_signature = signature;
        self
    }

    /// Signing calls never complete, like a prompt the user ignores
    pub fn hanging(mut self) -> Self {
        self.hang_on_sign = true;
        self
    }

    pub fn vendor(&self) -> VendorTag {
        self.vendor
    }

    /// Shared handle on the recorded call log
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Hex encoded public key the mock device reports for `path`
    pub fn public_key_for_path(&self, path: &str) -> String {
        let digest = Sha256::digest(format!("{}/{}", self.seed, path).as_bytes());
        let secret = SecretKey::from_slice(&digest).unwrap();
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        match self.vendor {
            VendorTag::Ledger => hex::encode(public.serialize_uncompressed()),
            VendorTag::Trezor => hex::encode(public.serialize()),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn finish_sign(&self, signature: &DeviceSignature) -> Result<DeviceSignature, SdkError> {
        if self.hang_on_sign {
            std::future::pending::<()>().await;
        }
        match &self.sign_error {
            Some(error) => Err(error.clone()),
            None => Ok(signature.clone()),
        }
    }
}

#[async_trait]
impl VendorSdk for MockVendorSdk {
    async fn init(&self) -> Result<(), SdkError> {
        self.record("init".to_string());
        match &self.init_error {
            Some(message) => Err(SdkError::new(message.clone())),
            None => Ok(()),
        }
    }

    async fn get_public_keys(&self, paths: &[String]) -> Result<Vec<PublicKeyEntry>, SdkError> {
        self.record(format!("get_public_keys:{}", paths.join(",")));
        if let Some(message) = &self.accounts_error {
            return Err(SdkError::new(message.clone()));
        }
        Ok(paths
            .iter()
            .map(|path| PublicKeyEntry {
                public_key: self.public_key_for_path(path),
                serialized_path: path.clone(),
            })
            .collect())
    }

    async fn sign_transaction(
        &self,
        path: &str,
        _request: &TransactionSignRequest,
    ) -> Result<DeviceSignature, SdkError> {
        self.record(format!("sign_transaction:{}", path));
        self.finish_sign(&self.transaction_signature).await
    }

    async fn sign_message(&self, path: &str, _message: &str) -> Result<DeviceSignature, SdkError> {
        self.record(format!("sign_message:{}", path));
        self.finish_sign(&self.message_signature).await
    }
}
