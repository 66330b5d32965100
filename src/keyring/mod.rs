//! # Keyring Module
//!
//! A keyring owns the session with one vendor's device: whether it is
//! unlocked, which physical device it is talking to, and how generic account
//! and signing operations translate into bridge commands.
//!
//! Both vendors implement [`HardwareKeyring`]. The variant is chosen at
//! construction time through [`create_keyring`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use hw_keyring::bridge::LocalBridge;
//! use hw_keyring::config::BridgeConfig;
//! use hw_keyring::keyring::create_keyring;
//! use hw_keyring::mocks::MockVendorSdk;
//! use hw_keyring::model::VendorTag;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = LocalBridge::connect(BridgeConfig::default(), Arc::new(MockVendorSdk::ledger()));
//! let keyring = create_keyring(VendorTag::Ledger, bridge.transport.clone());
//!
//! let accounts = keyring.get_accounts(0, 4, "ledger-live").await?;
//! println!("first address: {}", accounts[0].address);
//! # Ok(())
//! # }
//! ```
//!
//! Every public device operation on one keyring instance holds the same
//! single-permit semaphore, so device prompts never interleave.

pub mod error;
pub mod ledger;
pub mod scheme;
pub mod trezor;

pub use error::KeyringError;
pub use ledger::LedgerKeyring;
pub use scheme::{index_range, DerivationScheme, MAX_ACCOUNTS_PER_REQUEST, MAX_ACCOUNT_INDEX};
pub use trezor::TrezorKeyring;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::address::{device_id_from_address, public_key_to_address, strip_hex_prefix};
use crate::bridge::{BridgeError, BridgeTransport};
use crate::model::{
    Account, BridgeRequest, DeviceId, DeviceSignature, PublicKeyEntry, ResponsePayload,
    SignResponse, SignatureV, SignatureVrs, TransactionSignRequest, VendorTag,
};

/// Capability set shared by every hardware vendor
#[async_trait]
pub trait HardwareKeyring: Send + Sync {
    /// Vendor tag, constant per implementation
    fn vendor(&self) -> VendorTag;

    async fn is_unlocked(&self) -> bool;

    /// Establishes the device session.
    ///
    /// Idempotent: an unlocked keyring returns `Ok(true)` without contacting
    /// the device.
    async fn unlock(&self) -> Result<bool, KeyringError>;

    /// Derives accounts for the inclusive index range `from..=to`.
    ///
    /// Negative `from` is treated as 0 and an inverted range returns an
    /// empty list without touching the device. An index above
    /// [`MAX_ACCOUNT_INDEX`] or a range wider than
    /// [`MAX_ACCOUNTS_PER_REQUEST`] is rejected with
    /// [`KeyringError::AccountRange`], also before any device traffic.
    async fn get_accounts(
        &self,
        from: i64,
        to: i64,
        scheme: &str,
    ) -> Result<Vec<Account>, KeyringError>;

    /// Signs a transaction, unlocking first if needed
    async fn sign_transaction(
        &self,
        path: &str,
        request: &TransactionSignRequest,
    ) -> Result<SignatureVrs, KeyringError>;

    /// Signs a personal message and returns the `0x{r}{s}{v}` signature
    async fn sign_personal_message(
        &self,
        path: &str,
        address: &str,
        message: &[u8],
    ) -> Result<String, KeyringError>;

    /// Identity of the connected device, once established
    async fn device_id(&self) -> Option<DeviceId>;
}

/// Builds the keyring for `vendor` on top of a shared transport
pub fn create_keyring(vendor: VendorTag, transport: Arc<BridgeTransport>) -> Box<dyn HardwareKeyring> {
    match vendor {
        VendorTag::Ledger => Box::new(LedgerKeyring::new(transport)),
        VendorTag::Trezor => Box::new(TrezorKeyring::new(transport)),
    }
}

#[derive(Debug, Default)]
struct KeyringState {
    unlocked: bool,
    device_id: Option<DeviceId>,
}

/// Session state and bridge plumbing shared by both vendor keyrings
pub(crate) struct KeyringCore {
    vendor: VendorTag,
    transport: Arc<BridgeTransport>,
    state: Mutex<KeyringState>,
    /// One device operation at a time per keyring
    device_permit: Semaphore,
}

impl KeyringCore {
    pub(crate) fn new(vendor: VendorTag, transport: Arc<BridgeTransport>) -> Self {
        Self {
            vendor,
            transport,
            state: Mutex::new(KeyringState::default()),
            device_permit: Semaphore::new(1),
        }
    }

    pub(crate) fn vendor(&self) -> VendorTag {
        self.vendor
    }

    pub(crate) async fn permit(&self) -> Result<SemaphorePermit<'_>, KeyringError> {
        self.device_permit
            .acquire()
            .await
            .map_err(|_| KeyringError::Bridge(BridgeError::ChannelClosed))
    }

    pub(crate) async fn is_unlocked(&self) -> bool {
        self.state.lock().await.unlocked
    }

    pub(crate) async fn set_unlocked(&self) {
        self.state.lock().await.unlocked = true;
    }

    pub(crate) async fn device_id(&self) -> Option<DeviceId> {
        self.state.lock().await.device_id.clone()
    }

    /// Asks the bridge to initialize the vendor SDK session
    pub(crate) async fn request_unlock(&self) -> Result<(), KeyringError> {
        let payload = self.transport.send(BridgeRequest::Unlock).await?;
        let response = match payload {
            ResponsePayload::Unlock(response) => response,
            other => return Err(unexpected("unlock", &other)),
        };

        if response.result {
            Ok(())
        } else {
            let reason = response
                .error
                .unwrap_or_else(|| "device did not unlock".to_string());
            tracing::error!("{} unlock failed: {}", self.vendor, reason);
            Err(KeyringError::Unlock(reason))
        }
    }

    async fn fetch_public_keys(&self, paths: Vec<String>) -> Result<Vec<PublicKeyEntry>, KeyringError> {
        let payload = self
            .transport
            .send(BridgeRequest::GetAccounts { paths })
            .await?;
        let response = match payload {
            ResponsePayload::GetAccounts(response) => response,
            other => return Err(unexpected("get-accounts", &other)),
        };

        if response.success {
            Ok(response.accounts)
        } else {
            let reason = response
                .error
                .unwrap_or_else(|| "device returned no accounts".to_string());
            tracing::error!("{} account derivation failed: {}", self.vendor, reason);
            Err(KeyringError::Accounts(reason))
        }
    }

    /// Derives the identity address at `identity_path` and records the
    /// resulting [`DeviceId`]
    pub(crate) async fn establish_identity(&self, identity_path: &str) -> Result<DeviceId, KeyringError> {
        let entries = self.fetch_public_keys(vec![identity_path.to_string()]).await?;
        let entry = entries
            .iter()
            .find(|entry| entry.serialized_path == identity_path)
            .ok_or_else(|| missing_path(identity_path))?;
        let device_id = device_id_from_address(&public_key_to_address(&entry.public_key)?);
        self.state.lock().await.device_id = Some(device_id.clone());
        Ok(device_id)
    }

    /// Establishes the device identity during unlock if it is not yet known.
    ///
    /// Derivation failures are reported as [`KeyringError::Unlock`]; bridge
    /// failures keep their type.
    pub(crate) async fn ensure_identity(&self, identity_path: &str) -> Result<(), KeyringError> {
        if self.device_id().await.is_some() {
            return Ok(());
        }
        self.establish_identity(identity_path)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                KeyringError::Bridge(e) => KeyringError::Bridge(e),
                other => KeyringError::Unlock(other.to_string()),
            })
    }

    /// Derives accounts for `paths`.
    ///
    /// When the device identity is still unknown the identity path is
    /// derived alongside, and only returned if it was asked for.
    pub(crate) async fn accounts_for_paths(
        &self,
        paths: Vec<String>,
        identity_path: &str,
    ) -> Result<Vec<Account>, KeyringError> {
        let known_id = self.device_id().await;

        let mut request_paths = paths.clone();
        if known_id.is_none() && !paths.iter().any(|path| path == identity_path) {
            request_paths.push(identity_path.to_string());
        }

        let entries = self.fetch_public_keys(request_paths).await?;
        let keys: HashMap<&str, &str> = entries
            .iter()
            .map(|entry| (entry.serialized_path.as_str(), entry.public_key.as_str()))
            .collect();

        let device_id = match known_id {
            Some(id) => id,
            None => {
                let public_key = keys
                    .get(identity_path)
                    .ok_or_else(|| missing_path(identity_path))?;
                let id = device_id_from_address(&public_key_to_address(public_key)?);
                self.state.lock().await.device_id = Some(id.clone());
                id
            }
        };

        paths
            .into_iter()
            .map(|path| -> Result<Account, KeyringError> {
                let public_key = keys.get(path.as_str()).ok_or_else(|| missing_path(&path))?;
                Ok(Account {
                    address: public_key_to_address(public_key)?,
                    derivation_path: path,
                    vendor: self.vendor,
                    device_id: device_id.clone(),
                })
            })
            .collect()
    }

    pub(crate) async fn request_transaction_signature(
        &self,
        path: &str,
        request: &TransactionSignRequest,
    ) -> Result<DeviceSignature, KeyringError> {
        let payload = self
            .transport
            .send(BridgeRequest::SignTransaction {
                path: path.to_string(),
                transaction: request.clone(),
            })
            .await?;
        match payload {
            ResponsePayload::SignTransaction(response) => self.signature_from(response),
            other => Err(unexpected("sign-transaction", &other)),
        }
    }

    pub(crate) async fn request_message_signature(
        &self,
        path: &str,
        message: &[u8],
    ) -> Result<DeviceSignature, KeyringError> {
        let payload = self
            .transport
            .send(BridgeRequest::SignMessage {
                path: path.to_string(),
                message: format!("0x{}", hex::encode(message)),
            })
            .await?;
        match payload {
            ResponsePayload::SignMessage(response) => self.signature_from(response),
            other => Err(unexpected("sign-message", &other)),
        }
    }

    fn signature_from(&self, response: SignResponse) -> Result<DeviceSignature, KeyringError> {
        if !response.success {
            let (message, code) = match response.error {
                Some(failure) => (failure.error, failure.code),
                None => ("device declined the request".to_string(), None),
            };
            tracing::error!("{} signing failed: {} (code {:?})", self.vendor, message, code);
            return Err(KeyringError::SignOnDevice { message, code });
        }

        response
            .payload
            .ok_or_else(|| KeyringError::sign_on_device("device returned no signature", None))
    }
}

fn unexpected(expected: &'static str, payload: &ResponsePayload) -> KeyringError {
    KeyringError::Bridge(BridgeError::UnexpectedPayload {
        expected,
        actual: payload.command_name(),
    })
}

fn missing_path(path: &str) -> KeyringError {
    KeyringError::Accounts(format!("device returned no public key for {}", path))
}

/// Reads a device `v` as an integer
pub fn parse_v(v: &SignatureV) -> Result<u64, KeyringError> {
    match v {
        SignatureV::Raw(value) => Ok(*value),
        SignatureV::Hex(value) => u64::from_str_radix(strip_hex_prefix(value), 16)
            .map_err(|e| KeyringError::Validation(format!("v {:?} is not hex: {}", value, e))),
    }
}

/// Converts a device transaction signature into bare-hex components
pub fn normalize_transaction_signature(
    signature: &DeviceSignature,
) -> Result<SignatureVrs, KeyringError> {
    Ok(SignatureVrs {
        v: parse_v(&signature.v)?,
        r: strip_hex_prefix(&signature.r).to_string(),
        s: strip_hex_prefix(&signature.s).to_string(),
    })
}

/// Builds `0x{r}{s}{recovery}` after checking the components are well formed.
///
/// `r` and `s` must be 32 bytes of hex (an optional `0x` is tolerated) and
/// `recovery` must be 0 or 1.
pub fn assemble_message_signature(r: &str, s: &str, recovery: u64) -> Result<String, KeyringError> {
    let r = strip_hex_prefix(r);
    let s = strip_hex_prefix(s);

    for (name, value) in [("r", r), ("s", s)] {
        if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KeyringError::Validation(format!(
                "{} must be 64 hex characters, got {:?}",
                name, value
            )));
        }
    }
    if recovery > 1 {
        return Err(KeyringError::Validation(format!(
            "recovery id must be 0 or 1, got {}",
            recovery
        )));
    }

    Ok(format!("0x{}{}{:02x}", r, s, recovery))
}
