//! # Hardware Keyring Library
//!
//! Hardware-wallet signing for a browser-hosted wallet. The vendor SDKs for
//! Ledger and Trezor run inside a sandboxed frame; this crate talks to them
//! over a correlated request/response channel and sequences the multi-step
//! transaction signing flow against the wallet backend.
//!
//! ## Modules
//!
//! - [`bridge`] - Host transport and sandbox endpoint for the message channel
//! - [`keyring`] - Vendor keyrings: unlock, account derivation, signing
//! - [`orchestrator`] - Nonce, message, device signature, submission
//! - [`backend`] - Wallet backend interface and localization
//! - [`address`] - Public key to checksummed address derivation
//! - [`config`] - Bridge origins and timeouts
//! - [`model`] - Data structures and wire envelopes
//! - [`mocks`] - Scripted vendor SDKs for testing
//! - [`mock_backend`] - In-memory wallet backend for testing
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hw_keyring::{
//!     create_keyring, BridgeConfig, LocalBridge, MockVendorSdk, MockWalletBackend,
//!     SigningOrchestrator, TransactionInfo, VendorTag,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::from_env()?;
//! let bridge = LocalBridge::connect(config, Arc::new(MockVendorSdk::trezor()));
//! let keyring = create_keyring(VendorTag::Trezor, bridge.transport.clone());
//!
//! let backend = MockWalletBackend::new()
//!     .with_nonce("tx-1", "0x1")
//!     .with_message("tx-1", b"raw_message_to_sign");
//! let orchestrator = SigningOrchestrator::new(Arc::new(backend)).with_keyring(Arc::from(keyring));
//!
//! let tx = TransactionInfo { id: "tx-1".to_string(), ..Default::default() };
//! let outcome = orchestrator
//!     .sign_transaction(VendorTag::Trezor, "m/44'/60'/0'/0", &tx)
//!     .await;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod keyring;
pub mod mock_backend;
pub mod mocks;
pub mod model;
pub mod orchestrator;

pub use backend::{BackendError, EnglishLocalizer, Localizer, WalletBackend};
pub use bridge::{BridgeError, BridgeTransport, LocalBridge, VendorBridgeEndpoint, VendorSdk};
pub use config::{BridgeConfig, ConfigError};
pub use keyring::{create_keyring, HardwareKeyring, KeyringError, LedgerKeyring, TrezorKeyring};
pub use mock_backend::MockWalletBackend;
pub use mocks::MockVendorSdk;
pub use model::{
    Account, DeviceId, SignatureVrs, SigningErrorKey, SigningOutcome, TransactionInfo, VendorTag,
};
pub use orchestrator::{sign_hardware_transaction, SigningOrchestrator};
