//! In-memory [`WalletBackend`] for tests.
//!
//! Every call is recorded so tests can assert which steps of the signing
//! pipeline ran, and any method can be scripted to fail.

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::backend::{BackendError, WalletBackend};
use crate::model::{MessageToSign, NonceInfo, ProcessSignatureResult};

/// Backend methods, used to script failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendMethod {
    GetNonce,
    GetMessage,
    ProcessSignature,
    GetChainId,
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    GetNonce(String),
    GetMessage(String),
    ProcessSignature {
        tx_id: String,
        v: String,
        r: String,
        s: String,
    },
    GetChainId,
}

impl BackendCall {
    pub fn method(&self) -> BackendMethod {
        match self {
            BackendCall::GetNonce(_) => BackendMethod::GetNonce,
            BackendCall::GetMessage(_) => BackendMethod::GetMessage,
            BackendCall::ProcessSignature { .. } => BackendMethod::ProcessSignature,
            BackendCall::GetChainId => BackendMethod::GetChainId,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockWalletBackend {
    inner: Arc<MockWalletBackendInner>,
}

#[derive(Debug)]
struct MockWalletBackendInner {
    nonces: Mutex<HashMap<String, String>>,
    messages: Mutex<HashMap<String, Vec<u8>>>,
    signature_status: Mutex<bool>,
    chain_id: Mutex<String>,
    failures: Mutex<HashMap<BackendMethod, BackendError>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl Default for MockWalletBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWalletBackend {
    /// An empty backend on chain `0x1` that accepts every signature
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockWalletBackendInner {
                nonces: Mutex::new(HashMap::new()),
                messages: Mutex::new(HashMap::new()),
                signature_status: Mutex::new(true),
                chain_id: Mutex::new("0x1".to_string()),
                failures: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_nonce<S: Into<String>, N: Into<String>>(self, tx_id: S, nonce: N) -> Self {
        self.inner
            .nonces
            .lock()
            .unwrap()
            .insert(tx_id.into(), nonce.into());
        self
    }

    pub fn with_message<S: Into<String>>(self, tx_id: S, message: &[u8]) -> Self {
        self.inner
            .messages
            .lock()
            .unwrap()
            .insert(tx_id.into(), message.to_vec());
        self
    }

    /// Status returned by `process_hardware_signature`
    pub fn with_signature_status(self, status: bool) -> Self {
        *self.inner.signature_status.lock().unwrap() = status;
        self
    }

    pub fn with_chain_id<S: Into<String>>(self, chain_id: S) -> Self {
        *self.inner.chain_id.lock().unwrap() = chain_id.into();
        self
    }

    /// Makes `method` fail with `error`
    pub fn with_failure(self, method: BackendMethod, error: BackendError) -> Self {
        self.inner.failures.lock().unwrap().insert(method, error);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls to `method`
    pub fn call_count(&self, method: BackendMethod) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    fn record(&self, call: BackendCall) -> Result<(), BackendError> {
        let method = call.method();
        self.inner.calls.lock().unwrap().push(call);
        match self.inner.failures.lock().unwrap().get(&method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WalletBackend for MockWalletBackend {
    async fn get_nonce_for_hardware_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<NonceInfo>, BackendError> {
        self.record(BackendCall::GetNonce(tx_id.to_string()))?;
        Ok(self
            .inner
            .nonces
            .lock()
            .unwrap()
            .get(tx_id)
            .map(|nonce| NonceInfo {
                nonce: nonce.clone(),
            }))
    }

    async fn get_transaction_message_to_sign(
        &self,
        tx_id: &str,
    ) -> Result<Option<MessageToSign>, BackendError> {
        self.record(BackendCall::GetMessage(tx_id.to_string()))?;
        Ok(self
            .inner
            .messages
            .lock()
            .unwrap()
            .get(tx_id)
            .map(|message| MessageToSign {
                message: message.clone(),
            }))
    }

    async fn process_hardware_signature(
        &self,
        tx_id: &str,
        v: &str,
        r: &str,
        s: &str,
    ) -> Result<ProcessSignatureResult, BackendError> {
        self.record(BackendCall::ProcessSignature {
            tx_id: tx_id.to_string(),
            v: v.to_string(),
            r: r.to_string(),
            s: s.to_string(),
        })?;
        Ok(ProcessSignatureResult {
            status: *self.inner.signature_status.lock().unwrap(),
        })
    }

    async fn get_chain_id(&self) -> Result<String, BackendError> {
        self.record(BackendCall::GetChainId)?;
        Ok(self.inner.chain_id.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_scripted_failures() {
        let backend = MockWalletBackend::new()
            .with_nonce("tx1", "0x1")
            .with_failure(
                BackendMethod::GetMessage,
                BackendError::Unavailable("offline".to_string()),
            );

        let nonce = backend
            .get_nonce_for_hardware_transaction("tx1")
            .await
            .unwrap();
        assert_eq!(nonce.unwrap().nonce, "0x1");
        assert!(backend
            .get_nonce_for_hardware_transaction("tx2")
            .await
            .unwrap()
            .is_none());

        let err = backend
            .get_transaction_message_to_sign("tx1")
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Unavailable("offline".to_string()));

        assert_eq!(backend.call_count(BackendMethod::GetNonce), 2);
        assert_eq!(backend.call_count(BackendMethod::GetMessage), 1);
        assert_eq!(backend.calls()[0], BackendCall::GetNonce("tx1".to_string()));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let backend = MockWalletBackend::new().with_signature_status(false);
        let clone = backend.clone();
        let result = clone
            .process_hardware_signature("tx", "0x1", "0xR", "0xS")
            .await
            .unwrap();
        assert!(!result.status);
        assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 1);
    }
}
