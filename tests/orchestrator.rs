//! Signing pipeline tests against the in-process bridge and mock backend

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hw_keyring::backend::BackendError;
use hw_keyring::bridge::{LocalBridge, SdkError};
use hw_keyring::config::BridgeConfig;
use hw_keyring::keyring::{create_keyring, HardwareKeyring, KeyringError};
use hw_keyring::mock_backend::{BackendCall, BackendMethod, MockWalletBackend};
use hw_keyring::mocks::MockVendorSdk;
use hw_keyring::model::{
    Account, DeviceId, DeviceSignature, SignatureV, SignatureVrs, SigningErrorKey, SigningOutcome,
    TransactionInfo, TransactionSignRequest, TxBase, VendorTag,
};
use hw_keyring::orchestrator::{sign_hardware_transaction, SigningOrchestrator};

const TX_ID: &str = "tx-1";
const PATH: &str = "m/44'/60'/0'/0/0";

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

fn tx_info() -> TransactionInfo {
    TransactionInfo {
        id: TX_ID.to_string(),
        base: TxBase {
            nonce: String::new(),
            gas_price: "0x3b9aca00".to_string(),
            gas_limit: "0x5208".to_string(),
            to: "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".to_string(),
            value: "0x01".to_string(),
            data: vec![0xde, 0xad],
        },
    }
}

fn ready_backend() -> MockWalletBackend {
    MockWalletBackend::new()
        .with_nonce(TX_ID, "0x1")
        .with_message(TX_ID, b"raw_message_to_sign")
}

fn ledger_over_bridge(sdk: MockVendorSdk) -> (Box<dyn HardwareKeyring>, Arc<MockVendorSdk>) {
    let sdk = Arc::new(sdk);
    let bridge = LocalBridge::connect(BridgeConfig::for_tests(), sdk.clone());
    (create_keyring(VendorTag::Ledger, bridge.transport), sdk)
}

fn short_signature() -> DeviceSignature {
    DeviceSignature {
        v: SignatureV::Raw(1),
        r: "R".to_string(),
        s: "S".to_string(),
    }
}

/// Keyring that returns a fixed result and counts device calls
struct ScriptedKeyring {
    result: fn() -> Result<SignatureVrs, KeyringError>,
    sign_calls: AtomicUsize,
    last_request: std::sync::Mutex<Option<TransactionSignRequest>>,
}

impl ScriptedKeyring {
    fn new(result: fn() -> Result<SignatureVrs, KeyringError>) -> Self {
        Self {
            result,
            sign_calls: AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        }
    }

    fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HardwareKeyring for ScriptedKeyring {
    fn vendor(&self) -> VendorTag {
        VendorTag::Trezor
    }

    async fn is_unlocked(&self) -> bool {
        true
    }

    async fn unlock(&self) -> Result<bool, KeyringError> {
        Ok(true)
    }

    async fn get_accounts(
        &self,
        _from: i64,
        _to: i64,
        _scheme: &str,
    ) -> Result<Vec<Account>, KeyringError> {
        Ok(Vec::new())
    }

    async fn sign_transaction(
        &self,
        _path: &str,
        request: &TransactionSignRequest,
    ) -> Result<SignatureVrs, KeyringError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        (self.result)()
    }

    async fn sign_personal_message(
        &self,
        _path: &str,
        _address: &str,
        _message: &[u8],
    ) -> Result<String, KeyringError> {
        Err(KeyringError::Validation("not scripted".to_string()))
    }

    async fn device_id(&self) -> Option<DeviceId> {
        None
    }
}

fn signs_ok() -> Result<SignatureVrs, KeyringError> {
    Ok(SignatureVrs {
        v: 1,
        r: "R".to_string(),
        s: "S".to_string(),
    })
}

fn no_signature() -> Result<SignatureVrs, KeyringError> {
    Err(KeyringError::sign_on_device("device returned no signature", None))
}

fn locked_device() -> Result<SignatureVrs, KeyringError> {
    Err(KeyringError::Unlock("Device locked".to_string()))
}

fn invalid_signature() -> Result<SignatureVrs, KeyringError> {
    Err(KeyringError::Validation("v is not a number".to_string()))
}

fn uppercase_prefixes() -> Result<SignatureVrs, KeyringError> {
    Ok(SignatureVrs {
        v: 0x25,
        r: "0XAB".to_string(),
        s: "0xcd".to_string(),
    })
}

#[tokio::test]
async fn test_end_to_end_success() {
    init_tracing();
    let backend = ready_backend();
    let (keyring, sdk) =
        ledger_over_bridge(MockVendorSdk::ledger().with_transaction_signature(short_signature()));

    let outcome = sign_hardware_transaction(&backend, keyring.as_ref(), PATH, &tx_info()).await;

    assert_eq!(outcome, SigningOutcome::Success);
    assert!(sdk
        .calls()
        .contains(&format!("sign_transaction:{}", PATH)));
    assert_eq!(
        backend.calls().last(),
        Some(&BackendCall::ProcessSignature {
            tx_id: TX_ID.to_string(),
            v: "0x1".to_string(),
            r: "0xR".to_string(),
            s: "0xS".to_string(),
        })
    );
}

#[tokio::test]
async fn test_success_serializes_as_success_true() {
    let backend = ready_backend();
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({ "success": true })
    );
}

#[tokio::test]
async fn test_request_carries_backend_nonce_and_chain() {
    let backend = ready_backend().with_chain_id("0x5");
    let keyring = ScriptedKeyring::new(signs_ok);

    sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    let request = keyring.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.transaction.nonce, "0x1");
    assert_eq!(request.transaction.gas_limit, "0x5208");
    assert_eq!(request.chain_id, "0x5");
    assert_eq!(request.message, b"raw_message_to_sign".to_vec());
}

#[tokio::test]
async fn test_missing_nonce_short_circuits() {
    let backend = MockWalletBackend::new().with_message(TX_ID, b"raw_message_to_sign");
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(
        outcome,
        SigningOutcome::failure(SigningErrorKey::ApproveTransactionError)
    );
    assert_eq!(backend.calls(), vec![BackendCall::GetNonce(TX_ID.to_string())]);
    assert_eq!(keyring.sign_calls(), 0);
}

#[tokio::test]
async fn test_empty_nonce_short_circuits() {
    let backend = MockWalletBackend::new()
        .with_nonce(TX_ID, "")
        .with_message(TX_ID, b"raw_message_to_sign");
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(
        outcome.error_key(),
        Some(SigningErrorKey::ApproveTransactionError)
    );
    assert_eq!(backend.call_count(BackendMethod::GetMessage), 0);
    assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 0);
    assert_eq!(keyring.sign_calls(), 0);
}

#[tokio::test]
async fn test_nonce_error_maps_to_approve_error() {
    let backend = ready_backend().with_failure(
        BackendMethod::GetNonce,
        BackendError::Unavailable("service gone".to_string()),
    );
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(
        outcome.error_key(),
        Some(SigningErrorKey::ApproveTransactionError)
    );
}

#[tokio::test]
async fn test_missing_message_short_circuits() {
    let backend = MockWalletBackend::new().with_nonce(TX_ID, "0x1");
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(
        outcome,
        SigningOutcome::failure(SigningErrorKey::NoMessageToSignError)
    );
    assert_eq!(keyring.sign_calls(), 0);
    assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 0);
}

#[tokio::test]
async fn test_device_returns_no_signature() {
    let backend = ready_backend();
    let keyring = ScriptedKeyring::new(no_signature);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(outcome.error_key(), Some(SigningErrorKey::SignOnDeviceError));
    assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 0);
}

#[tokio::test]
async fn test_keyring_unlock_and_validation_errors_report_sign_on_device() {
    let results: [fn() -> Result<SignatureVrs, KeyringError>; 2] =
        [locked_device, invalid_signature];
    for result in results {
        let backend = ready_backend();
        let keyring = ScriptedKeyring::new(result);

        let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

        assert_eq!(
            outcome,
            SigningOutcome::failure(SigningErrorKey::SignOnDeviceError)
        );
        assert_eq!(keyring.sign_calls(), 1);
        assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 0);
    }
}

#[tokio::test]
async fn test_signature_prefixes_are_lowercased() {
    let backend = ready_backend();
    let keyring = ScriptedKeyring::new(uppercase_prefixes);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert!(outcome.is_success());
    assert_eq!(
        backend.calls().last(),
        Some(&BackendCall::ProcessSignature {
            tx_id: TX_ID.to_string(),
            v: "0x25".to_string(),
            r: "0xAB".to_string(),
            s: "0xcd".to_string(),
        })
    );
}

#[tokio::test]
async fn test_device_rejection_over_bridge_keeps_code() {
    let backend = ready_backend();
    let (keyring, _) = ledger_over_bridge(
        MockVendorSdk::ledger().with_sign_error(SdkError::with_code("Denied by user", "27013")),
    );

    let outcome = sign_hardware_transaction(&backend, keyring.as_ref(), PATH, &tx_info()).await;

    assert_eq!(
        outcome,
        SigningOutcome::Failure {
            error_key: SigningErrorKey::SignOnDeviceError,
            device_code: Some("27013".to_string()),
        }
    );
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({
            "success": false,
            "error": "hardwareWalletSignOnDeviceError",
            "code": "27013"
        })
    );
    assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 0);
}

#[tokio::test]
async fn test_unlock_failure_never_reaches_device() {
    let backend = ready_backend();
    let (keyring, sdk) = ledger_over_bridge(MockVendorSdk::ledger().with_init_error("locked"));

    let outcome = sign_hardware_transaction(&backend, keyring.as_ref(), PATH, &tx_info()).await;

    assert_eq!(outcome.error_key(), Some(SigningErrorKey::SignOnDeviceError));
    assert_eq!(sdk.calls(), vec!["init".to_string()]);
}

#[tokio::test]
async fn test_backend_rejects_signature() {
    let backend = ready_backend().with_signature_status(false);
    let (keyring, _) = ledger_over_bridge(MockVendorSdk::ledger());

    let outcome = sign_hardware_transaction(&backend, keyring.as_ref(), PATH, &tx_info()).await;

    assert_eq!(
        outcome,
        SigningOutcome::failure(SigningErrorKey::ProcessTransactionError)
    );
    assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 1);
}

#[tokio::test]
async fn test_backend_submit_error() {
    let backend = ready_backend().with_failure(
        BackendMethod::ProcessSignature,
        BackendError::Rejected("bad v".to_string()),
    );
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(
        outcome.error_key(),
        Some(SigningErrorKey::ProcessTransactionError)
    );
}

#[tokio::test]
async fn test_chain_id_failure_blocks_device() {
    let backend = ready_backend().with_failure(
        BackendMethod::GetChainId,
        BackendError::Unavailable("no network".to_string()),
    );
    let keyring = ScriptedKeyring::new(signs_ok);

    let outcome = sign_hardware_transaction(&backend, &keyring, PATH, &tx_info()).await;

    assert_eq!(outcome.error_key(), Some(SigningErrorKey::SignOnDeviceError));
    assert_eq!(keyring.sign_calls(), 0);
}

#[tokio::test]
async fn test_bridge_timeout_reports_unavailable() {
    let backend = ready_backend();
    let sdk = Arc::new(MockVendorSdk::trezor().hanging());
    let config = BridgeConfig::for_tests().with_request_timeout_ms(50);
    let bridge = LocalBridge::connect(config, sdk);
    let keyring = create_keyring(VendorTag::Trezor, bridge.transport.clone());

    let outcome =
        sign_hardware_transaction(&backend, keyring.as_ref(), "m/44'/60'/0'/0", &tx_info()).await;

    assert_eq!(outcome.error_key(), Some(SigningErrorKey::BridgeUnavailable));
    assert_eq!(bridge.transport.pending_count(), 0);
    assert_eq!(backend.call_count(BackendMethod::ProcessSignature), 0);
}

#[tokio::test]
async fn test_orchestrator_routes_by_vendor() {
    let backend = Arc::new(ready_backend());
    let sdk = Arc::new(MockVendorSdk::trezor());
    let bridge = LocalBridge::connect(BridgeConfig::for_tests(), sdk.clone());
    let trezor = create_keyring(VendorTag::Trezor, bridge.transport);

    let orchestrator = SigningOrchestrator::new(backend.clone()).with_keyring(Arc::from(trezor));

    let outcome = orchestrator
        .sign_transaction(VendorTag::Trezor, "m/44'/60'/0'/0", &tx_info())
        .await;
    assert!(outcome.is_success());

    let missing = orchestrator
        .sign_transaction(VendorTag::Ledger, PATH, &tx_info())
        .await;
    assert_eq!(missing.error_key(), Some(SigningErrorKey::UnlockError));
    assert!(orchestrator.keyring(VendorTag::Ledger).is_none());
}

#[tokio::test]
async fn test_failure_message_is_localized() {
    let orchestrator = SigningOrchestrator::new(Arc::new(MockWalletBackend::new()));

    assert_eq!(orchestrator.failure_message(&SigningOutcome::Success), None);

    let message = orchestrator
        .failure_message(&SigningOutcome::Failure {
            error_key: SigningErrorKey::SignOnDeviceError,
            device_code: Some("99".to_string()),
        })
        .unwrap();
    assert!(!message.contains("hardwareWallet"));
    assert!(message.ends_with("(99)"));
}
