use std::fmt;

use serde::{Deserialize, Serialize};

/// Hardware vendor a keyring talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorTag {
    Ledger,
    Trezor,
}

impl VendorTag {
    /// Stable string used for storage and lookup keys
    pub const fn as_str(&self) -> &'static str {
        match self {
            VendorTag::Ledger => "Ledger",
            VendorTag::Trezor => "Trezor",
        }
    }
}

impl fmt::Display for VendorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a physical device, derived from its index-0 address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A hardware account returned by `get_accounts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    pub derivation_path: String,
    pub vendor: VendorTag,
    pub device_id: DeviceId,
}

impl Account {
    /// Identity of the account within a wallet: `(vendor, derivation path)`
    pub fn key(&self) -> (VendorTag, &str) {
        (self.vendor, &self.derivation_path)
    }
}

/// Normalized ECDSA recovery components. `r` and `s` carry no `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVrs {
    pub v: u64,
    pub r: String,
    pub s: String,
}

/// The `v` component as a device reports it.
///
/// Ledger reports a raw integer, Trezor a `0x` prefixed hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureV {
    Raw(u64),
    Hex(String),
}

/// Signature exactly as returned by the vendor SDK inside the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignature {
    pub v: SignatureV,
    pub r: String,
    pub s: String,
}

/// Base transaction fields as supplied by the wallet backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxBase {
    pub nonce: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub to: String,
    pub value: String,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// A pending transaction known to the wallet backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    pub base: TxBase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceInfo {
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageToSign {
    #[serde(with = "hex_bytes")]
    pub message: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSignatureResult {
    pub status: bool,
}

/// Everything a device may need to sign a transaction.
///
/// Ledger signs the canonical `message` bytes; Trezor rebuilds the
/// transaction from the fields and `chain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignRequest {
    pub transaction: TxBase,
    pub chain_id: String,
    #[serde(with = "hex_bytes")]
    pub message: Vec<u8>,
}

// =========================================================================
// Bridge envelopes
// =========================================================================

/// Operations the vendor bridge endpoint understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum BridgeRequest {
    Unlock,
    GetAccounts {
        paths: Vec<String>,
    },
    SignTransaction {
        path: String,
        transaction: TransactionSignRequest,
    },
    SignMessage {
        path: String,
        message: String,
    },
}

impl BridgeRequest {
    pub const fn command_name(&self) -> &'static str {
        match self {
            BridgeRequest::Unlock => "unlock",
            BridgeRequest::GetAccounts { .. } => "get-accounts",
            BridgeRequest::SignTransaction { .. } => "sign-transaction",
            BridgeRequest::SignMessage { .. } => "sign-message",
        }
    }
}

/// Outbound envelope: host -> bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeCommand {
    pub id: String,
    /// Origin the bridge must reply to; checked against the sender origin.
    pub owner: String,
    #[serde(flatten)]
    pub request: BridgeRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    pub public_key: String,
    pub serialized_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAccountsResponse {
    pub success: bool,
    #[serde(default)]
    pub accounts: Vec<PublicKeyEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failure reported by the vendor SDK, with its numeric code when it has one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<DeviceSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum ResponsePayload {
    Unlock(UnlockResponse),
    GetAccounts(GetAccountsResponse),
    SignTransaction(SignResponse),
    SignMessage(SignResponse),
}

impl ResponsePayload {
    pub const fn command_name(&self) -> &'static str {
        match self {
            ResponsePayload::Unlock(_) => "unlock",
            ResponsePayload::GetAccounts(_) => "get-accounts",
            ResponsePayload::SignTransaction(_) => "sign-transaction",
            ResponsePayload::SignMessage(_) => "sign-message",
        }
    }
}

/// Inbound envelope: bridge -> host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: String,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

/// Event type of a cross-context channel message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    MessageError,
}

/// One event on the cross-context channel, as a listener observes it
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub kind: MessageKind,
    /// Origin of the sending context
    pub origin: String,
    pub data: serde_json::Value,
}

impl ChannelMessage {
    /// Wraps a serializable envelope into a regular `message` event
    pub fn message<T: Serialize>(origin: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: MessageKind::Message,
            origin: origin.to_string(),
            data: serde_json::to_value(data)?,
        })
    }
}

// =========================================================================
// Signing outcome
// =========================================================================

/// Stable, localizable error keys surfaced to the wallet UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningErrorKey {
    #[serde(rename = "hardwareWalletUnlockError")]
    UnlockError,
    #[serde(rename = "hardwareWalletUnknownSchemeError")]
    UnknownScheme,
    #[serde(rename = "hardwareWalletApproveTransactionError")]
    ApproveTransactionError,
    #[serde(rename = "hardwareWalletNoMessageToSignError")]
    NoMessageToSignError,
    #[serde(rename = "hardwareWalletSignOnDeviceError")]
    SignOnDeviceError,
    #[serde(rename = "hardwareWalletValidationError")]
    ValidationError,
    #[serde(rename = "hardwareWalletProcessTransactionError")]
    ProcessTransactionError,
    #[serde(rename = "hardwareWalletBridgeUnavailableError")]
    BridgeUnavailable,
}

impl SigningErrorKey {
    pub const ALL: [SigningErrorKey; 8] = [
        SigningErrorKey::UnlockError,
        SigningErrorKey::UnknownScheme,
        SigningErrorKey::ApproveTransactionError,
        SigningErrorKey::NoMessageToSignError,
        SigningErrorKey::SignOnDeviceError,
        SigningErrorKey::ValidationError,
        SigningErrorKey::ProcessTransactionError,
        SigningErrorKey::BridgeUnavailable,
    ];

    /// The locale key for this error
    pub const fn as_str(&self) -> &'static str {
        match self {
            SigningErrorKey::UnlockError => "hardwareWalletUnlockError",
            SigningErrorKey::UnknownScheme => "hardwareWalletUnknownSchemeError",
            SigningErrorKey::ApproveTransactionError => "hardwareWalletApproveTransactionError",
            SigningErrorKey::NoMessageToSignError => "hardwareWalletNoMessageToSignError",
            SigningErrorKey::SignOnDeviceError => "hardwareWalletSignOnDeviceError",
            SigningErrorKey::ValidationError => "hardwareWalletValidationError",
            SigningErrorKey::ProcessTransactionError => "hardwareWalletProcessTransactionError",
            SigningErrorKey::BridgeUnavailable => "hardwareWalletBridgeUnavailableError",
        }
    }
}

impl fmt::Display for SigningErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one transaction signing attempt. Never partially populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "OutcomeWire", try_from = "OutcomeWire")]
pub enum SigningOutcome {
    Success,
    Failure {
        error_key: SigningErrorKey,
        device_code: Option<String>,
    },
}

impl SigningOutcome {
    pub const fn failure(error_key: SigningErrorKey) -> Self {
        SigningOutcome::Failure {
            error_key,
            device_code: None,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, SigningOutcome::Success)
    }

    pub const fn error_key(&self) -> Option<SigningErrorKey> {
        match self {
            SigningOutcome::Success => None,
            SigningOutcome::Failure { error_key, .. } => Some(*error_key),
        }
    }
}

/// `{ "success": true }` / `{ "success": false, "error": key, "code"?: .. }`
#[derive(Serialize, Deserialize)]
struct OutcomeWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<SigningErrorKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl From<SigningOutcome> for OutcomeWire {
    fn from(outcome: SigningOutcome) -> Self {
        match outcome {
            SigningOutcome::Success => OutcomeWire {
                success: true,
                error: None,
                code: None,
            },
            SigningOutcome::Failure {
                error_key,
                device_code,
            } => OutcomeWire {
                success: false,
                error: Some(error_key),
                code: device_code,
            },
        }
    }
}

impl TryFrom<OutcomeWire> for SigningOutcome {
    type Error = String;

    fn try_from(wire: OutcomeWire) -> Result<Self, Self::Error> {
        match (wire.success, wire.error) {
            (true, None) => Ok(SigningOutcome::Success),
            (false, Some(error_key)) => Ok(SigningOutcome::Failure {
                error_key,
                device_code: wire.code,
            }),
            (true, Some(_)) => Err("successful outcome must not carry an error".to_string()),
            (false, None) => Err("failed outcome must carry an error key".to_string()),
        }
    }
}

/// Serde helper: byte vectors as `0x` prefixed hex strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = String::deserialize(deserializer)?;
        let trimmed = crate::address::strip_hex_prefix(&value);
        hex::decode(trimmed).map_err(serde::de::Error::custom)
    }
}
