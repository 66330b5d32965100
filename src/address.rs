//! Address derivation shared by every account-returning operation.
//!
//! Devices hand back raw secp256k1 public keys (33-byte compressed or
//! 65-byte uncompressed SEC1 points, hex encoded). The chain address is the
//! last 20 bytes of the Keccak-256 hash of the uncompressed `x || y`
//! coordinates, rendered with the EIP-55 mixed-case checksum.

use secp256k1::PublicKey;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::keyring::KeyringError;
use crate::model::DeviceId;

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Renders a 20-byte address with the EIP-55 checksum casing.
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::with_capacity(lower.len() + 2);
    result.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_alphabetic() && nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Derives the checksummed address for a hex encoded secp256k1 public key.
///
/// Accepts keys with or without a `0x` prefix, compressed or uncompressed.
///
/// # Errors
///
/// Returns [`KeyringError::InvalidPublicKey`] when the input is not valid
/// hex or is not a point on the curve.
pub fn public_key_to_address(public_key_hex: &str) -> Result<String, KeyringError> {
    let trimmed = strip_hex_prefix(public_key_hex);
    let bytes = hex::decode(trimmed)
        .map_err(|e| KeyringError::InvalidPublicKey(format!("{public_key_hex}: {e}")))?;
    let public_key = PublicKey::from_slice(&bytes)
        .map_err(|e| KeyringError::InvalidPublicKey(format!("{public_key_hex}: {e}")))?;

    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);

    Ok(to_checksum_address(&hash[12..]))
}

/// Hashes the index-0 address of a device into its stable [`DeviceId`].
///
/// The address is lowercased first so that checksum casing never changes
/// the identity.
pub fn device_id_from_address(address: &str) -> DeviceId {
    let normalized = address.to_ascii_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    DeviceId::new(hex::encode(digest))
}

/// Removes a leading `0x`/`0X` if present.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Generator point G (private key 1).
    const G_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
    const G_COMPRESSED: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const G_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    #[test]
    fn test_uncompressed_key_to_address() {
        let address = public_key_to_address(G_UNCOMPRESSED).unwrap();
        assert_eq!(address, G_ADDRESS);
    }

    #[test]
    fn test_compressed_key_matches_uncompressed() {
        let compressed = public_key_to_address(G_COMPRESSED).unwrap();
        let prefixed = public_key_to_address(&format!("0x{G_UNCOMPRESSED}")).unwrap();
        assert_eq!(compressed, G_ADDRESS);
        assert_eq!(prefixed, G_ADDRESS);
    }

    #[test]
    fn test_invalid_public_key() {
        let err = public_key_to_address("zz").unwrap_err();
        assert!(matches!(err, KeyringError::InvalidPublicKey(_)));

        let err = public_key_to_address("04deadbeef").unwrap_err();
        assert!(matches!(err, KeyringError::InvalidPublicKey(_)));
    }

    #[test]
    fn test_checksum_known_vector() {
        // EIP-55 reference vector
        let raw = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(
            to_checksum_address(&raw),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn test_device_id_ignores_casing() {
        let a = device_id_from_address(G_ADDRESS);
        let b = device_id_from_address(&G_ADDRESS.to_ascii_lowercase());
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }
}
