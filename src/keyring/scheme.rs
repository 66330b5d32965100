use std::fmt;

use super::KeyringError;
use crate::model::VendorTag;

/// Highest non-hardened child index
pub const MAX_ACCOUNT_INDEX: u32 = 0x7fff_ffff;

/// Derivation path conventions known to the keyrings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationScheme {
    /// One account per hardened account index: `m/44'/60'/{i}'/0/0`
    LedgerLive,
    /// All accounts under account 0: `m/44'/60'/0'/{i}`
    Legacy,
    /// Trezor's default: `m/44'/60'/0'/{i}`
    TrezorDefault,
}

impl DerivationScheme {
    /// Resolves a scheme name for `vendor`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError::UnknownScheme`] if the vendor does not support it.
    pub fn parse(vendor: VendorTag, scheme: &str) -> Result<Self, KeyringError> {
        match (vendor, scheme) {
            (VendorTag::Ledger, "ledger-live") => Ok(DerivationScheme::LedgerLive),
            (VendorTag::Ledger, "legacy") => Ok(DerivationScheme::Legacy),
            (VendorTag::Trezor, "default") => Ok(DerivationScheme::TrezorDefault),
            _ => Err(KeyringError::UnknownScheme(scheme.to_string())),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            DerivationScheme::LedgerLive => "ledger-live",
            DerivationScheme::Legacy => "legacy",
            DerivationScheme::TrezorDefault => "default",
        }
    }

    pub fn path_for_index(&self, index: u32) -> String {
        match self {
            DerivationScheme::LedgerLive => format!("m/44'/60'/{}'/0/0", index),
            DerivationScheme::Legacy | DerivationScheme::TrezorDefault => {
                format!("m/44'/60'/0'/{}", index)
            }
        }
    }
}

impl fmt::Display for DerivationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most accounts a single `get_accounts` call may derive
pub const MAX_ACCOUNTS_PER_REQUEST: u32 = 100;

/// Normalizes an inclusive `from..=to` request.
///
/// Negative `from` clamps to 0 and an inverted range yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`KeyringError::AccountRange`] if `to` is above
/// [`MAX_ACCOUNT_INDEX`] or the range spans more than
/// [`MAX_ACCOUNTS_PER_REQUEST`] indices.
pub fn index_range(from: i64, to: i64) -> Result<Option<(u32, u32)>, KeyringError> {
    let from = from.max(0);
    if to < from {
        return Ok(None);
    }

    let last = u32::try_from(to)
        .ok()
        .filter(|index| *index <= MAX_ACCOUNT_INDEX)
        .ok_or_else(|| {
            KeyringError::AccountRange(format!(
                "index {} is above the maximum {}",
                to, MAX_ACCOUNT_INDEX
            ))
        })?;
    // from <= to <= MAX_ACCOUNT_INDEX here
    let first = u32::try_from(from)
        .map_err(|_| KeyringError::AccountRange(format!("invalid start index {}", from)))?;

    let count = u64::from(last - first) + 1;
    if count > u64::from(MAX_ACCOUNTS_PER_REQUEST) {
        return Err(KeyringError::AccountRange(format!(
            "{} accounts requested, at most {} per request",
            count, MAX_ACCOUNTS_PER_REQUEST
        )));
    }

    Ok(Some((first, last)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_paths() {
        let live = DerivationScheme::parse(VendorTag::Ledger, "ledger-live").unwrap();
        assert_eq!(live.path_for_index(3), "m/44'/60'/3'/0/0");

        let legacy = DerivationScheme::parse(VendorTag::Ledger, "legacy").unwrap();
        assert_eq!(legacy.path_for_index(3), "m/44'/60'/0'/3");
    }

    #[test]
    fn test_trezor_paths() {
        let default = DerivationScheme::parse(VendorTag::Trezor, "default").unwrap();
        assert_eq!(default.path_for_index(0), "m/44'/60'/0'/0");
        assert_eq!(default.to_string(), "default");
    }

    #[test]
    fn test_unknown_scheme_per_vendor() {
        let err = DerivationScheme::parse(VendorTag::Trezor, "ledger-live").unwrap_err();
        assert!(matches!(err, KeyringError::UnknownScheme(s) if s == "ledger-live"));

        let err = DerivationScheme::parse(VendorTag::Ledger, "").unwrap_err();
        assert!(matches!(err, KeyringError::UnknownScheme(_)));
    }

    #[test]
    fn test_index_range() {
        assert_eq!(index_range(0, 4).unwrap(), Some((0, 4)));
        assert_eq!(index_range(-3, 2).unwrap(), Some((0, 2)));
        assert_eq!(index_range(2, 2).unwrap(), Some((2, 2)));
        assert_eq!(index_range(5, 4).unwrap(), None);
        assert_eq!(index_range(-5, -1).unwrap(), None);

        let top = i64::from(MAX_ACCOUNT_INDEX);
        assert_eq!(
            index_range(top - 1, top).unwrap(),
            Some((MAX_ACCOUNT_INDEX - 1, MAX_ACCOUNT_INDEX))
        );
        assert_eq!(
            index_range(0, i64::from(MAX_ACCOUNTS_PER_REQUEST) - 1).unwrap(),
            Some((0, MAX_ACCOUNTS_PER_REQUEST - 1))
        );
    }

    #[test]
    fn test_index_past_hardened_limit_is_an_error() {
        let first = i64::from(MAX_ACCOUNT_INDEX) + 1;
        let err = index_range(first, first + 2).unwrap_err();
        assert!(matches!(err, KeyringError::AccountRange(_)));

        let err = index_range(0x7fff_fff0, 0x8000_0001).unwrap_err();
        assert!(matches!(err, KeyringError::AccountRange(_)));

        // Inverted ranges stay empty even above the limit
        assert_eq!(index_range(first + 5, first).unwrap(), None);
    }

    #[test]
    fn test_oversized_range_is_rejected() {
        let err = index_range(0, i64::MAX).unwrap_err();
        assert!(matches!(err, KeyringError::AccountRange(_)));

        let err = index_range(0, i64::from(MAX_ACCOUNTS_PER_REQUEST)).unwrap_err();
        assert!(matches!(err, KeyringError::AccountRange(msg) if msg.contains("at most 100")));
    }
}
