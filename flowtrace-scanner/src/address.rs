// Classic ledger address validation

use crate::error::{Result, ScanError};

/// Base58 alphabet used by the ledger's address encoding.
const LEDGER_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

const MIN_LEN: usize = 25;
const MAX_LEN: usize = 35;

/// Check that `address` is a well-formed classic address (`r` prefix, 25-35
/// characters from the ledger base58 alphabet). No checksum verification.
pub fn is_valid_address(address: &str) -> bool {
    let len = address.len();
    if !(MIN_LEN..=MAX_LEN).contains(&len) || !address.starts_with('r') {
        return false;
    }
    address.chars().all(|c| LEDGER_ALPHABET.contains(c))
}

/// Trim and validate an address, returning it owned.
pub fn parse_address(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if is_valid_address(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ScanError::InvalidAddress(trimmed.to_string()))
    }
}
