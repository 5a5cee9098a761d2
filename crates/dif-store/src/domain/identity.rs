//! # Identity Deriver
//!
//! Turns a content hash into a short document id.
//!
//! Derived ids only keep identifiers shorter than store-assigned ones. They
//! are not collision resistant; collisions are resolved by the dedup engine.
//!
//! The hash feeding the deriver is SHA-256 over the length-prefixed partition
//! key followed by the fingerprint bytes, truncated to the first 8 bytes
//! (big-endian, signed). Identical content therefore maps to the same id in
//! every process and across restarts.

use crate::domain::entities::Fingerprint;
use crate::domain::errors::DifStoreError;
use sha2::{Digest, Sha256};

/// Digits, then lower-case, then upper-case letters.
pub const DEFAULT_ALPHABET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Prefix symbol for negative values. Never part of an alphabet.
pub const SIGN_SYMBOL: char = '-';

/// Renders `x` in `base` using the first `base` symbols of `alphabet`.
///
/// `base = None` uses the whole alphabet, giving the shortest string for it.
///
/// ```
/// use dif_store::domain::identity::{change_base, DEFAULT_ALPHABET};
///
/// let max32 = (1i64 << 32) - 1;
/// assert_eq!(change_base(max32, DEFAULT_ALPHABET, Some(16)).unwrap(), "ffffffff");
/// assert_eq!(change_base(max32, DEFAULT_ALPHABET, None).unwrap(), "4GFfc3");
/// assert!(change_base(max32, "01", Some(16)).is_err());
/// ```
///
/// ## Errors
///
/// - `Config`: the alphabet or base is rejected by [`IdentityDeriver::new`]
pub fn change_base(x: i64, alphabet: &str, base: Option<u32>) -> Result<String, DifStoreError> {
    let (symbols, base) = checked_symbols(alphabet, base)?;
    Ok(render(x, &symbols, base))
}

/// Split `alphabet` into symbols and resolve the base against it.
fn checked_symbols(alphabet: &str, base: Option<u32>) -> Result<(Vec<char>, u32), DifStoreError> {
    let symbols: Vec<char> = alphabet.chars().collect();
    if symbols.len() < 2 {
        return Err(DifStoreError::config(
            "identity alphabet needs at least 2 symbols",
        ));
    }
    if symbols.contains(&SIGN_SYMBOL) {
        return Err(DifStoreError::config(format!(
            "identity alphabet must not contain '{}'",
            SIGN_SYMBOL
        )));
    }
    let mut sorted = symbols.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != symbols.len() {
        return Err(DifStoreError::config(
            "identity alphabet contains duplicate symbols",
        ));
    }

    let max_base = symbols.len() as u32;
    let base = base.unwrap_or(max_base);
    if !(2..=max_base).contains(&base) {
        return Err(DifStoreError::config(format!(
            "identity base {} outside 2..={}",
            base, max_base
        )));
    }
    Ok((symbols, base))
}

/// Requires `2 <= base <= symbols.len()`.
fn render(x: i64, symbols: &[char], base: u32) -> String {
    let base = u64::from(base);
    let mut magnitude = x.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(symbols[(magnitude % base) as usize]);
        magnitude /= base;
        if magnitude == 0 {
            break;
        }
    }
    if x < 0 {
        digits.push(SIGN_SYMBOL);
    }
    digits.iter().rev().collect()
}

/// Deterministic 64-bit content hash of a (partition key, fingerprint) pair.
pub fn content_hash(key: &str, fingerprint: &Fingerprint) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update((key.len() as u64).to_be_bytes());
    hasher.update(key.as_bytes());
    hasher.update(fingerprint.as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head)
}

/// Configured alphabet/base pair used to derive fingerprint record ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDeriver {
    alphabet: String,
    symbols: Vec<char>,
    base: u32,
}

impl IdentityDeriver {
    /// Validate an alphabet and optional base.
    ///
    /// ## Errors
    ///
    /// - `Config`: fewer than 2 symbols, duplicate symbols, the sign symbol
    ///   inside the alphabet, or a base outside `2..=alphabet length`.
    pub fn new(alphabet: &str, base: Option<u32>) -> Result<Self, DifStoreError> {
        let (symbols, base) = checked_symbols(alphabet, base)?;
        Ok(Self {
            alphabet: alphabet.to_string(),
            symbols,
            base,
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    /// Encode an arbitrary integer with this deriver's alphabet and base.
    pub fn encode(&self, x: i64) -> String {
        render(x, &self.symbols, self.base)
    }

    /// Candidate document id for a fingerprint record.
    pub fn derive(&self, key: &str, fingerprint: &Fingerprint) -> String {
        self.encode(content_hash(key, fingerprint))
    }
}

impl Default for IdentityDeriver {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_string(),
            symbols: DEFAULT_ALPHABET.chars().collect(),
            base: DEFAULT_ALPHABET.len() as u32,
        }
    }
}
