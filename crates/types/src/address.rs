use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an account address string.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AddressError {
    #[error("address must start with '0x'")]
    InvalidPrefix,
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 20;
/// Expected string length of an encoded address (`0x` + 40 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 2 + ADDRESS_BYTES * 2;

/// Encode a 20-byte account identifier into its `0x`-prefixed hex form.
pub fn encode_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
    encoded.push_str("0x");
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode a `0x`-prefixed hex address. Mixed case is accepted.
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let Some(payload) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    else {
        return Err(AddressError::InvalidPrefix);
    };

    if address.len() != ADDRESS_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_STRING_LENGTH,
            actual: address.len(),
        });
    }

    let mut bytes = [0u8; ADDRESS_BYTES];
    hex::decode_to_slice(payload, &mut bytes)?;
    Ok(bytes)
}

/// Check whether the provided string is a valid account address.
pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// Account identity on the native ledger.
///
/// Serialised as its `0x`-hex string so JSON snapshots and receipts stay
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    /// The all-zero address. Returned by info queries for absent records.
    pub const ZERO: Address = Address([0u8; ADDRESS_BYTES]);

    /// Derive the account address controlled by an Ed25519 public key.
    ///
    /// The address is the trailing 20 bytes of `keccak256(public_key)`.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = Keccak256::digest(public_key);
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes.copy_from_slice(&digest[32 - ADDRESS_BYTES..]);
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_BYTES]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address(s).map(Address)
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        encode_address(&value.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_address(&value).map(Address)
    }
}
