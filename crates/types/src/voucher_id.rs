use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Errors raised when parsing a voucher identifier.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VoucherIdError {
    #[error("voucher id must be 32 bytes of hex, got {0} characters")]
    InvalidLength(usize),
    #[error("voucher id is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Opaque 32-byte voucher identifier.
///
/// Knowledge of the identifier is the only credential needed to redeem a
/// voucher, so callers should derive it from a secret or from the OS RNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoucherId(pub [u8; 32]);

impl VoucherId {
    /// `keccak256(seed)`, the derivation wallets use for human-chosen seeds.
    pub fn derive(seed: &[u8]) -> Self {
        Self(Keccak256::digest(seed).into())
    }

    /// Fresh identifier from the operating system RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for VoucherId {
    type Err = VoucherIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if payload.len() != 64 {
            return Err(VoucherIdError::InvalidLength(payload.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(payload, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for VoucherId {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<VoucherId> for String {
    fn from(value: VoucherId) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for VoucherId {
    type Error = VoucherIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
