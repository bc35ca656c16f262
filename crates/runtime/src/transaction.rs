//! Transactions and their signatures
//!
//! A transaction names its sender, a per-account nonce, the value attached
//! and one state-changing call. The signature covers a domain-separated
//! SHA-256 digest of the canonical byte encoding, which also binds the chain
//! id so a transaction signed for one network cannot be replayed on another.

use crate::errors::*;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use somnia_types::{Address, Amount, VoucherId};

const TX_DOMAIN: &[u8] = b"SOMNIA_REGISTRY_TX";

/// State-changing calls understood by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Call {
    RegisterName { name: String },
    TransferName { name: String, new_owner: Address },
    CreateVoucher { voucher_id: VoucherId },
    RedeemVoucher { voucher_id: VoucherId },
}

impl Call {
    pub fn method(&self) -> &'static str {
        match self {
            Call::RegisterName { .. } => "registerName",
            Call::TransferName { .. } => "transferName",
            Call::CreateVoucher { .. } => "createVoucher",
            Call::RedeemVoucher { .. } => "redeemVoucher",
        }
    }

    /// Only voucher creation accepts attached value.
    pub fn is_payable(&self) -> bool {
        matches!(self, Call::CreateVoucher { .. })
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Call::RegisterName { name } => {
                out.push(0x01);
                encode_str(out, name);
            }
            Call::TransferName { name, new_owner } => {
                out.push(0x02);
                encode_str(out, name);
                out.extend_from_slice(new_owner.as_bytes());
            }
            Call::CreateVoucher { voucher_id } => {
                out.push(0x03);
                out.extend_from_slice(voucher_id.as_bytes());
            }
            Call::RedeemVoucher { voucher_id } => {
                out.push(0x04);
                out.extend_from_slice(voucher_id.as_bytes());
            }
        }
    }
}

fn encode_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub value: Amount,
    pub call: Call,
}

impl Transaction {
    pub fn new(from: Address, call: Call) -> Self {
        Self {
            from,
            nonce: 0,
            value: Amount::ZERO,
            call,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    /// Canonical byte encoding used for hashing and signing.
    pub fn canonical_bytes(&self, chain_id: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(TX_DOMAIN.len() + 96);
        out.extend_from_slice(TX_DOMAIN);
        out.extend_from_slice(&chain_id.to_le_bytes());
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.value.atomic().to_le_bytes());
        self.call.encode_into(&mut out);
        out
    }

    /// Hex blake3 digest identifying the transaction on a chain.
    pub fn hash(&self, chain_id: u64) -> String {
        blake3::hash(&self.canonical_bytes(chain_id)).to_hex().to_string()
    }

    fn signing_digest(&self, chain_id: u64) -> [u8; 32] {
        Sha256::digest(self.canonical_bytes(chain_id)).into()
    }

    /// Sign with an Ed25519 key. The key must control `self.from`.
    pub fn sign(self, key: &SigningKey, chain_id: u64) -> SignedTransaction {
        let signature = key.sign(&self.signing_digest(chain_id));
        SignedTransaction {
            tx: self,
            public_key: key.verifying_key().to_bytes(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

/// Transaction plus the Ed25519 public key and signature authorising it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub public_key: [u8; 32],
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    /// Check the signature and return the authenticated sender.
    pub fn verify(&self, chain_id: u64) -> Result<Address> {
        if self.signature.len() != 64 {
            return Err(RuntimeError::InvalidSignature);
        }
        let verifying_key =
            VerifyingKey::from_bytes(&self.public_key).map_err(|_| RuntimeError::InvalidSignature)?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| RuntimeError::InvalidSignature)?;

        let derived = Address::from_public_key(&self.public_key);
        if derived != self.tx.from {
            return Err(RuntimeError::SenderMismatch {
                declared: self.tx.from,
                derived,
            });
        }

        verifying_key
            .verify(&self.tx.signing_digest(chain_id), &signature)
            .map_err(|_| RuntimeError::InvalidSignature)?;
        Ok(derived)
    }
}

/// Address controlled by a signing key.
pub fn address_of(key: &SigningKey) -> Address {
    Address::from_public_key(&key.verifying_key().to_bytes())
}
