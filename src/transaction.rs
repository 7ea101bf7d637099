//! Raw Transaction Records
//!
//! Transport-agnostic snapshot of one streamed transaction: the resolved
//! account list, top-level instructions, inner instruction groups, signature
//! and slot. Serialises to camelCase JSON with base-58 keys, signature and
//! instruction data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_pubkey::Pubkey;
use thiserror::Error;

/// Length of a transaction signature in bytes
pub const SIGNATURE_BYTES: usize = 64;

/// Errors parsing a signature
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid base58 signature: {0}")]
    Base58(String),

    #[error("Signature must be {SIGNATURE_BYTES} bytes, got {0}")]
    Length(usize),
}

/// A transaction signature
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_BYTES]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_BYTES] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = SignatureError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; SIGNATURE_BYTES] = bytes
            .try_into()
            .map_err(|_| SignatureError::Length(bytes.len()))?;
        Ok(Self(array))
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SignatureError::Base58(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A top-level instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledInstruction {
    /// Index into the transaction's account list naming the invoked program
    pub program_id_index: u32,
    /// Opaque instruction payload
    #[serde(with = "base58_bytes")]
    pub data: Vec<u8>,
}

/// Inner instructions emitted while executing one top-level instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerInstructionGroup {
    /// Position of the parent top-level instruction
    pub index: u32,
    pub instructions: Vec<CompiledInstruction>,
}

/// One streamed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub signature: Signature,
    pub slot: u64,
    /// Static keys followed by any address-table loaded keys
    #[serde(with = "pubkey_list")]
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<CompiledInstruction>,
    #[serde(default)]
    pub inner_instructions: Vec<InnerInstructionGroup>,
}

impl RawTransaction {
    /// The fee payer / initial signer
    pub fn signer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    /// Resolve the program invoked by an instruction
    pub fn program_id(&self, instruction: &CompiledInstruction) -> Option<&Pubkey> {
        let index = usize::try_from(instruction.program_id_index).ok()?;
        self.account_keys.get(index)
    }

    /// The inner instruction group recorded under a top-level instruction
    pub fn inner_group(&self, index: usize) -> Option<&InnerInstructionGroup> {
        self.inner_instructions
            .iter()
            .find(|group| usize::try_from(group.index).ok() == Some(index))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

mod base58_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bs58::encode(bytes).into_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        bs58::decode(s).into_vec().map_err(serde::de::Error::custom)
    }
}

mod pubkey_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_pubkey::Pubkey;

    pub fn serialize<S: Serializer>(keys: &[Pubkey], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(keys.iter().map(|key| key.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Pubkey>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| s.parse::<Pubkey>().map_err(serde::de::Error::custom))
            .collect()
    }
}
