//! Decoded Swap Records
//!
//! The persisted shape of a qualifying swap, keyed by transaction signature.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A swap that touched the native asset, normalised for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSwapRecord {
    /// Transaction signature (base58), the record's identity
    pub signature: String,
    pub slot: u64,
    /// Initial signer of the transaction (base58)
    pub account: String,
    pub input_mint: String,
    pub input_amount: u64,
    pub output_mint: String,
    pub output_amount: u64,
}

impl DecodedSwapRecord {
    /// Field/value pairs written on upsert, amounts as exact decimal strings
    pub fn fields(&self) -> [(&'static str, String); 7] {
        [
            ("signature", self.signature.clone()),
            ("slot", self.slot.to_string()),
            ("account", self.account.clone()),
            ("input_mint", self.input_mint.clone()),
            ("input_amount", self.input_amount.to_string()),
            ("output_mint", self.output_mint.clone()),
            ("output_amount", self.output_amount.to_string()),
        ]
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// How records of one transaction map to storage keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Key by signature only; later legs overwrite earlier ones
    #[default]
    Signature,
    /// Key by `signature:leg`; every qualifying leg is kept
    SignatureAndLeg,
}

impl KeyStrategy {
    /// Storage key for the `leg`-th qualifying swap of a transaction
    pub fn key(&self, record: &DecodedSwapRecord, leg: usize) -> String {
        match self {
            KeyStrategy::Signature => record.signature.clone(),
            KeyStrategy::SignatureAndLeg => format!("{}:{}", record.signature, leg),
        }
    }
}

impl fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::Signature => f.write_str("signature"),
            KeyStrategy::SignatureAndLeg => f.write_str("signature-leg"),
        }
    }
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signature" => Ok(KeyStrategy::Signature),
            "signature-leg" => Ok(KeyStrategy::SignatureAndLeg),
            other => Err(format!("unknown key strategy '{other}' (expected signature or signature-leg)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DecodedSwapRecord {
        DecodedSwapRecord {
            signature: "5sig".to_string(),
            slot: 42,
            account: "Signer111".to_string(),
            input_mint: "So11111111111111111111111111111111111111112".to_string(),
            input_amount: u64::MAX,
            output_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            output_amount: 25_000_000,
        }
    }

    #[test]
    fn test_fields_keep_exact_amounts() {
        let fields = record().fields();
        assert!(fields.contains(&("input_amount", "18446744073709551615".to_string())));
        assert!(fields.contains(&("output_amount", "25000000".to_string())));
        assert!(fields.contains(&("slot", "42".to_string())));
    }

    #[test]
    fn test_json_keeps_u64_precision() {
        let json = record().to_json().unwrap();
        assert!(json.contains("\"input_amount\":18446744073709551615"));
        assert_eq!(DecodedSwapRecord::from_json(&json).unwrap(), record());
    }

    #[test]
    fn test_key_strategy_signature() {
        assert_eq!(KeyStrategy::Signature.key(&record(), 3), "5sig");
    }

    #[test]
    fn test_key_strategy_signature_and_leg() {
        assert_eq!(KeyStrategy::SignatureAndLeg.key(&record(), 3), "5sig:3");
    }

    #[test]
    fn test_key_strategy_parse() {
        assert_eq!("signature".parse::<KeyStrategy>(), Ok(KeyStrategy::Signature));
        assert_eq!("signature-leg".parse::<KeyStrategy>(), Ok(KeyStrategy::SignatureAndLeg));
        assert!("leg".parse::<KeyStrategy>().is_err());
        assert_eq!(KeyStrategy::default().to_string(), "signature");
    }
}
