//! Geyser Source
//!
//! Live transaction feed over a Yellowstone gRPC subscription. Each
//! transaction update is converted into a [`RawTransaction`], with loaded
//! address-table keys appended after the static keys (writable, then
//! readonly). The subscription is not re-established once the stream ends.

use std::any::Any;
use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use solana_pubkey::Pubkey;
use thiserror::Error;
use tracing::{info, warn};
use yellowstone_grpc_client::GeyserGrpcClient;
use yellowstone_grpc_proto::prelude::{
    subscribe_update::UpdateOneof, CommitmentLevel, SubscribeRequest,
    SubscribeRequestFilterTransactions, SubscribeUpdate, SubscribeUpdateTransaction,
};

use crate::source::{SourceError, SubscriptionFilter, TransactionSource};
use crate::transaction::{
    CompiledInstruction, InnerInstructionGroup, RawTransaction, Signature, SignatureError,
};

/// Errors converting a gRPC update into a [`RawTransaction`]
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Update is missing {0}")]
    MissingField(&'static str),

    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("Invalid account key at position {0}")]
    AccountKey(usize),
}

/// Build the subscribe request for `filter`
pub fn subscribe_request(filter: &SubscriptionFilter) -> SubscribeRequest {
    let mut transactions = HashMap::new();
    transactions.insert(
        "swaps".to_string(),
        SubscribeRequestFilterTransactions {
            vote: Some(false),
            failed: Some(filter.include_failed),
            account_include: vec![filter.program_id.to_string()],
            account_exclude: filter.exclude.iter().map(ToString::to_string).collect(),
            ..Default::default()
        },
    );

    SubscribeRequest {
        transactions,
        commitment: Some(CommitmentLevel::Confirmed as i32),
        ..Default::default()
    }
}

fn pubkeys<'a>(
    keys: impl Iterator<Item = &'a Vec<u8>>,
    offset: usize,
) -> Result<Vec<Pubkey>, ConversionError> {
    keys.enumerate()
        .map(|(i, bytes)| {
            Pubkey::try_from(bytes.as_slice()).map_err(|_| ConversionError::AccountKey(offset + i))
        })
        .collect()
}

/// Convert one transaction update
pub fn convert_transaction(update: SubscribeUpdateTransaction) -> Result<RawTransaction, ConversionError> {
    let info = update
        .transaction
        .ok_or(ConversionError::MissingField("transaction info"))?;
    let signature = Signature::try_from(info.signature.as_slice())?;
    let message = info
        .transaction
        .and_then(|tx| tx.message)
        .ok_or(ConversionError::MissingField("message"))?;

    let mut account_keys = pubkeys(message.account_keys.iter(), 0)?;
    let instructions = message
        .instructions
        .into_iter()
        .map(|ix| CompiledInstruction {
            program_id_index: ix.program_id_index,
            data: ix.data,
        })
        .collect();

    let mut inner_instructions = Vec::new();
    if let Some(meta) = info.meta {
        let loaded = meta
            .loaded_writable_addresses
            .iter()
            .chain(meta.loaded_readonly_addresses.iter());
        let offset = account_keys.len();
        account_keys.extend(pubkeys(loaded, offset)?);

        inner_instructions = meta
            .inner_instructions
            .into_iter()
            .map(|group| InnerInstructionGroup {
                index: group.index,
                instructions: group
                    .instructions
                    .into_iter()
                    .map(|ix| CompiledInstruction {
                        program_id_index: ix.program_id_index,
                        data: ix.data,
                    })
                    .collect(),
            })
            .collect();
    }

    Ok(RawTransaction {
        signature,
        slot: update.slot,
        account_keys,
        instructions,
        inner_instructions,
    })
}

/// A live Yellowstone subscription
pub struct GeyserSource {
    stream: BoxStream<'static, Result<SubscribeUpdate, String>>,
    // dropping the request sink closes the subscription
    _sink: Box<dyn Any + Send>,
}

impl GeyserSource {
    pub async fn connect(
        endpoint: &str,
        x_token: Option<String>,
        filter: &SubscriptionFilter,
    ) -> Result<Self, SourceError> {
        info!("Connecting to Geyser endpoint {}", endpoint);

        let mut client = GeyserGrpcClient::build_from_shared(endpoint.to_string())
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?
            .x_token(x_token)
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?
            .connect()
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        let (sink, stream) = client
            .subscribe_with_request(Some(subscribe_request(filter)))
            .await
            .map_err(|e| SourceError::SubscriptionFailed(e.to_string()))?;

        info!(program_id = %filter.program_id, "Geyser subscription established");

        Ok(Self {
            stream: stream.map(|item| item.map_err(|e| e.to_string())).boxed(),
            _sink: Box::new(sink),
        })
    }
}

#[async_trait]
impl TransactionSource for GeyserSource {
    async fn next_transaction(&mut self) -> Result<Option<RawTransaction>, SourceError> {
        while let Some(message) = self.stream.next().await {
            let update = message.map_err(SourceError::Stream)?;
            let Some(UpdateOneof::Transaction(tx)) = update.update_oneof else {
                continue;
            };
            match convert_transaction(tx) {
                Ok(tx) => return Ok(Some(tx)),
                Err(e) => warn!("Skipping unconvertible transaction update: {}", e),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yellowstone_grpc_proto::prelude::{
        CompiledInstruction as GrpcInstruction, InnerInstruction, InnerInstructions, Message,
        SubscribeUpdateTransactionInfo, Transaction, TransactionStatusMeta,
    };

    fn key_bytes(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    fn update(meta: Option<TransactionStatusMeta>) -> SubscribeUpdateTransaction {
        SubscribeUpdateTransaction {
            transaction: Some(SubscribeUpdateTransactionInfo {
                signature: vec![9; 64],
                transaction: Some(Transaction {
                    message: Some(Message {
                        account_keys: vec![key_bytes(1), key_bytes(0xAA)],
                        instructions: vec![GrpcInstruction {
                            program_id_index: 1,
                            accounts: vec![0],
                            data: vec![1, 2, 3],
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                meta,
                ..Default::default()
            }),
            slot: 42,
        }
    }

    #[test]
    fn test_subscribe_request_filter() {
        let filter = SubscriptionFilter {
            program_id: Pubkey::new_from_array([0xAA; 32]),
            exclude: vec![Pubkey::new_from_array([3; 32])],
            include_failed: true,
        };
        let request = subscribe_request(&filter);
        let tx_filter = &request.transactions["swaps"];

        assert_eq!(tx_filter.vote, Some(false));
        assert_eq!(tx_filter.failed, Some(true));
        assert_eq!(tx_filter.account_include, vec![filter.program_id.to_string()]);
        assert_eq!(tx_filter.account_exclude.len(), 1);
        assert_eq!(request.commitment, Some(CommitmentLevel::Confirmed as i32));
    }

    #[test]
    fn test_convert_without_meta() {
        let tx = convert_transaction(update(None)).unwrap();

        assert_eq!(tx.slot, 42);
        assert_eq!(tx.signature, Signature::new([9; 64]));
        assert_eq!(tx.account_keys.len(), 2);
        assert_eq!(tx.instructions[0].program_id_index, 1);
        assert_eq!(tx.instructions[0].data, vec![1, 2, 3]);
        assert!(tx.inner_instructions.is_empty());
    }

    #[test]
    fn test_convert_appends_loaded_addresses_and_inner() {
        let meta = TransactionStatusMeta {
            loaded_writable_addresses: vec![key_bytes(5)],
            loaded_readonly_addresses: vec![key_bytes(6)],
            inner_instructions: vec![InnerInstructions {
                index: 0,
                instructions: vec![InnerInstruction {
                    program_id_index: 1,
                    data: vec![7; 20],
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };
        let tx = convert_transaction(update(Some(meta))).unwrap();

        assert_eq!(tx.account_keys.len(), 4);
        assert_eq!(tx.account_keys[2], Pubkey::new_from_array([5; 32]));
        assert_eq!(tx.account_keys[3], Pubkey::new_from_array([6; 32]));
        assert_eq!(tx.inner_instructions[0].instructions[0].data, vec![7; 20]);
    }

    #[test]
    fn test_convert_rejects_bad_key() {
        let mut bad = update(None);
        if let Some(message) = bad
            .transaction
            .as_mut()
            .and_then(|info| info.transaction.as_mut())
            .and_then(|tx| tx.message.as_mut())
        {
            message.account_keys.push(vec![1, 2, 3]);
        }
        assert!(matches!(
            convert_transaction(bad),
            Err(ConversionError::AccountKey(2))
        ));
    }

    #[test]
    fn test_convert_requires_info() {
        let empty = SubscribeUpdateTransaction {
            transaction: None,
            slot: 1,
        };
        assert!(matches!(
            convert_transaction(empty),
            Err(ConversionError::MissingField(_))
        ));
    }
}
