//! Wire encoding of transactions exchanged with wallets

use base64::Engine;
use solana_sdk::transaction::Transaction;

use crate::core::{LaunchError, LaunchResult};

/// Serialize a transaction (signed or not) to base64 bincode
pub fn encode_transaction(transaction: &Transaction) -> LaunchResult<String> {
    let bytes = bincode::serialize(transaction)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Parse a base64 bincode transaction as returned by a wallet
pub fn decode_transaction(encoded: &str) -> LaunchResult<Transaction> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    let transaction: Transaction = bincode::deserialize(&bytes)
        .map_err(|e| LaunchError::InvalidTransaction(format!("malformed transaction: {}", e)))?;
    if transaction.signatures.len() != transaction.message.header.num_required_signatures as usize {
        return Err(LaunchError::InvalidTransaction(format!(
            "expected {} signature slots, found {}",
            transaction.message.header.num_required_signatures,
            transaction.signatures.len()
        )));
    }
    Ok(transaction)
}
