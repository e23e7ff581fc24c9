//! Unsigned transaction bytes for sign requests
//!
//! The wallet fills in the signatures, so the transaction is sent in its
//! normal wire format with every required signature slot left empty.

use solana_sdk::{signature::Signature, transaction::Transaction};

use crate::error::{Result, WalletLinkError};

/// Wire bytes of `transaction` with all signatures cleared
pub fn serialize_unsigned_transaction(transaction: &Transaction) -> Result<Vec<u8>> {
    let mut unsigned = transaction.clone();
    let required = unsigned.message.header.num_required_signatures as usize;
    unsigned.signatures = vec![Signature::default(); required];

    bincode::serialize(&unsigned).map_err(|e| WalletLinkError::Transaction(e.to_string()))
}
