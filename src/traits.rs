//! Seams between the harness and the network.

use async_trait::async_trait;
use solana_sdk::{
    clock::Slot, hash::Hash, signature::Keypair, signature::Signature, transaction::Transaction,
};

pub trait TransactionBuilder: Send + Sync {
    fn build(&self, payer: &Keypair, cu_num: u32, cu_price: u64, blockhash: Hash) -> Transaction;
}

#[async_trait]
pub trait Submitter: Send + Sync {
    /// Sends an already signed transaction.
    /// Retries happen inside the implementation, an `Err` means they were exhausted.
    async fn submit(&self, transaction: &Transaction) -> anyhow::Result<Signature>;
}

#[async_trait]
pub trait ChainPositionProvider: Send + Sync {
    async fn current_slot(&self) -> anyhow::Result<Slot>;
}
