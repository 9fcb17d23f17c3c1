use std::ops::Deref;

use anyhow::Context;
use async_trait::async_trait;
use bench_utils::helpers::create_transaction;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    clock::Slot, hash::Hash, signature::Keypair, signature::Signature, transaction::Transaction,
};

use crate::traits::{ChainPositionProvider, Submitter, TransactionBuilder};

/// Rpc client used both to send transactions and to read the current slot
pub struct BenchClient {
    rpc_client: RpcClient,
    send_config: RpcSendTransactionConfig,
}

impl Deref for BenchClient {
    type Target = RpcClient;

    fn deref(&self) -> &Self::Target {
        &self.rpc_client
    }
}

impl BenchClient {
    /// Transactions skip preflight and ask the rpc node to retry them `max_retries` times
    pub fn new(rpc_client: RpcClient, max_retries: usize) -> Self {
        Self {
            rpc_client,
            send_config: RpcSendTransactionConfig {
                skip_preflight: true,
                max_retries: Some(max_retries),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl Submitter for BenchClient {
    async fn submit(&self, transaction: &Transaction) -> anyhow::Result<Signature> {
        self.send_transaction_with_config(transaction, self.send_config)
            .await
            .with_context(|| format!("Error sending tx to {}", self.url()))
    }
}

#[async_trait]
impl ChainPositionProvider for BenchClient {
    async fn current_slot(&self) -> anyhow::Result<Slot> {
        self.get_slot_with_commitment(self.commitment())
            .await
            .context("Error fetching slot")
    }
}

/// Zero lamport transfer with compute budget instructions
pub struct ComputeBudgetTransfer;

impl TransactionBuilder for ComputeBudgetTransfer {
    fn build(&self, payer: &Keypair, cu_num: u32, cu_price: u64, blockhash: Hash) -> Transaction {
        create_transaction(payer, cu_num, cu_price, blockhash)
    }
}
