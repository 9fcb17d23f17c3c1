use std::{path::PathBuf, time::Duration};

use anyhow::bail;
use bench_utils::helpers::{keypair_from_base58, keypair_from_file};
use clap::Parser;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    signature::Keypair,
};

use crate::{
    harness::DispatchConfig,
    pubsub::SubscriptionConfig,
    DEFAULT_CU_NUM, DEFAULT_CU_PRICE, DEFAULT_MAX_SUBSCRIPTION_TIME_MS, DEFAULT_NODE_RETRIES,
    DEFAULT_RATE_LIMIT, DEFAULT_RPC_ADDR, DEFAULT_TX_COUNT,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Rpc used to read slots and the blockhash
    #[arg(short, long, env = "RPC", default_value_t = String::from(DEFAULT_RPC_ADDR))]
    pub rpc_addr: String,
    /// Pubsub websocket, derived from the rpc address when absent
    #[arg(short, long, env = "WS_RPC")]
    pub ws_addr: Option<String>,
    /// Rpc the transactions are sent to, defaults to the rpc address
    #[arg(short, long, env = "SEND_TRANSACTION_RPC")]
    pub send_rpc_addr: Option<String>,
    /// Base58 encoded payer secret key
    #[arg(long, env = "SECRETKEY", hide_env_values = true)]
    pub secret_key: Option<String>,
    /// Payer keypair file, used when no secret key is given
    #[arg(short, long)]
    pub payer: Option<PathBuf>,
    /// Tx(s) sent per second
    #[arg(long, env = "RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub rate_limit: u64,
    /// Number of tx(s) sent
    #[arg(short = 'n', long, env = "TX_COUNT", default_value_t = DEFAULT_TX_COUNT)]
    pub tx_count: usize,
    /// Retries the rpc node does for each tx
    #[arg(long, env = "NODE_RETRIES", default_value_t = DEFAULT_NODE_RETRIES)]
    pub node_retries: usize,
    /// Compute unit limit of each tx
    #[arg(long, env = "CU_NUM", default_value_t = DEFAULT_CU_NUM)]
    pub cu_num: u32,
    /// Compute unit price of each tx (micro lamports)
    #[arg(long, env = "CU_PRICE", default_value_t = DEFAULT_CU_PRICE)]
    pub cu_price: u64,
    #[arg(short, long, env = "COMMITMENT", default_value = "confirmed")]
    pub commitment: CommitmentLevel,
    #[arg(long, env = "ENABLE_RECEIVED_NOTIFICATION", default_value_t = false)]
    pub enable_received_notification: bool,
    /// How long a signature subscription may stay pending (ms)
    #[arg(long, env = "MAX_SUBSCRIPTION_TIME", default_value_t = DEFAULT_MAX_SUBSCRIPTION_TIME_MS)]
    pub max_subscription_time_ms: u64,
    /// Landed tx(s) output file
    #[arg(short, long, default_value_t = String::from("data.json"))]
    pub output_file: String,
    /// Summary output file, one row per run
    #[arg(short, long, default_value_t = String::from("metrics.csv"))]
    pub metrics_file_name: String,
}

impl Args {
    pub fn ws_addr(&self) -> String {
        match &self.ws_addr {
            Some(ws_addr) => ws_addr.clone(),
            None => ws_addr_from_rpc(&self.rpc_addr),
        }
    }

    pub fn send_rpc_addr(&self) -> String {
        self.send_rpc_addr
            .clone()
            .unwrap_or_else(|| self.rpc_addr.clone())
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.commitment,
        }
    }

    pub fn payer_keypair(&self) -> anyhow::Result<Keypair> {
        match (&self.secret_key, &self.payer) {
            (Some(secret_key), _) => keypair_from_base58(secret_key),
            (None, Some(path)) => keypair_from_file(path),
            (None, None) => bail!("Either SECRETKEY or --payer is required"),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            tx_count: self.tx_count,
            rate_limit: self.rate_limit,
            cu_num: self.cu_num,
            cu_price: self.cu_price,
        }
    }

    pub fn subscription_config(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            commitment: self.commitment_config(),
            enable_received_notification: self.enable_received_notification,
            max_subscription_time: Duration::from_millis(self.max_subscription_time_ms),
            ..SubscriptionConfig::new(self.ws_addr())
        }
    }
}

/// `https://host` -> `wss://host`, `http://host` -> `ws://host`
pub fn ws_addr_from_rpc(rpc_addr: &str) -> String {
    if let Some(rest) = rpc_addr.strip_prefix("https") {
        format!("wss{rest}")
    } else if let Some(rest) = rpc_addr.strip_prefix("http") {
        format!("ws{rest}")
    } else {
        rpc_addr.to_string()
    }
}
