use const_env::from_env;
use solana_sdk::commitment_config::CommitmentLevel;

pub mod cli;
pub mod client;
pub mod errors;
pub mod harness;
pub mod metrics;
pub mod pubsub;
pub mod traits;
pub mod workers;

#[from_env]
pub const DEFAULT_RPC_ADDR: &str = "http://127.0.0.1:8899";
#[from_env]
pub const DEFAULT_TX_COUNT: usize = 100;
#[from_env]
pub const DEFAULT_RATE_LIMIT: u64 = 10;
#[from_env]
pub const DEFAULT_NODE_RETRIES: usize = 0;
#[from_env]
pub const DEFAULT_CU_NUM: u32 = 10_000;
#[from_env]
pub const DEFAULT_CU_PRICE: u64 = 1;
#[from_env]
pub const DEFAULT_MAX_SUBSCRIPTION_TIME_MS: u64 = 60 * 1000;
#[from_env]
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 30 * 1000;
#[from_env]
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 5 * 1000;
#[from_env]
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10 * 1000;
/// optimistic slot advance, roughly one slot
#[from_env]
pub const DEFAULT_SLOT_TICK_MS: u64 = 420;
#[from_env]
pub const DEFAULT_SLOT_REFRESH_MS: u64 = 5 * 1000;
pub const DEFAULT_COMMITMENT: CommitmentLevel = CommitmentLevel::Confirmed;
