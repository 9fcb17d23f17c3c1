use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use landing_bench::{
    cli::Args,
    client::{BenchClient, ComputeBudgetTransfer},
    harness::DispatchHarness,
    metrics::{append_summary, save_records, MetricsAggregator},
    pubsub::SubscriptionManager,
    traits::ChainPositionProvider,
    workers::SlotClock,
    DEFAULT_SLOT_REFRESH_MS, DEFAULT_SLOT_TICK_MS,
};
use log::info;
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signer::Signer;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    // before parsing, the .env file feeds the env fallbacks of the args
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let payer = args.payer_keypair()?;
    info!("Payer {}", payer.pubkey());

    let commitment_config = args.commitment_config();
    let rpc_client = Arc::new(BenchClient::new(
        RpcClient::new_with_commitment(args.rpc_addr.clone(), commitment_config),
        args.node_retries,
    ));
    let send_client = Arc::new(BenchClient::new(
        RpcClient::new_with_commitment(args.send_rpc_addr(), commitment_config),
        args.node_retries,
    ));

    let blockhash = rpc_client
        .get_latest_blockhash()
        .await
        .context("Error fetching latest blockhash")?;
    let slot = rpc_client.current_slot().await?;
    info!("Starting at slot {slot} with blockhash {blockhash}");

    let slot_clock = SlotClock::new(slot);
    // both run until the process exits
    let _ticker = slot_clock
        .clone()
        .start_ticker(Duration::from_millis(DEFAULT_SLOT_TICK_MS));
    let _refresher = slot_clock.clone().start_refresher(
        rpc_client.clone(),
        Duration::from_millis(DEFAULT_SLOT_REFRESH_MS),
    );

    let (subscriptions, _subscription_worker) =
        SubscriptionManager::start(args.subscription_config());

    let harness = DispatchHarness::new(
        args.dispatch_config(),
        payer,
        Arc::new(ComputeBudgetTransfer),
        send_client,
        subscriptions,
        slot_clock,
    );

    let records = harness.run(blockhash).await;

    let (landed, metric) = MetricsAggregator::new(args.tx_count).aggregate(records);

    save_records(&args.output_file, &landed)?;
    info!("Saved {} landed tx(s) to {}", landed.len(), args.output_file);

    info!("{metric}");
    append_summary(&args.metrics_file_name, &metric)?;

    Ok(())
}
