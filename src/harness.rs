use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{error, info, warn};
use solana_sdk::{hash::Hash, signature::Keypair};

use crate::{
    metrics::TransactionRecord,
    pubsub::{SubscriptionEntry, SubscriptionManager, SubscriptionStatus},
    traits::{Submitter, TransactionBuilder},
    workers::SlotClock,
};

#[derive(Clone, Copy, Debug)]
pub struct DispatchConfig {
    pub tx_count: usize,
    /// tx(s) per second
    pub rate_limit: u64,
    pub cu_num: u32,
    pub cu_price: u64,
}

impl DispatchConfig {
    /// Pause between two sends, the actual rate is lower when sending itself is slow
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_limit.max(1) as f64)
    }
}

/// Sends `tx_count` transactions at `rate_limit` and records the slot each one landed in
pub struct DispatchHarness {
    config: DispatchConfig,
    payer: Keypair,
    builder: Arc<dyn TransactionBuilder>,
    submitter: Arc<dyn Submitter>,
    subscriptions: SubscriptionManager,
    slot_clock: SlotClock,
}

impl DispatchHarness {
    pub fn new(
        config: DispatchConfig,
        payer: Keypair,
        builder: Arc<dyn TransactionBuilder>,
        submitter: Arc<dyn Submitter>,
        subscriptions: SubscriptionManager,
        slot_clock: SlotClock,
    ) -> Self {
        Self {
            config,
            payer,
            builder,
            submitter,
            subscriptions,
            slot_clock,
        }
    }

    /// Dispatches every transaction, then waits for all subscriptions to settle.
    ///
    /// Failed sends are skipped. If the subscription worker dies the records collected so far
    /// are returned without landing slots.
    pub async fn run(self, blockhash: Hash) -> Vec<TransactionRecord> {
        let DispatchConfig {
            tx_count,
            cu_num,
            cu_price,
            ..
        } = self.config;
        let send_interval = self.config.send_interval();

        info!(
            "Sending {tx_count} tx(s) every {}ms",
            send_interval.as_millis()
        );

        let mut records = Vec::with_capacity(tx_count);

        for _ in 0..tx_count {
            let start_slot = self.slot_clock.current();
            let tx = self.builder.build(&self.payer, cu_num, cu_price, blockhash);

            match self.submitter.submit(&tx).await {
                Ok(signature) => {
                    info!("send tx {signature} at slot {start_slot}");

                    let signature = signature.to_string();
                    if let Err(err) = self.subscriptions.subscribe(signature.clone()).await {
                        error!("Stopping dispatch, can not subscribe to {signature}: {err}");
                        return records;
                    }
                    records.push(TransactionRecord::new(start_slot, signature));
                }
                Err(err) => warn!("{err:?}"),
            }

            tokio::time::sleep(send_interval).await;
        }

        info!(
            "Sent {} tx(s), waiting on {} subscription(s)",
            records.len(),
            self.subscriptions.pending_count()
        );

        if let Err(err) = self.subscriptions.wait_until_settled().await {
            error!("Subscriptions did not settle: {err}");
            return records;
        }

        match self.subscriptions.snapshot().await {
            Ok(entries) => apply_landing_slots(&mut records, &entries),
            Err(err) => error!("Error reading subscriptions: {err}"),
        }

        records
    }
}

/// Copies the slot of every processed subscription onto the record with the same signature
pub fn apply_landing_slots(records: &mut [TransactionRecord], entries: &[SubscriptionEntry]) {
    let by_signature = records
        .iter()
        .enumerate()
        .map(|(index, record)| (record.signature.clone(), index))
        .collect::<HashMap<_, _>>();

    for entry in entries {
        if entry.status != SubscriptionStatus::Done {
            continue;
        }
        let Some(result) = &entry.result else {
            continue;
        };
        let Some(index) = by_signature.get(&entry.target) else {
            continue;
        };

        info!("signature {} confirmed at slot {}", entry.target, result.slot);
        records[*index].land_slot = Some(result.slot);
    }
}
