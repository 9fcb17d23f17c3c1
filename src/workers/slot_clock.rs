use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use log::{info, warn};
use solana_sdk::clock::Slot;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::traits::ChainPositionProvider;

/// Best guess of the current slot.
///
/// Advanced optimistically by a local ticker between authoritative refreshes;
/// a refresh never moves the slot backwards.
#[derive(Clone)]
pub struct SlotClock {
    slot: Arc<AtomicU64>,
}

impl SlotClock {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot: Arc::new(AtomicU64::new(slot)),
        }
    }

    pub fn current(&self) -> Slot {
        self.slot.load(Ordering::Relaxed)
    }

    pub fn tick(&self) {
        self.slot.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply an authoritative slot
    pub fn observe(&self, slot: Slot) {
        self.slot.fetch_max(slot, Ordering::Relaxed);
    }

    pub fn start_ticker(self, tick: Duration) -> JoinHandle<anyhow::Result<()>> {
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        #[allow(unreachable_code)]
        tokio::spawn(async move {
            info!("Advancing slot every {}ms", tick.as_millis());

            loop {
                ticker.tick().await;
                self.tick();
            }

            // to give the correct type to JoinHandle
            Ok(())
        })
    }

    pub fn start_refresher(
        self,
        provider: Arc<dyn ChainPositionProvider>,
        refresh: Duration,
    ) -> JoinHandle<anyhow::Result<()>> {
        let mut refresher = interval_at(Instant::now() + refresh, refresh);
        refresher.set_missed_tick_behavior(MissedTickBehavior::Delay);

        #[allow(unreachable_code)]
        tokio::spawn(async move {
            info!("Refreshing slot every {}ms", refresh.as_millis());

            loop {
                refresher.tick().await;

                match provider.current_slot().await {
                    Ok(slot) => self.observe(slot),
                    Err(err) => warn!("{err:?}"),
                }
            }

            Ok(())
        })
    }
}
