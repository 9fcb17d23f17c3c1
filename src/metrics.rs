use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use bench_utils::metrics::SlotCostMetric;
use serde::{Deserialize, Serialize};
use solana_sdk::clock::Slot;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// slot observed when the tx was sent
    pub start_slot: Slot,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub land_slot: Option<Slot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_cost: Option<u64>,
}

impl TransactionRecord {
    pub fn new(start_slot: Slot, signature: String) -> Self {
        Self {
            start_slot,
            signature,
            land_slot: None,
            slot_cost: None,
        }
    }

    /// `None` unless the tx landed strictly after it was sent
    pub fn positive_slot_cost(&self) -> Option<u64> {
        self.land_slot?
            .checked_sub(self.start_slot)
            .filter(|slot_cost| *slot_cost > 0)
    }
}

pub struct MetricsAggregator {
    txs_planned: usize,
}

impl MetricsAggregator {
    pub fn new(txs_planned: usize) -> Self {
        Self { txs_planned }
    }

    /// Keeps the records that landed after they were sent and fills in their slot cost.
    /// The landing rate is relative to the planned count, not to the records passed in.
    pub fn aggregate(
        &self,
        records: Vec<TransactionRecord>,
    ) -> (Vec<TransactionRecord>, SlotCostMetric) {
        let mut metric = SlotCostMetric::new(self.txs_planned as u64);

        let landed = records
            .into_iter()
            .filter_map(|mut record| {
                let slot_cost = record.positive_slot_cost()?;
                record.slot_cost = Some(slot_cost);
                metric.add_landed_transaction(slot_cost);
                Some(record)
            })
            .collect::<Vec<_>>();

        metric.finalize();

        (landed, metric)
    }
}

pub fn save_records(path: impl AsRef<Path>, records: &[TransactionRecord]) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Error creating {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .with_context(|| format!("Error writing records to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Error flushing {}", path.display()))
}

pub fn load_records(path: impl AsRef<Path>) -> anyhow::Result<Vec<TransactionRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Error opening {}", path.display()))?;

    serde_json::from_reader(file).with_context(|| format!("Error reading {}", path.display()))
}

/// Appends one summary row, writing the header only for a new file
pub fn append_summary(path: impl AsRef<Path>, metric: &SlotCostMetric) -> anyhow::Result<()> {
    let path = path.as_ref();
    let has_headers = !path.exists();

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Error opening {}", path.display()))?;

    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(has_headers)
        .from_writer(file);
    csv_writer.serialize(metric)?;
    csv_writer.flush()?;

    Ok(())
}
