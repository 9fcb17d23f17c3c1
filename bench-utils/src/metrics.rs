use std::fmt::{self, Display};

/// Slot cost statistics of one run
///
/// `txs_planned` is the denominator of the landing rate, not the number of transactions
/// that were actually sent.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct SlotCostMetric {
    pub txs_planned: u64,
    pub txs_landed: u64,
    pub min_slot_cost: Option<u64>,
    pub max_slot_cost: Option<u64>,
    pub avg_slot_cost: Option<f64>,

    #[serde(skip_serializing)]
    total_slot_cost: u64,
}

impl SlotCostMetric {
    pub fn new(txs_planned: u64) -> Self {
        Self {
            txs_planned,
            ..Default::default()
        }
    }

    pub fn add_landed_transaction(&mut self, slot_cost: u64) {
        self.txs_landed += 1;
        self.total_slot_cost += slot_cost;

        self.min_slot_cost = Some(self.min_slot_cost.map_or(slot_cost, |min| min.min(slot_cost)));
        self.max_slot_cost = Some(self.max_slot_cost.map_or(slot_cost, |max| max.max(slot_cost)));
    }

    pub fn finalize(&mut self) {
        // average over nothing stays undefined
        if self.txs_landed > 0 {
            self.avg_slot_cost = Some(self.total_slot_cost as f64 / self.txs_landed as f64);
        }
    }

    pub fn landing_rate(&self) -> f64 {
        if self.txs_planned == 0 {
            return 0.0;
        }
        self.txs_landed as f64 / self.txs_planned as f64
    }
}

impl Display for SlotCostMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "landed {}/{}", self.txs_landed, self.txs_planned)?;

        match (self.min_slot_cost, self.max_slot_cost, self.avg_slot_cost) {
            (Some(min), Some(max), Some(avg)) => write!(
                f,
                ", min cost slot: {min}, max cost slot: {max}, avg cost slot: {avg:.2}"
            ),
            _ => write!(f, ", slot cost: no data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_avg() {
        let mut metric = SlotCostMetric::new(5);
        for cost in [3, 3, 5] {
            metric.add_landed_transaction(cost);
        }
        metric.finalize();

        assert_eq!(metric.txs_landed, 3);
        assert_eq!(metric.min_slot_cost, Some(3));
        assert_eq!(metric.max_slot_cost, Some(5));
        assert!((metric.avg_slot_cost.unwrap() - 11.0 / 3.0).abs() < 1e-9);
        assert!((metric.landing_rate() - 0.6).abs() < 1e-9);
        assert_eq!(
            metric.to_string(),
            "landed 3/5, min cost slot: 3, max cost slot: 5, avg cost slot: 3.67"
        );
    }

    #[test]
    fn nothing_landed() {
        let mut metric = SlotCostMetric::new(4);
        metric.finalize();

        assert_eq!(metric.min_slot_cost, None);
        assert_eq!(metric.max_slot_cost, None);
        assert_eq!(metric.avg_slot_cost, None);
        assert_eq!(metric.landing_rate(), 0.0);
        assert_eq!(metric.to_string(), "landed 0/4, slot cost: no data");
    }
}
