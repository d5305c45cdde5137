use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::equipment::EquipmentRow;

/// Row count per equipment type.
pub type TypeDistribution = BTreeMap<String, u64>;

/// Count and column means for one upload.
///
/// Averages are `None` when there are no rows: an empty file has no
/// measurements, which is different from measurements that average to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UploadStats {
    #[schema(example = 3)]
    pub total_count: u64,
    #[schema(example = 20.0)]
    pub avg_flowrate: Option<f64>,
    #[schema(example = 5.33)]
    pub avg_pressure: Option<f64>,
    #[schema(example = 100.17)]
    pub avg_temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub stats: UploadStats,
    pub distribution: TypeDistribution,
}

/// Running arithmetic mean.
///
/// Updated as `mean += (x - mean) / n` so that large finite inputs never
/// overflow an intermediate sum.
#[derive(Debug, Default, Clone, Copy)]
struct RunningMean {
    mean: f64,
    count: u64,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    fn finish(self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }
}

/// Compute the upload statistics and the per-type distribution.
pub fn aggregate(rows: &[EquipmentRow]) -> Aggregates {
    let mut flowrate = RunningMean::default();
    let mut pressure = RunningMean::default();
    let mut temperature = RunningMean::default();
    let mut distribution = TypeDistribution::new();

    for row in rows {
        flowrate.push(row.flowrate);
        pressure.push(row.pressure);
        temperature.push(row.temperature);
        *distribution.entry(row.eq_type.clone()).or_insert(0) += 1;
    }

    Aggregates {
        stats: UploadStats {
            total_count: rows.len() as u64,
            avg_flowrate: flowrate.finish(),
            avg_pressure: pressure.finish(),
            avg_temperature: temperature.finish(),
        },
        distribution,
    }
}
