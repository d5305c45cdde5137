//! Upload-independent building blocks: parsing equipment files, computing
//! their statistics, rendering reports and storing the original files.

pub mod config;
pub mod equipment;
pub mod report;
pub mod stats;
pub mod storage;

pub use equipment::{EquipmentRow, MalformedInput, parse_equipment_csv};
pub use stats::{Aggregates, TypeDistribution, UploadStats, aggregate};
