use chrono::{DateTime, Utc};
use common::report::DATE_FORMAT;
use common::{EquipmentRow, TypeDistribution, UploadStats};
use serde::Serialize;

use crate::entity::upload_summary;
use crate::uploads::UploadOutcome;

/// Response for a stored upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    /// Upload ID, used to request the report.
    #[schema(example = 17)]
    pub id: i32,
    /// Sanitized original filename.
    #[schema(example = "sample_equipment_data.csv")]
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub stats: UploadStats,
    /// Row count per equipment type.
    #[schema(value_type = Object, example = json!({"Pump": 2, "Valve": 1}))]
    pub distribution: TypeDistribution,
    /// Parsed rows in file order.
    pub rows: Vec<EquipmentRow>,
    /// Set when the upload was stored but older history could not be trimmed.
    #[schema(example = json!(null))]
    pub retention_error: Option<String>,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            id: outcome.summary.id,
            filename: outcome.summary.filename,
            created_at: outcome.summary.created_at,
            stats: outcome.aggregates.stats,
            distribution: outcome.aggregates.distribution,
            rows: outcome.rows,
            retention_error: outcome.retention_error,
        }
    }
}

/// One entry of the upload history.
#[derive(Serialize, utoipa::ToSchema)]
pub struct HistoryEntry {
    #[schema(example = 17)]
    pub id: i32,
    #[schema(example = "sample_equipment_data.csv")]
    pub filename: String,
    /// `created_at` formatted for display.
    #[schema(example = "2025-01-31 02:45 PM")]
    pub date: String,
    pub created_at: DateTime<Utc>,
    /// Number of equipment rows.
    #[schema(example = 15)]
    pub count: i32,
    #[schema(example = 119.8)]
    pub avg_flowrate: Option<f64>,
    #[schema(example = 6.11)]
    pub avg_pressure: Option<f64>,
    #[schema(example = 117.47)]
    pub avg_temperature: Option<f64>,
}

impl From<upload_summary::Model> for HistoryEntry {
    fn from(model: upload_summary::Model) -> Self {
        Self {
            id: model.id,
            filename: model.filename,
            date: model.created_at.format(DATE_FORMAT).to_string(),
            created_at: model.created_at,
            count: model.total_count,
            avg_flowrate: model.avg_flowrate,
            avg_pressure: model.avg_pressure,
            avg_temperature: model.avg_temperature,
        }
    }
}

/// The caller's most recent uploads, newest first.
#[derive(Serialize, utoipa::ToSchema)]
pub struct HistoryResponse {
    pub uploads: Vec<HistoryEntry>,
}
