use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Aggregate record for one uploaded equipment file.
///
/// Written once, together with its equipment records, and never updated.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_summary")]
pub struct Model {
    /// Auto-increment; doubles as the creation sequence. Retention orders by it
    /// and history uses it to break `created_at` ties.
    #[sea_orm(primary_key)]
    pub id: i32,

    /// NULL only for rows that predate per-user history.
    pub owner_id: Option<i32>,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: BelongsTo<Option<super::user::Entity>>,

    /// Blob store key of the original file (`<uuid>/<filename>`).
    pub source_path: String,
    pub filename: String,

    pub total_count: i32,
    /// NULL when `total_count` is 0.
    pub avg_flowrate: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub avg_temperature: Option<f64>,

    #[sea_orm(has_many)]
    pub equipment: HasMany<super::equipment_record::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn stats(&self) -> common::UploadStats {
        common::UploadStats {
            total_count: self.total_count.max(0) as u64,
            avg_flowrate: self.avg_flowrate,
            avg_pressure: self.avg_pressure,
            avg_temperature: self.avg_temperature,
        }
    }
}
