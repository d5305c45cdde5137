use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "equipment_record")]
pub struct Model {
    /// Auto-increment; ascending id is the order rows appeared in the file.
    #[sea_orm(primary_key)]
    pub id: i32,

    pub upload_id: i32,
    #[sea_orm(belongs_to, from = "upload_id", to = "id")]
    pub upload: HasOne<super::upload_summary::Entity>,

    pub name: String,
    pub eq_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for common::EquipmentRow {
    fn from(model: Model) -> Self {
        Self {
            equipment_name: model.name,
            eq_type: model.eq_type,
            flowrate: model.flowrate,
            pressure: model.pressure,
            temperature: model.temperature,
        }
    }
}
