pub mod equipment_record;
pub mod upload_summary;
pub mod user;
