use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};

use crate::entity::{equipment_record, upload_summary, user};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    if db_url.starts_with("sqlite:") {
        // A single long-lived connection: SQLite serializes writers anyway and
        // `sqlite::memory:` databases vanish with their connection.
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(100)
            .min_connections(5)
            .idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8));
    }
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    create_schema(&db).await?;

    Ok(db)
}

/// Create any missing tables. Existing tables are left untouched.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    // Referenced tables first.
    create_table(db, user::Entity).await?;
    create_table(db, upload_summary::Entity).await?;
    create_table(db, equipment_record::Entity).await?;

    let history_idx = Index::create()
        .if_not_exists()
        .name("idx_upload_summary_owner_created")
        .table(upload_summary::Entity)
        .col(upload_summary::Column::OwnerId)
        .col(upload_summary::Column::CreatedAt)
        .to_owned();
    db.execute_raw(backend.build(&history_idx)).await?;

    let records_idx = Index::create()
        .if_not_exists()
        .name("idx_equipment_record_upload")
        .table(equipment_record::Entity)
        .col(equipment_record::Column::UploadId)
        .to_owned();
    db.execute_raw(backend.build(&records_idx)).await?;

    Ok(())
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute_raw(backend.build(&stmt)).await?;
    Ok(())
}
