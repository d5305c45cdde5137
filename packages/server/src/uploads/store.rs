use chrono::{DateTime, SubsecRound, Utc};
use common::{EquipmentRow, UploadStats};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionSession, TransactionTrait, sea_query::LockType,
};

use crate::entity::{equipment_record, upload_summary, user};
use crate::error::AppError;

/// Rows per multi-row INSERT. Six bound parameters each keeps every chunk
/// well under the SQLite and Postgres parameter limits.
const INSERT_CHUNK: usize = 500;

/// Everything needed to persist one parsed upload.
pub struct NewUpload<'r> {
    pub owner_id: i32,
    pub filename: &'r str,
    pub source_path: &'r str,
    pub stats: &'r UploadStats,
    pub rows: &'r [EquipmentRow],
}

/// Owner-scoped access to upload summaries and their equipment records.
///
/// Works on a pool or inside a transaction; writes open a nested transaction
/// (a savepoint when `C` is already a transaction).
pub struct UploadStore<'a, C: ConnectionTrait + TransactionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait> UploadStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Lock the owner's `user` row until the enclosing transaction ends.
    ///
    /// Serializes concurrent uploads by one owner. SQLite has no row locks and
    /// serializes writers on its own, so the lock clause is omitted there.
    pub async fn lock_owner(&self, owner_id: i32) -> Result<(), AppError> {
        user::Entity::find_by_id(owner_id)
            .lock(LockType::Update)
            .one(self.conn)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Insert a summary and all of its equipment records atomically.
    pub async fn create(&self, new: NewUpload<'_>) -> Result<upload_summary::Model, AppError> {
        let total_count = i32::try_from(new.stats.total_count)
            .map_err(|_| AppError::MalformedInput("too many rows in one upload".into()))?;

        let txn = self.conn.begin().await?;

        let summary = upload_summary::ActiveModel {
            owner_id: Set(Some(new.owner_id)),
            source_path: Set(new.source_path.to_string()),
            filename: Set(new.filename.to_string()),
            total_count: Set(total_count),
            avg_flowrate: Set(new.stats.avg_flowrate),
            avg_pressure: Set(new.stats.avg_pressure),
            avg_temperature: Set(new.stats.avg_temperature),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for chunk in new.rows.chunks(INSERT_CHUNK) {
            let models = chunk.iter().map(|row| equipment_record::ActiveModel {
                upload_id: Set(summary.id),
                name: Set(row.equipment_name.clone()),
                eq_type: Set(row.eq_type.clone()),
                flowrate: Set(row.flowrate),
                pressure: Set(row.pressure),
                temperature: Set(row.temperature),
                ..Default::default()
            });
            equipment_record::Entity::insert_many(models)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(summary)
    }

    /// Fetch a summary the owner can see.
    ///
    /// Absent and foreign ids are indistinguishable to the caller.
    pub async fn get(&self, id: i32, owner_id: i32) -> Result<upload_summary::Model, AppError> {
        upload_summary::Entity::find_by_id(id)
            .filter(upload_summary::Column::OwnerId.eq(owner_id))
            .one(self.conn)
            .await?
            .ok_or_else(not_found)
    }

    /// The owner's most recent summaries, newest first.
    pub async fn list_recent(
        &self,
        owner_id: i32,
        limit: u64,
    ) -> Result<Vec<upload_summary::Model>, DbErr> {
        upload_summary::Entity::find()
            .filter(upload_summary::Column::OwnerId.eq(owner_id))
            .order_by_desc(upload_summary::Column::CreatedAt)
            .order_by_desc(upload_summary::Column::Id)
            .limit(limit)
            .all(self.conn)
            .await
    }

    /// Equipment records of one upload in file order.
    pub async fn records(&self, upload_id: i32) -> Result<Vec<equipment_record::Model>, DbErr> {
        equipment_record::Entity::find()
            .filter(equipment_record::Column::UploadId.eq(upload_id))
            .order_by_asc(equipment_record::Column::Id)
            .all(self.conn)
            .await
    }

    /// Read a summary and its records as one consistent snapshot.
    pub async fn load_with_records(
        &self,
        id: i32,
        owner_id: i32,
    ) -> Result<(upload_summary::Model, Vec<equipment_record::Model>), AppError> {
        let txn = self.conn.begin().await?;
        let store = UploadStore::new(&txn);
        let summary = store.get(id, owner_id).await?;
        let records = store.records(summary.id).await?;
        txn.commit().await?;

        // A trim deleting this upload can be caught half-way on backends
        // without snapshot reads.
        if records.len() != summary.total_count as usize {
            tracing::debug!(
                upload_id = id,
                expected = summary.total_count,
                found = records.len(),
                "Upload is being deleted"
            );
            return Err(not_found());
        }
        Ok((summary, records))
    }

    /// Delete the given summaries and their records. Returns the number of
    /// summaries removed.
    pub async fn delete_cascade(&self, ids: &[i32]) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }

        let txn = self.conn.begin().await?;
        equipment_record::Entity::delete_many()
            .filter(equipment_record::Column::UploadId.is_in(ids.iter().copied()))
            .exec(&txn)
            .await?;
        let deleted = upload_summary::Entity::delete_many()
            .filter(upload_summary::Column::Id.is_in(ids.iter().copied()))
            .exec(&txn)
            .await?
            .rows_affected;
        txn.commit().await?;

        Ok(deleted)
    }
}

// Postgres keeps microseconds; truncate so the returned model matches what
// later reads see.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn not_found() -> AppError {
    AppError::NotFound("Upload not found".into())
}
