use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};

use super::store::UploadStore;
use crate::entity::upload_summary;

/// Trim the owner's history to the `keep` most recent uploads.
///
/// Returns the removed summaries so the caller can drop their blobs once the
/// surrounding transaction has committed. Must run under the owner lock.
///
/// Age is the insertion sequence (`id`), not `created_at`, so a wall clock
/// stepping backwards cannot evict a newer upload.
pub async fn enforce<C>(
    conn: &C,
    owner_id: i32,
    keep: u64,
) -> Result<Vec<upload_summary::Model>, DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let excess: Vec<_> = upload_summary::Entity::find()
        .filter(upload_summary::Column::OwnerId.eq(owner_id))
        .order_by_desc(upload_summary::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .skip(keep as usize)
        .collect();

    if excess.is_empty() {
        return Ok(excess);
    }

    let ids: Vec<i32> = excess.iter().map(|s| s.id).collect();
    UploadStore::new(conn).delete_cascade(&ids).await?;

    tracing::debug!(owner_id, trimmed = ?ids, "Trimmed upload history");
    Ok(excess)
}
