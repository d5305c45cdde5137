use common::report::{ReportLayout, ReportSummary};
use common::storage::{BlobKey, BlobStore};
use common::{Aggregates, EquipmentRow, aggregate, parse_equipment_csv};
use sea_orm::{DatabaseTransaction, DbErr, TransactionTrait};
use tracing::{Span, instrument};

use super::retention;
use super::store::{NewUpload, UploadStore};
use crate::entity::upload_summary;
use crate::error::AppError;
use crate::state::AppState;

/// Returned to the client when the new upload committed but older ones could
/// not be trimmed.
pub const RETENTION_FAILED: &str =
    "PERSISTENCE_ERROR: older uploads could not be trimmed, retrying on the next upload";

/// A committed upload.
#[derive(Debug)]
pub struct UploadOutcome {
    pub summary: upload_summary::Model,
    pub aggregates: Aggregates,
    pub rows: Vec<EquipmentRow>,
    /// Set when history trimming failed. The upload itself is stored.
    pub retention_error: Option<String>,
}

/// Parse, aggregate and store one equipment file for `owner_id`, then trim
/// the owner's history.
///
/// Malformed input is rejected before anything is written. A database failure
/// leaves neither a summary nor a blob behind.
#[instrument(skip(state, data), fields(upload_id = tracing::field::Empty))]
pub async fn submit_upload(
    state: &AppState,
    owner_id: i32,
    filename: &str,
    data: &[u8],
) -> Result<UploadOutcome, AppError> {
    let rows = parse_equipment_csv(data)?;
    let aggregates = aggregate(&rows);

    let key = BlobKey::for_upload(filename)?;
    state.blob_store.put(&key, data).await?;

    let (summary, trimmed, retention_error) =
        match persist(state, owner_id, &key, &aggregates, &rows).await {
            Ok(committed) => committed,
            Err(e) => {
                discard_blob(&*state.blob_store, &key).await;
                return Err(e);
            }
        };

    Span::current().record("upload_id", summary.id);
    tracing::info!(
        rows = rows.len(),
        trimmed = trimmed.len(),
        "Upload committed"
    );

    for old in &trimmed {
        match BlobKey::parse(&old.source_path) {
            Ok(old_key) => discard_blob(&*state.blob_store, &old_key).await,
            Err(e) => tracing::warn!(
                upload_id = old.id,
                source_path = %old.source_path,
                error = %e,
                "Trimmed upload has an unusable blob key"
            ),
        }
    }

    Ok(UploadOutcome {
        summary,
        aggregates,
        rows,
        retention_error,
    })
}

/// Everything that must commit together: owner lock, summary, records and
/// (best effort) the history trim.
async fn persist(
    state: &AppState,
    owner_id: i32,
    key: &BlobKey,
    aggregates: &Aggregates,
    rows: &[EquipmentRow],
) -> Result<
    (
        upload_summary::Model,
        Vec<upload_summary::Model>,
        Option<String>,
    ),
    AppError,
> {
    let txn = state.db.begin().await?;
    let store = UploadStore::new(&txn);

    store.lock_owner(owner_id).await?;
    let summary = store
        .create(NewUpload {
            owner_id,
            filename: key.filename(),
            source_path: key.as_str(),
            stats: &aggregates.stats,
            rows,
        })
        .await?;

    let (trimmed, retention_error) =
        match trim_history(&txn, owner_id, state.config.history.keep).await {
            Ok(trimmed) => (trimmed, None),
            Err(e) => {
                tracing::warn!(error = %e, "History trim failed, keeping the new upload");
                (Vec::new(), Some(RETENTION_FAILED.to_string()))
            }
        };

    txn.commit().await?;
    Ok((summary, trimmed, retention_error))
}

/// Run retention in a savepoint so a failed trim does not take the new
/// upload down with it.
async fn trim_history(
    txn: &DatabaseTransaction,
    owner_id: i32,
    keep: u64,
) -> Result<Vec<upload_summary::Model>, DbErr> {
    let savepoint = txn.begin().await?;
    match retention::enforce(&savepoint, owner_id, keep).await {
        Ok(trimmed) => {
            savepoint.commit().await?;
            Ok(trimmed)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}

async fn discard_blob(store: &dyn BlobStore, key: &BlobKey) {
    if let Err(e) = store.delete(key).await {
        tracing::warn!(key = %key, error = %e, "Failed to delete upload blob");
    }
}

/// Render the PDF report of one of the owner's uploads.
#[instrument(skip(state))]
pub async fn render_report(
    state: &AppState,
    owner_id: i32,
    upload_id: i32,
) -> Result<Vec<u8>, AppError> {
    let (summary, records) = UploadStore::new(&state.db)
        .load_with_records(upload_id, owner_id)
        .await?;

    let report = ReportSummary {
        upload_id: summary.id,
        created_at: summary.created_at,
        stats: summary.stats(),
    };
    let rows: Vec<EquipmentRow> = records.into_iter().map(EquipmentRow::from).collect();

    Ok(ReportLayout::build(&report, &rows).to_pdf()?)
}
