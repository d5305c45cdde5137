//! Upload ingestion, per-user history and report rendering.

pub mod pipeline;
pub mod retention;
pub mod store;

pub use pipeline::{UploadOutcome, render_report, submit_upload};
pub use store::{NewUpload, UploadStore};
