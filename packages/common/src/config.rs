use std::path::PathBuf;

use serde::Deserialize;

/// Storage configuration for original upload files.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding uploaded files. Default: "./data/uploads".
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Largest accepted upload in bytes. Default: 10 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/uploads")
}
fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_upload_size: default_max_upload_size(),
        }
    }
}
