use std::fmt;

use uuid::Uuid;

use super::error::StorageError;

const MAX_FILENAME_LEN: usize = 255;

/// Location of an uploaded file inside a [`BlobStore`](super::BlobStore).
///
/// Always two segments, `<uuid>/<filename>`, so distinct uploads never collide
/// and the original filename can be recovered for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    /// Allocate a fresh key for a newly uploaded file.
    pub fn for_upload(filename: &str) -> Result<Self, StorageError> {
        let filename = sanitize_filename(filename)?;
        Ok(Self(format!("{}/{filename}", Uuid::now_v7())))
    }

    /// Validate a key read back from the database.
    pub fn parse(key: &str) -> Result<Self, StorageError> {
        let (prefix, filename) = key
            .split_once('/')
            .ok_or(StorageError::InvalidKey("missing key prefix"))?;
        Uuid::parse_str(prefix).map_err(|_| StorageError::InvalidKey("malformed key prefix"))?;
        if sanitize_filename(filename)? != filename {
            return Err(StorageError::InvalidKey("filename is not normalized"));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sanitized original filename.
    pub fn filename(&self) -> &str {
        self.0.split_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduce a client-supplied filename to a safe flat name.
///
/// Browsers on some platforms send the full client path, so only the last
/// segment is kept. Hidden files, traversal and control characters are refused.
pub fn sanitize_filename(filename: &str) -> Result<String, StorageError> {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    if last.is_empty() {
        return Err(StorageError::InvalidKey("filename cannot be empty"));
    }
    if last.chars().any(|c| c.is_control()) {
        return Err(StorageError::InvalidKey(
            "filename must not contain control characters",
        ));
    }
    if last == ".." || last.starts_with('.') {
        return Err(StorageError::InvalidKey(
            "filename must not start with '.'",
        ));
    }
    if last.chars().count() > MAX_FILENAME_LEN {
        return Err(StorageError::InvalidKey("filename is too long"));
    }

    Ok(last.to_string())
}
