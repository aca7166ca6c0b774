//! On-disk storage for uploaded files.
//!
//! Files are stored flat under one directory as `{millis}-{uuid}-{name}` and
//! served back from `/uploads/{stored name}`.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// URL prefix the stored files are served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// A stored file as referenced from tasks, responses and documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Original file name as sent by the client.
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

/// Sanitize a client-supplied file name to a single path component.
fn sanitize_file_name(s: &str) -> String {
    // Take only the filename portion (after any path separator)
    let filename = s.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(s);

    let cleaned = filename.replace("..", "").replace('\0', "").trim().to_string();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

impl UploadStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Write `bytes` under a fresh unique name and return its locator.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        let name = sanitize_file_name(original_name);
        let stored_name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            name
        );

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut f = tokio::fs::File::create(self.dir.join(&stored_name)).await?;
        f.write_all(bytes).await?;
        f.flush().await?;

        tracing::debug!(file = %stored_name, size = bytes.len(), "Stored upload");
        Ok(StoredFile {
            name,
            url: format!("{}/{}", UPLOADS_ROUTE, stored_name),
        })
    }
}
