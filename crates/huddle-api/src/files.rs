use std::collections::HashMap;
use std::path::PathBuf;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use huddle_db::models::FileRow;
use huddle_db::now_millis;
use huddle_db::queries::files;
use huddle_types::api::UploadResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Caller;
use crate::session::{mutate, query};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Issues fetchable URLs for storage ids. URLs are derived at read time and
/// never persisted.
#[derive(Debug, Clone)]
pub struct FileUrls {
    base: String,
}

impl FileUrls {
    pub fn new(public_url: &str) -> Self {
        Self {
            base: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, storage_id: Uuid) -> String {
        format!("{}/files/{}", self.base, storage_id)
    }

    /// URLs for every id in `ids` that has a stored blob.
    pub fn resolve(
        &self,
        conn: &Connection,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> anyhow::Result<HashMap<Uuid, String>> {
        let mut urls = HashMap::new();
        for id in ids {
            if urls.contains_key(&id) {
                continue;
            }
            if files::by_id(conn, id)?.is_some() {
                urls.insert(id, self.url(id));
            }
        }
        Ok(urls)
    }
}

/// Blob storage: one flat file per storage id under `dir`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
    pub urls: FileUrls,
    pub max_bytes: usize,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>, public_url: &str, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            urls: FileUrls::new(public_url),
            max_bytes,
        }
    }

    fn path(&self, storage_id: Uuid) -> PathBuf {
        self.dir.join(storage_id.to_string())
    }

    async fn write(&self, storage_id: Uuid, bytes: &[u8]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::File::create(self.path(storage_id)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read(&self, storage_id: Uuid) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path(storage_id)).await
    }
}

/// POST /files: raw bytes in, storage id out.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let uploader_id = caller.ok_or(ApiError::Unauthenticated)?;

    if bytes.is_empty() {
        return Err(ApiError::Invalid("Upload is empty"));
    }
    if bytes.len() > state.blobs.max_bytes {
        return Err(ApiError::TooLarge);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let row = FileRow {
        id: Uuid::new_v4(),
        uploader_id,
        size: bytes.len() as i64,
        sha256: hex::encode(Sha256::digest(&bytes)),
        content_type,
        created_at: now_millis(),
    };

    // Blob first: a row must never point at missing bytes.
    state.blobs.write(row.id, &bytes).await.map_err(|e| {
        error!("Failed to write blob {}: {}", row.id, e);
        ApiError::Storage(e)
    })?;

    let storage_id = row.id;
    let size = row.size as u64;
    mutate(&state, caller, move |s| {
        files::insert(s.conn, &row)?;
        Ok(())
    })
    .await?;

    info!("Stored blob {} ({} bytes)", storage_id, size);
    Ok((StatusCode::CREATED, Json(UploadResponse { storage_id, size })))
}

/// GET /files/{id}. Storage ids are unguessable, so downloads need no identity.
pub async fn download_file(
    State(state): State<AppState>,
    Path(storage_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = query(&state, None, move |s| Ok(files::by_id(s.conn, storage_id)?))
        .await?
        .ok_or(ApiError::NotFound("File"))?;

    let bytes = state.blobs.read(storage_id).await.map_err(|e| {
        error!("Blob {} is recorded but unreadable: {}", storage_id, e);
        ApiError::NotFound("File")
    })?;

    Ok(([(header::CONTENT_TYPE, row.content_type)], bytes))
}
