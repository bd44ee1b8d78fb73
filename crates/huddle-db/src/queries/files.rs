use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::FileRow;

fn from_row(row: &Row) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        uploader_id: row.get(1)?,
        size: row.get(2)?,
        sha256: row.get(3)?,
        content_type: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert(conn: &Connection, file: &FileRow) -> Result<()> {
    conn.execute(
        "INSERT INTO files (id, uploader_id, size, sha256, content_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            file.id,
            file.uploader_id,
            file.size,
            file.sha256,
            file.content_type,
            file.created_at
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<FileRow>> {
    conn.query_row(
        "SELECT id, uploader_id, size, sha256, content_type, created_at FROM files WHERE id = ?1",
        [id],
        from_row,
    )
    .optional()
}
