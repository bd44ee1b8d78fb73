use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, like_pattern};
use crate::models::ChannelRow;

const COLUMNS: &str = "id, name, workspace_id, created_at";

fn from_row(row: &Row) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        workspace_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn insert(conn: &Connection, channel: &ChannelRow) -> Result<()> {
    conn.execute(
        "INSERT INTO channels (id, name, workspace_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![channel.id, channel.name, channel.workspace_id, channel.created_at],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<ChannelRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM channels WHERE id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

pub fn by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM channels WHERE workspace_id = ?1 ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map([workspace_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn search(
    conn: &Connection,
    workspace_id: Uuid,
    text: &str,
    limit: u32,
) -> Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM channels
         WHERE workspace_id = ?1 AND name LIKE ?2 ESCAPE '\\'
         ORDER BY name, rowid
         LIMIT ?3"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![workspace_id, like_pattern(text), limit],
            from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn rename(conn: &Connection, id: Uuid, name: &str) -> Result<()> {
    conn.execute(
        "UPDATE channels SET name = ?2 WHERE id = ?1",
        rusqlite::params![id, name],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM channels WHERE id = ?1", [id])?)
}

pub fn delete_by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM channels WHERE workspace_id = ?1", [workspace_id])?)
}
