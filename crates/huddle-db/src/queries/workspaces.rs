use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::WorkspaceRow;

const COLUMNS: &str = "w.id, w.name, w.owner_user_id, w.join_code, w.created_at";

fn from_row(row: &Row) -> rusqlite::Result<WorkspaceRow> {
    Ok(WorkspaceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_user_id: row.get(2)?,
        join_code: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert(conn: &Connection, workspace: &WorkspaceRow) -> Result<()> {
    conn.execute(
        "INSERT INTO workspaces (id, name, owner_user_id, join_code, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            workspace.id,
            workspace.name,
            workspace.owner_user_id,
            workspace.join_code,
            workspace.created_at
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<WorkspaceRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM workspaces w WHERE w.id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

/// Workspaces in which `user_id` holds a member row, oldest first.
pub fn for_user(conn: &Connection, user_id: Uuid) -> Result<Vec<WorkspaceRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM workspaces w
         JOIN members m ON m.workspace_id = w.id
         WHERE m.user_id = ?1
         ORDER BY w.created_at, w.rowid"
    ))?;
    let rows = stmt
        .query_map([user_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn rename(conn: &Connection, id: Uuid, name: &str) -> Result<()> {
    conn.execute(
        "UPDATE workspaces SET name = ?2 WHERE id = ?1",
        rusqlite::params![id, name],
    )?;
    Ok(())
}

pub fn set_join_code(conn: &Connection, id: Uuid, join_code: &str) -> Result<()> {
    conn.execute(
        "UPDATE workspaces SET join_code = ?2 WHERE id = ?1",
        rusqlite::params![id, join_code],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM workspaces WHERE id = ?1", [id])?)
}
