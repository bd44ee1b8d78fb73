use anyhow::Result;
use huddle_types::models::Role;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, conversion_error, like_pattern};
use crate::models::MemberRow;

const COLUMNS: &str = "id, user_id, workspace_id, role, name, image, created_at";

fn from_row(row: &Row) -> rusqlite::Result<MemberRow> {
    let role: String = row.get(3)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| conversion_error(3, Type::Text, e))?;

    Ok(MemberRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        workspace_id: row.get(2)?,
        role,
        name: row.get(4)?,
        image: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert(conn: &Connection, member: &MemberRow) -> Result<()> {
    conn.execute(
        "INSERT INTO members (id, user_id, workspace_id, role, name, image, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            member.id,
            member.user_id,
            member.workspace_id,
            member.role.as_str(),
            member.name,
            member.image,
            member.created_at
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<MemberRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM members WHERE id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

/// Membership lookup on the unique (workspace_id, user_id) index.
pub fn by_workspace_user(
    conn: &Connection,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MemberRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM members WHERE workspace_id = ?1 AND user_id = ?2"),
        [workspace_id, user_id],
        from_row,
    )
    .optional()
}

pub fn by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM members WHERE workspace_id = ?1 ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map([workspace_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_admins(conn: &Connection, workspace_id: Uuid) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM members WHERE workspace_id = ?1 AND role = 'admin'",
        [workspace_id],
        |r| r.get(0),
    )?)
}

/// Members of `workspace_id` whose display name contains `text`
/// (case-insensitive for ASCII).
pub fn search(
    conn: &Connection,
    workspace_id: Uuid,
    text: &str,
    limit: u32,
) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM members
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

pub fn set_role(conn: &Connection, id: Uuid, role: Role) -> Result<()> {
    conn.execute(
        "UPDATE members SET role = ?2 WHERE id = ?1",
        rusqlite::params![id, role.as_str()],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM members WHERE id = ?1", [id])?)
}

pub fn delete_by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM members WHERE workspace_id = ?1", [workspace_id])?)
}
