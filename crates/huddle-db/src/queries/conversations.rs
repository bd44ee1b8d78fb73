use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::ConversationRow;

const COLUMNS: &str = "id, workspace_id, member_one_id, member_two_id, created_at";

fn from_row(row: &Row) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        member_one_id: row.get(2)?,
        member_two_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert(conn: &Connection, conversation: &ConversationRow) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, workspace_id, member_one_id, member_two_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            conversation.id,
            conversation.workspace_id,
            conversation.member_one_id,
            conversation.member_two_id,
            conversation.created_at
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<ConversationRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

/// The conversation between `a` and `b` in either order.
pub fn find_pair(
    conn: &Connection,
    workspace_id: Uuid,
    a: Uuid,
    b: Uuid,
) -> Result<Option<ConversationRow>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM conversations
             WHERE workspace_id = ?1
               AND ((member_one_id = ?2 AND member_two_id = ?3)
                 OR (member_one_id = ?3 AND member_two_id = ?2))"
        ),
        [workspace_id, a, b],
        from_row,
    )
    .optional()
}

pub fn delete_by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM conversations WHERE workspace_id = ?1",
        [workspace_id],
    )?)
}

/// Deletes every conversation `member_id` takes part in. Not scoped by
/// workspace: member ids are unique per workspace, so the member id alone
/// identifies the rows.
pub fn delete_for_member(conn: &Connection, member_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM conversations WHERE member_one_id = ?1 OR member_two_id = ?1",
        [member_id],
    )?)
}
