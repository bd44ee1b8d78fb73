use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::ReactionRow;

const COLUMNS: &str = "id, workspace_id, message_id, member_id, value, created_at";

fn from_row(row: &Row) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        message_id: row.get(2)?,
        member_id: row.get(3)?,
        value: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn find(
    conn: &Connection,
    message_id: Uuid,
    member_id: Uuid,
    value: &str,
) -> Result<Option<ReactionRow>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM reactions
             WHERE message_id = ?1 AND member_id = ?2 AND value = ?3"
        ),
        rusqlite::params![message_id, member_id, value],
        from_row,
    )
    .optional()
}

pub fn insert(conn: &Connection, reaction: &ReactionRow) -> Result<()> {
    conn.execute(
        "INSERT INTO reactions (id, workspace_id, message_id, member_id, value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            reaction.id,
            reaction.workspace_id,
            reaction.message_id,
            reaction.member_id,
            reaction.value,
            reaction.created_at
        ],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM reactions WHERE id = ?1", [id])?)
}

/// Batch-fetch reactions for a page of messages, grouped by message id.
/// Each group keeps insertion order.
pub fn for_messages(
    conn: &Connection,
    message_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<ReactionRow>>> {
    let mut grouped: HashMap<Uuid, Vec<ReactionRow>> = HashMap::new();
    if message_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {COLUMNS} FROM reactions WHERE message_id IN ({}) ORDER BY created_at, rowid",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(message_ids.iter()), from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for row in rows {
        grouped.entry(row.message_id).or_default().push(row);
    }
    Ok(grouped)
}

pub fn delete_for_message(conn: &Connection, message_id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM reactions WHERE message_id = ?1", [message_id])?)
}

pub fn delete_by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM reactions WHERE workspace_id = ?1", [workspace_id])?)
}

/// Reactions authored by `member_id` plus every reaction on a message
/// authored by `member_id`.
pub fn delete_for_member(conn: &Connection, member_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM reactions
         WHERE member_id = ?1
            OR message_id IN (SELECT id FROM messages WHERE member_id = ?1)",
        [member_id],
    )?)
}

/// Reactions on the channel's messages and on replies threaded under them.
pub fn delete_for_channel(conn: &Connection, channel_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM reactions WHERE message_id IN (
             SELECT id FROM messages WHERE channel_id = ?1
             UNION
             SELECT id FROM messages
             WHERE parent_message_id IN (SELECT id FROM messages WHERE channel_id = ?1)
         )",
        [channel_id],
    )?)
}
