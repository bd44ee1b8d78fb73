use anyhow::Result;
use huddle_types::models::ForwardedFrom;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, conversion_error};
use crate::models::{MessageRow, NewMessage};

const COLUMNS: &str = "rowid, id, body, member_id, workspace_id, image, channel_id, \
     conversation_id, parent_message_id, forwarded_from, created_at, updated_at";

/// Bound columns of the (channel_id, parent_message_id, conversation_id)
/// index. Channel listings, thread listings and DM listings are the same
/// lookup with different columns set; `None` matches NULL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub channel_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
}

/// Position of the last message of a page; the next page starts strictly
/// after it in newest-first order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: i64,
    pub seq: i64,
}

impl From<&MessageRow> for PageCursor {
    fn from(row: &MessageRow) -> Self {
        Self {
            created_at: row.created_at,
            seq: row.seq,
        }
    }
}

fn from_row(row: &Row) -> rusqlite::Result<MessageRow> {
    let forwarded: Option<String> = row.get(9)?;
    let forwarded_from = forwarded
        .map(|raw| serde_json::from_str::<ForwardedFrom>(&raw))
        .transpose()
        .map_err(|e| conversion_error(9, Type::Text, e))?;

    Ok(MessageRow {
        seq: row.get(0)?,
        id: row.get(1)?,
        body: row.get(2)?,
        member_id: row.get(3)?,
        workspace_id: row.get(4)?,
        image: row.get(5)?,
        channel_id: row.get(6)?,
        conversation_id: row.get(7)?,
        parent_message_id: row.get(8)?,
        forwarded_from,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn insert(conn: &Connection, message: &NewMessage) -> Result<()> {
    let forwarded = message
        .forwarded_from
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO messages (id, body, member_id, workspace_id, image, channel_id,
             conversation_id, parent_message_id, forwarded_from, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            message.id,
            message.body,
            message.member_id,
            message.workspace_id,
            message.image,
            message.channel_id,
            message.conversation_id,
            message.parent_message_id,
            forwarded,
            message.created_at
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<MessageRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
        [id],
        from_row,
    )
    .optional()
}

/// Newest-first page of messages at `location`, starting after `after`.
pub fn page(
    conn: &Connection,
    location: &Location,
    after: Option<PageCursor>,
    limit: u32,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM messages
         WHERE channel_id IS ?1 AND parent_message_id IS ?2 AND conversation_id IS ?3
           AND (?4 IS NULL OR created_at < ?4 OR (created_at = ?4 AND rowid < ?5))
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?6"
    ))?;

    let rows = stmt
        .query_map(
            rusqlite::params![
                location.channel_id,
                location.parent_message_id,
                location.conversation_id,
                after.map(|c| c.created_at),
                after.map(|c| c.seq),
                limit
            ],
            from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Reply count of `parent_id` and its most recent reply in insertion order.
pub fn thread_stats(conn: &Connection, parent_id: Uuid) -> Result<(usize, Option<MessageRow>)> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE parent_message_id = ?1",
        [parent_id],
        |r| r.get(0),
    )?;

    if count == 0 {
        return Ok((0, None));
    }

    let last = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM messages WHERE parent_message_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            [parent_id],
            from_row,
        )
        .optional()?;

    Ok((count as usize, last))
}

pub fn update_body(conn: &Connection, id: Uuid, body: &str, updated_at: i64) -> Result<()> {
    conn.execute(
        "UPDATE messages SET body = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, body, updated_at],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])?)
}

pub fn delete_by_workspace(conn: &Connection, workspace_id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM messages WHERE workspace_id = ?1", [workspace_id])?)
}

pub fn delete_by_member(conn: &Connection, member_id: Uuid) -> Result<usize> {
    Ok(conn.execute("DELETE FROM messages WHERE member_id = ?1", [member_id])?)
}

/// Deletes the channel's messages and every reply threaded under them.
/// Replies are removed first since they are found through their parents.
pub fn delete_for_channel(conn: &Connection, channel_id: Uuid) -> Result<usize> {
    let replies = conn.execute(
        "DELETE FROM messages
         WHERE parent_message_id IN (SELECT id FROM messages WHERE channel_id = ?1)",
        [channel_id],
    )?;
    let messages = conn.execute("DELETE FROM messages WHERE channel_id = ?1", [channel_id])?;
    Ok(replies + messages)
}
