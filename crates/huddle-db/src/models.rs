//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the huddle-types API models so the storage layer stays
//! independent of the wire format.

use huddle_types::models::{Channel, ForwardedFrom, Member, Role, User, Workspace};
use uuid::Uuid;

use crate::to_datetime;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct WorkspaceRow {
    pub id: Uuid,
    pub name: String,
    pub owner_user_id: Uuid,
    pub join_code: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub role: Role,
    pub name: String,
    pub image: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub id: Uuid,
    pub name: String,
    pub workspace_id: Uuid,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub member_one_id: Uuid,
    pub member_two_id: Uuid,
    pub created_at: i64,
}

impl ConversationRow {
    pub fn includes(&self, member_id: Uuid) -> bool {
        self.member_one_id == member_id || self.member_two_id == member_id
    }

    /// The participant that is not `member_id`. For a self-conversation this
    /// is `member_id` itself.
    pub fn other(&self, member_id: Uuid) -> Uuid {
        if self.member_one_id == member_id {
            self.member_two_id
        } else {
            self.member_one_id
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    /// SQLite rowid; breaks ties between messages created in the same millisecond.
    pub seq: i64,
    pub id: Uuid,
    pub body: String,
    pub member_id: Uuid,
    pub workspace_id: Uuid,
    pub image: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub forwarded_from: Option<ForwardedFrom>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

/// Insert shape for `messages`; ids and timestamps are assigned by the caller.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub body: String,
    pub member_id: Uuid,
    pub workspace_id: Uuid,
    pub image: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub forwarded_from: Option<ForwardedFrom>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub message_id: Uuid,
    pub member_id: Uuid,
    pub value: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub size: i64,
    pub sha256: String,
    pub content_type: String,
    pub created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            image: row.image,
            created_at: to_datetime(row.created_at),
        }
    }
}

impl From<WorkspaceRow> for Workspace {
    fn from(row: WorkspaceRow) -> Self {
        Workspace {
            id: row.id,
            name: row.name,
            owner_user_id: row.owner_user_id,
            join_code: row.join_code,
            created_at: to_datetime(row.created_at),
        }
    }
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            id: row.id,
            user_id: row.user_id,
            workspace_id: row.workspace_id,
            role: row.role,
            name: row.name,
            image: row.image,
            created_at: to_datetime(row.created_at),
        }
    }
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            name: row.name,
            workspace_id: row.workspace_id,
            created_at: to_datetime(row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_other_is_order_independent() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = ConversationRow {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            member_one_id: a,
            member_two_id: b,
            created_at: 0,
        };
        assert_eq!(conversation.other(a), b);
        assert_eq!(conversation.other(b), a);
        assert!(conversation.includes(a) && conversation.includes(b));
        assert!(!conversation.includes(Uuid::new_v4()));
    }
}
