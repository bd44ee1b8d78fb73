use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ForwardedFrom, Member, OriginKind, Role, User};

// -- JWT Claims --

/// JWT claims shared by huddle-api (request identity) and huddle-gateway
/// (websocket Identify).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub name: String,
    pub token: String,
}

// -- Workspaces --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinWorkspaceRequest {
    pub join_code: String,
}

/// Public view of a workspace for the join screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub name: String,
    pub is_member: bool,
}

// -- Members --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMemberRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberWithUser {
    #[serde(flatten)]
    pub member: Member,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchHitKind {
    Members,
    Channels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub kind: SearchHitKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub members: Vec<SearchHit>,
    pub channels: Vec<SearchHit>,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateChannelRequest {
    pub name: String,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrGetConversationRequest {
    pub member_id: Uuid,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub body: String,
    pub workspace_id: Uuid,
    #[serde(default)]
    pub channel_id: Option<Uuid>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub parent_message_id: Option<Uuid>,
    /// Storage id returned by `POST /files`.
    #[serde(default)]
    pub image: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardMessageRequest {
    pub workspace_id: Uuid,
    pub original_author_member_id: Uuid,
    #[serde(default)]
    pub destination_channel_id: Option<Uuid>,
    #[serde(default)]
    pub destination_member_id: Option<Uuid>,
}

/// All reactions on one message that share an emoji value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub value: String,
    pub count: usize,
    pub member_ids: Vec<Uuid>,
}

/// Reply statistics of a thread root. `Default` is the "no replies" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub count: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedView {
    pub message_id: Uuid,
    pub author_member_id: Uuid,
    pub author_name: String,
    pub author_image: Option<String>,
    pub body: String,
    pub image: Option<String>,
    pub origin_kind: OriginKind,
    pub origin_id: Uuid,
    pub origin_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ForwardedView {
    pub fn from_snapshot(snapshot: ForwardedFrom, image: Option<String>) -> Self {
        Self {
            message_id: snapshot.message_id,
            author_member_id: snapshot.author_member_id,
            author_name: snapshot.author_name,
            author_image: snapshot.author_image,
            body: snapshot.body,
            image,
            origin_kind: snapshot.origin_kind,
            origin_id: snapshot.origin_id,
            origin_name: snapshot.origin_name,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}

/// A message joined with its author, reactions, thread summary and
/// forwarding provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub body: String,
    pub image: Option<String>,
    pub workspace_id: Uuid,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub member: Member,
    pub user: User,
    pub reactions: Vec<ReactionGroup>,
    pub thread: ThreadSummary,
    pub forwarded_from: Option<ForwardedView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePage {
    pub page: Vec<MessageView>,
    pub is_done: bool,
    pub continue_cursor: Option<String>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleReactionResponse {
    pub id: Uuid,
    pub added: bool,
}

// -- Files --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub storage_id: Uuid,
    pub size: u64,
}
