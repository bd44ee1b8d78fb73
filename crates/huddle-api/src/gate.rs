//! Membership gate: every handler resolves the caller's member row in the
//! target workspace before touching workspace data.

use huddle_db::models::{ConversationRow, MemberRow};
use huddle_db::queries::{conversations, members};
use uuid::Uuid;

use crate::error::ApiError;
use crate::session::Session;

/// Caller's member row in `workspace_id`, or `None` when there is no caller
/// or no membership. Queries use this and degrade to empty results.
pub fn viewer_member(s: &Session<'_>, workspace_id: Uuid) -> Result<Option<MemberRow>, ApiError> {
    match s.viewer() {
        Some(user_id) => Ok(members::by_workspace_user(s.conn, workspace_id, user_id)?),
        None => Ok(None),
    }
}

/// Caller's member row in `workspace_id`; mutations fail without one.
pub fn require_member(s: &Session<'_>, workspace_id: Uuid) -> Result<MemberRow, ApiError> {
    let user_id = s.caller()?;
    members::by_workspace_user(s.conn, workspace_id, user_id)?
        .ok_or(ApiError::Forbidden("Unauthorized: not a member of this workspace"))
}

/// Caller's member row in `workspace_id`, which must hold the admin role.
pub fn require_admin(s: &Session<'_>, workspace_id: Uuid) -> Result<MemberRow, ApiError> {
    let member = require_member(s, workspace_id)?;
    if !member.role.is_admin() {
        return Err(ApiError::Forbidden("Unauthorized: admin role required"));
    }
    Ok(member)
}

/// Conversation `conversation_id` of `workspace_id` in which `member` takes part.
pub fn participant_conversation(
    s: &Session<'_>,
    conversation_id: Uuid,
    workspace_id: Uuid,
    member: &MemberRow,
) -> Result<ConversationRow, ApiError> {
    let conversation = conversations::by_id(s.conn, conversation_id)?
        .filter(|c| c.workspace_id == workspace_id)
        .ok_or(ApiError::NotFound("Conversation"))?;

    if !conversation.includes(member.id) {
        return Err(ApiError::Forbidden(
            "Unauthorized: not a participant of this conversation",
        ));
    }
    Ok(conversation)
}
