use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_db::models::{ConversationRow, MemberRow};
use huddle_db::now_millis;
use huddle_db::queries::{conversations, members};
use huddle_types::api::{CreateOrGetConversationRequest, IdResponse};
use huddle_types::events::ChangeScope;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::gate;
use crate::middleware::Caller;
use crate::session::{Session, mutate};

/// The conversation between `caller` and `other`, created on first contact.
/// Runs inside the mutation's transaction, and the unordered-pair index
/// rejects a second row for the same pair.
pub fn find_or_create(
    s: &mut Session<'_>,
    caller: &MemberRow,
    other: &MemberRow,
) -> Result<ConversationRow, ApiError> {
    let workspace_id = caller.workspace_id;
    if let Some(existing) = conversations::find_pair(s.conn, workspace_id, caller.id, other.id)? {
        return Ok(existing);
    }

    let conversation = ConversationRow {
        id: Uuid::new_v4(),
        workspace_id,
        member_one_id: caller.id,
        member_two_id: other.id,
        created_at: now_millis(),
    };
    conversations::insert(s.conn, &conversation)?;
    s.changed(workspace_id, ChangeScope::Conversations);
    Ok(conversation)
}

/// Resolve a member of `workspace_id`; members of other workspaces do not
/// resolve.
pub fn workspace_member(
    s: &Session<'_>,
    workspace_id: Uuid,
    member_id: Uuid,
) -> Result<MemberRow, ApiError> {
    members::by_id(s.conn, member_id)?
        .filter(|m| m.workspace_id == workspace_id)
        .ok_or(ApiError::NotFound("Member"))
}

pub fn create_or_get(
    s: &mut Session<'_>,
    workspace_id: Uuid,
    member_id: Uuid,
) -> Result<Uuid, ApiError> {
    let caller = gate::require_member(s, workspace_id)?;
    let other = workspace_member(s, workspace_id, member_id)?;
    Ok(find_or_create(s, &caller, &other)?.id)
}

pub async fn create_or_get_conversation(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateOrGetConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| {
        create_or_get(s, workspace_id, req.member_id)
    })
    .await?;
    Ok(Json(IdResponse { id }))
}
