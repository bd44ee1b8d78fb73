use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use huddle_db::models::MemberRow;
use huddle_db::queries::{channels, conversations, members, messages, reactions, users};
use huddle_types::api::{
    IdResponse, MemberWithUser, SearchHit, SearchHitKind, SearchResults, UpdateMemberRequest,
};
use huddle_types::events::ChangeScope;
use huddle_types::models::{Member, Role};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::gate;
use crate::middleware::Caller;
use crate::session::{Session, mutate, query};

const SEARCH_LIMIT: u32 = 10;

fn with_user(s: &Session<'_>, member: MemberRow) -> Result<Option<MemberWithUser>, ApiError> {
    Ok(users::by_id(s.conn, member.user_id)?.map(|user| MemberWithUser {
        member: member.into(),
        user: user.into(),
    }))
}

/// The caller's own member row in `workspace_id`.
pub fn current(s: &Session<'_>, workspace_id: Uuid) -> Result<Option<Member>, ApiError> {
    Ok(gate::viewer_member(s, workspace_id)?.map(Member::from))
}

/// A member of a workspace the caller also belongs to.
pub fn get_by_id(s: &Session<'_>, id: Uuid) -> Result<Option<MemberWithUser>, ApiError> {
    let Some(member) = members::by_id(s.conn, id)? else {
        return Ok(None);
    };
    if gate::viewer_member(s, member.workspace_id)?.is_none() {
        return Ok(None);
    }
    with_user(s, member)
}

pub fn get_all(s: &Session<'_>, workspace_id: Uuid) -> Result<Vec<MemberWithUser>, ApiError> {
    if gate::viewer_member(s, workspace_id)?.is_none() {
        return Ok(Vec::new());
    }

    let mut all = Vec::new();
    for member in members::by_workspace(s.conn, workspace_id)? {
        if let Some(joined) = with_user(s, member)? {
            all.push(joined);
        }
    }
    Ok(all)
}

/// Members and channels of the workspace whose name contains `text`.
pub fn search(s: &Session<'_>, workspace_id: Uuid, text: &str) -> Result<SearchResults, ApiError> {
    let text = text.trim().to_lowercase();
    if text.is_empty() || gate::viewer_member(s, workspace_id)?.is_none() {
        return Ok(SearchResults::default());
    }

    let members = members::search(s.conn, workspace_id, &text, SEARCH_LIMIT)?
        .into_iter()
        .map(|m| SearchHit {
            id: m.id,
            name: m.name,
            image: m.image,
            kind: SearchHitKind::Members,
        })
        .collect();

    let channels = channels::search(s.conn, workspace_id, &text, SEARCH_LIMIT)?
        .into_iter()
        .map(|c| SearchHit {
            id: c.id,
            name: c.name,
            image: None,
            kind: SearchHitKind::Channels,
        })
        .collect();

    Ok(SearchResults { members, channels })
}

/// Change a member's role. Admin-only; the last admin can not be demoted.
pub fn update(s: &mut Session<'_>, id: Uuid, role: Role) -> Result<Uuid, ApiError> {
    let target = members::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Member"))?;
    gate::require_admin(s, target.workspace_id)?;

    if target.role.is_admin()
        && !role.is_admin()
        && members::count_admins(s.conn, target.workspace_id)? <= 1
    {
        return Err(ApiError::Invalid("Can not demote the last admin"));
    }

    members::set_role(s.conn, id, role)?;
    s.changed(target.workspace_id, ChangeScope::Members);
    Ok(id)
}

/// Remove a member together with their messages, reactions and
/// conversations. Admins remove non-admins; a non-admin may remove
/// themselves.
pub fn remove(s: &mut Session<'_>, id: Uuid) -> Result<Uuid, ApiError> {
    let target = members::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Member"))?;
    let caller = gate::require_member(s, target.workspace_id)?;

    if caller.id == target.id {
        if caller.role.is_admin() {
            return Err(ApiError::Forbidden("Can not remove self if self is an admin"));
        }
    } else {
        if !caller.role.is_admin() {
            return Err(ApiError::Forbidden("Unauthorized: admin role required"));
        }
        if target.role.is_admin() {
            return Err(ApiError::Forbidden("Admin can not be removed"));
        }
    }

    // Reactions go first: the lookup of reactions on the member's messages
    // needs those messages to still exist.
    let reactions = reactions::delete_for_member(s.conn, id)?;
    let messages = messages::delete_by_member(s.conn, id)?;
    let conversations = conversations::delete_for_member(s.conn, id)?;
    members::delete(s.conn, id)?;

    info!(
        "Removed member {} from workspace {} ({} messages, {} reactions, {} conversations)",
        id, target.workspace_id, messages, reactions, conversations
    );

    let workspace_id = target.workspace_id;
    s.changed(workspace_id, ChangeScope::Members);
    s.changed(workspace_id, ChangeScope::Conversations);
    s.changed(workspace_id, ChangeScope::AllMessages);
    Ok(id)
}

// -- Handlers --

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub text: String,
}

pub async fn get_current_member(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| current(s, workspace_id)).await?))
}

pub async fn get_member(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| get_by_id(s, id)).await?))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| get_all(s, workspace_id)).await?))
}

pub async fn search_workspace(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(
        query(&state, caller, move |s| search(s, workspace_id, &params.text)).await?,
    ))
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| update(s, id, req.role)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| remove(s, id)).await?;
    Ok(Json(IdResponse { id }))
}
