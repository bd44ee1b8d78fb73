use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use huddle_db::models::{ChannelRow, MemberRow, WorkspaceRow};
use huddle_db::now_millis;
use huddle_db::queries::{channels, conversations, members, messages, reactions, users, workspaces};
use huddle_types::api::{
    CreateWorkspaceRequest, IdResponse, JoinWorkspaceRequest, UpdateWorkspaceRequest,
    WorkspaceInfo,
};
use huddle_types::events::ChangeScope;
use huddle_types::models::{Role, Workspace};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::gate;
use crate::middleware::Caller;
use crate::session::{Session, mutate, query};
use crate::validate;

const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const DEFAULT_CHANNEL: &str = "general";

/// Random lowercase alphanumeric join code.
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.random_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

/// Creates the workspace, its first admin member and the default channel.
pub fn create(s: &mut Session<'_>, name: &str) -> Result<Uuid, ApiError> {
    let user_id = s.caller()?;
    let name = validate::name(name)?;
    let user = users::by_id(s.conn, user_id)?.ok_or(ApiError::Unauthenticated)?;
    let now = now_millis();

    let workspace = WorkspaceRow {
        id: Uuid::new_v4(),
        name,
        owner_user_id: user_id,
        join_code: generate_join_code(),
        created_at: now,
    };
    workspaces::insert(s.conn, &workspace)?;

    members::insert(
        s.conn,
        &MemberRow {
            id: Uuid::new_v4(),
            user_id,
            workspace_id: workspace.id,
            role: Role::Admin,
            name: user.name,
            image: user.image,
            created_at: now,
        },
    )?;

    channels::insert(
        s.conn,
        &ChannelRow {
            id: Uuid::new_v4(),
            name: DEFAULT_CHANNEL.to_string(),
            workspace_id: workspace.id,
            created_at: now,
        },
    )?;

    s.changed(workspace.id, ChangeScope::Workspace);
    Ok(workspace.id)
}

/// Workspaces in which the caller holds a member row.
pub fn list(s: &Session<'_>) -> Result<Vec<Workspace>, ApiError> {
    let Some(user_id) = s.viewer() else {
        return Ok(Vec::new());
    };
    Ok(workspaces::for_user(s.conn, user_id)?
        .into_iter()
        .map(Workspace::from)
        .collect())
}

pub fn get_by_id(s: &Session<'_>, id: Uuid) -> Result<Option<Workspace>, ApiError> {
    if gate::viewer_member(s, id)?.is_none() {
        return Ok(None);
    }
    Ok(workspaces::by_id(s.conn, id)?.map(Workspace::from))
}

/// Name and membership flag for the join screen. Requires identity only.
pub fn get_info(s: &Session<'_>, id: Uuid) -> Result<Option<WorkspaceInfo>, ApiError> {
    if s.viewer().is_none() {
        return Ok(None);
    }
    let Some(workspace) = workspaces::by_id(s.conn, id)? else {
        return Ok(None);
    };
    let is_member = gate::viewer_member(s, id)?.is_some();
    Ok(Some(WorkspaceInfo {
        name: workspace.name,
        is_member,
    }))
}

pub fn update(s: &mut Session<'_>, id: Uuid, name: &str) -> Result<Uuid, ApiError> {
    gate::require_admin(s, id)?;
    let name = validate::name(name)?;
    workspaces::rename(s.conn, id, &name)?;
    s.changed(id, ChangeScope::Workspace);
    Ok(id)
}

/// Deletes the workspace and everything scoped to it.
pub fn remove(s: &mut Session<'_>, id: Uuid) -> Result<Uuid, ApiError> {
    gate::require_admin(s, id)?;

    let reactions = reactions::delete_by_workspace(s.conn, id)?;
    let messages = messages::delete_by_workspace(s.conn, id)?;
    let conversations = conversations::delete_by_workspace(s.conn, id)?;
    let channels = channels::delete_by_workspace(s.conn, id)?;
    let members = members::delete_by_workspace(s.conn, id)?;
    workspaces::delete(s.conn, id)?;

    info!(
        "Removed workspace {} ({} members, {} channels, {} conversations, {} messages, {} reactions)",
        id, members, channels, conversations, messages, reactions
    );
    s.changed(id, ChangeScope::WorkspaceRemoved);
    Ok(id)
}

/// Self-service join with the workspace's current join code.
pub fn join(s: &mut Session<'_>, id: Uuid, join_code: &str) -> Result<Uuid, ApiError> {
    let user_id = s.caller()?;
    let workspace = workspaces::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Workspace"))?;

    if workspace.join_code != join_code.trim().to_lowercase() {
        return Err(ApiError::Invalid("Invalid join code"));
    }

    if members::by_workspace_user(s.conn, id, user_id)?.is_some() {
        return Err(ApiError::Conflict("Already a member of this workspace"));
    }

    let user = users::by_id(s.conn, user_id)?.ok_or(ApiError::Unauthenticated)?;
    members::insert(
        s.conn,
        &MemberRow {
            id: Uuid::new_v4(),
            user_id,
            workspace_id: id,
            role: Role::Member,
            name: user.name,
            image: user.image,
            created_at: now_millis(),
        },
    )?;

    s.changed(id, ChangeScope::Members);
    Ok(id)
}

/// Rotates the join code. The old code stops working immediately.
pub fn new_join_code(s: &mut Session<'_>, id: Uuid) -> Result<Uuid, ApiError> {
    gate::require_admin(s, id)?;
    workspaces::set_join_code(s.conn, id, &generate_join_code())?;
    s.changed(id, ChangeScope::Workspace);
    Ok(id)
}

// -- Handlers --

pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| create(s, &req.name)).await?;
    info!("Created workspace {}", id);
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, |s| list(s)).await?))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| get_by_id(s, id)).await?))
}

pub async fn get_workspace_info(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| get_info(s, id)).await?))
}

pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| update(s, id, &req.name)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn remove_workspace(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| remove(s, id)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn join_workspace(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| join(s, id, &req.join_code)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn rotate_join_code(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| new_join_code(s, id)).await?;
    Ok(Json(IdResponse { id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_codes_are_six_lowercase_alphanumerics() {
        for _ in 0..50 {
            let code = generate_join_code();
            assert_eq!(code.len(), 6);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            );
        }
    }
}
