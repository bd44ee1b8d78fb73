use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_db::models::ChannelRow;
use huddle_db::now_millis;
use huddle_db::queries::{channels, messages, reactions};
use huddle_types::api::{CreateChannelRequest, IdResponse, UpdateChannelRequest};
use huddle_types::events::ChangeScope;
use huddle_types::models::Channel;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::gate;
use crate::middleware::Caller;
use crate::session::{Session, mutate, query};
use crate::validate;

pub fn create(s: &mut Session<'_>, workspace_id: Uuid, name: &str) -> Result<Uuid, ApiError> {
    gate::require_admin(s, workspace_id)?;
    let channel = ChannelRow {
        id: Uuid::new_v4(),
        name: validate::channel_name(name)?,
        workspace_id,
        created_at: now_millis(),
    };
    channels::insert(s.conn, &channel)?;
    s.changed(workspace_id, ChangeScope::Channels);
    Ok(channel.id)
}

pub fn list(s: &Session<'_>, workspace_id: Uuid) -> Result<Vec<Channel>, ApiError> {
    if gate::viewer_member(s, workspace_id)?.is_none() {
        return Ok(Vec::new());
    }
    Ok(channels::by_workspace(s.conn, workspace_id)?
        .into_iter()
        .map(Channel::from)
        .collect())
}

pub fn get_by_id(s: &Session<'_>, id: Uuid) -> Result<Option<Channel>, ApiError> {
    let Some(channel) = channels::by_id(s.conn, id)? else {
        return Ok(None);
    };
    if gate::viewer_member(s, channel.workspace_id)?.is_none() {
        return Ok(None);
    }
    Ok(Some(channel.into()))
}

pub fn update(s: &mut Session<'_>, id: Uuid, name: &str) -> Result<Uuid, ApiError> {
    let channel = channels::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Channel"))?;
    gate::require_admin(s, channel.workspace_id)?;
    channels::rename(s.conn, id, &validate::channel_name(name)?)?;
    s.changed(channel.workspace_id, ChangeScope::Channels);
    Ok(id)
}

/// Deletes the channel, its messages, their replies and every reaction on them.
pub fn remove(s: &mut Session<'_>, id: Uuid) -> Result<Uuid, ApiError> {
    let channel = channels::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Channel"))?;
    gate::require_admin(s, channel.workspace_id)?;

    let reactions = reactions::delete_for_channel(s.conn, id)?;
    let messages = messages::delete_for_channel(s.conn, id)?;
    channels::delete(s.conn, id)?;

    info!(
        "Removed channel {} from workspace {} ({} messages, {} reactions)",
        id, channel.workspace_id, messages, reactions
    );
    s.changed(channel.workspace_id, ChangeScope::Channels);
    s.changed(channel.workspace_id, ChangeScope::AllMessages);
    Ok(id)
}

// -- Handlers --

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| create(s, workspace_id, &req.name)).await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(workspace_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| list(s, workspace_id)).await?))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(query(&state, caller, move |s| get_by_id(s, id)).await?))
}

pub async fn update_channel(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| update(s, id, &req.name)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn remove_channel(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| remove(s, id)).await?;
    Ok(Json(IdResponse { id }))
}
