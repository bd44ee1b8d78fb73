use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde::Deserialize;
use uuid::Uuid;

use huddle_db::models::{MemberRow, MessageRow, NewMessage, UserRow};
use huddle_db::queries::messages::{Location, PageCursor};
use huddle_db::queries::{channels, conversations, files, members, messages, reactions, users};
use huddle_db::{now_millis, to_datetime};
use huddle_types::api::{
    CreateMessageRequest, ForwardMessageRequest, IdResponse, MessagePage, MessageView,
    UpdateMessageRequest,
};
use huddle_types::events::ChangeScope;
use huddle_types::models::{ForwardedFrom, OriginKind};

use crate::auth::AppState;
use crate::conversations::{find_or_create, workspace_member};
use crate::error::ApiError;
use crate::files::FileUrls;
use crate::gate;
use crate::middleware::Caller;
use crate::read_model;
use crate::session::{Session, mutate, query};
use crate::validate;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    /// Opaque cursor from the previous page's `continue_cursor`.
    pub cursor: Option<String>,
    pub num_items: Option<u32>,
}

pub fn encode_cursor(cursor: PageCursor) -> String {
    B64.encode(format!("{}:{}", cursor.created_at, cursor.seq))
}

pub fn decode_cursor(raw: &str) -> Result<PageCursor, ApiError> {
    const BAD: ApiError = ApiError::Invalid("Invalid cursor");

    let bytes = B64.decode(raw).map_err(|_| BAD)?;
    let text = String::from_utf8(bytes).map_err(|_| BAD)?;
    let (created_at, seq) = text.split_once(':').ok_or(BAD)?;
    Ok(PageCursor {
        created_at: created_at.parse().map_err(|_| BAD)?,
        seq: seq.parse().map_err(|_| BAD)?,
    })
}

fn location_of(message: &MessageRow) -> ChangeScope {
    ChangeScope::Messages {
        channel_id: message.channel_id,
        conversation_id: message.conversation_id,
        parent_message_id: message.parent_message_id,
    }
}

/// Post a message to a channel, a conversation, or a thread.
pub fn create(s: &mut Session<'_>, req: CreateMessageRequest) -> Result<Uuid, ApiError> {
    let workspace_id = req.workspace_id;
    let member = gate::require_member(s, workspace_id)?;
    validate::body(&req.body)?;

    if req.channel_id.is_some() && req.conversation_id.is_some() {
        return Err(ApiError::Invalid(
            "A message belongs to either a channel or a conversation",
        ));
    }

    let channel_id = req.channel_id;
    let mut conversation_id = req.conversation_id;

    let parent = match req.parent_message_id {
        Some(parent_id) => {
            let parent = messages::by_id(s.conn, parent_id)?
                .filter(|p| p.workspace_id == workspace_id)
                .ok_or(ApiError::NotFound("Parent message"))?;
            // Threads are one level deep; thread summaries only exist on roots.
            if parent.parent_message_id.is_some() {
                return Err(ApiError::Invalid("Can not reply to a thread reply"));
            }
            if let Some(parent_conversation) = parent.conversation_id {
                gate::participant_conversation(s, parent_conversation, workspace_id, &member)?;
            }
            // A reply lives where its parent lives. Thread replies in a DM
            // omit the location; take it from the parent.
            let misplaced = channel_id.is_some_and(|c| parent.channel_id != Some(c))
                || conversation_id.is_some_and(|c| parent.conversation_id != Some(c));
            if misplaced {
                return Err(ApiError::Invalid(
                    "A reply must be in the same location as its parent",
                ));
            }
            if channel_id.is_none() && conversation_id.is_none() {
                conversation_id = parent.conversation_id;
            }
            Some(parent)
        }
        None => None,
    };

    if channel_id.is_none() && conversation_id.is_none() && parent.is_none() {
        return Err(ApiError::Invalid(
            "A message needs a channel, a conversation or a parent message",
        ));
    }

    if let Some(channel_id) = channel_id {
        channels::by_id(s.conn, channel_id)?
            .filter(|c| c.workspace_id == workspace_id)
            .ok_or(ApiError::NotFound("Channel"))?;
    }
    if let Some(conversation_id) = conversation_id {
        gate::participant_conversation(s, conversation_id, workspace_id, &member)?;
    }
    if let Some(image) = req.image {
        files::by_id(s.conn, image)?.ok_or(ApiError::NotFound("File"))?;
    }

    let message = NewMessage {
        id: Uuid::new_v4(),
        body: req.body,
        member_id: member.id,
        workspace_id,
        image: req.image,
        channel_id,
        conversation_id,
        parent_message_id: req.parent_message_id,
        forwarded_from: None,
        created_at: now_millis(),
    };
    messages::insert(s.conn, &message)?;

    s.changed(
        workspace_id,
        ChangeScope::Messages {
            channel_id,
            conversation_id,
            parent_message_id: message.parent_message_id,
        },
    );
    // The parent's thread summary is part of its own listing.
    if let Some(parent) = &parent {
        s.changed(workspace_id, location_of(parent));
    }
    Ok(message.id)
}

/// The caller's member row for an author-only operation on `message`.
fn require_author(s: &Session<'_>, message: &MessageRow) -> Result<MemberRow, ApiError> {
    let member = gate::require_member(s, message.workspace_id)?;
    if member.id != message.member_id {
        return Err(ApiError::Forbidden(
            "Unauthorized: only the author can change this message",
        ));
    }
    Ok(member)
}

pub fn update(s: &mut Session<'_>, id: Uuid, body: &str) -> Result<Uuid, ApiError> {
    let message = messages::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Message"))?;
    require_author(s, &message)?;

    if message.forwarded_from.is_some() {
        return Err(ApiError::Invalid("Can not edit forwarded message"));
    }
    validate::body(body)?;

    messages::update_body(s.conn, id, body, now_millis())?;
    s.changed(message.workspace_id, location_of(&message));
    Ok(id)
}

/// Deletes the message and its reactions. Thread replies are kept and stay
/// reachable by id.
pub fn remove(s: &mut Session<'_>, id: Uuid) -> Result<Uuid, ApiError> {
    let message = messages::by_id(s.conn, id)?.ok_or(ApiError::NotFound("Message"))?;
    require_author(s, &message)?;

    reactions::delete_for_message(s.conn, id)?;
    messages::delete(s.conn, id)?;

    s.changed(message.workspace_id, location_of(&message));
    if let Some(parent_id) = message.parent_message_id {
        if let Some(parent) = messages::by_id(s.conn, parent_id)? {
            s.changed(message.workspace_id, location_of(&parent));
        }
    }
    Ok(id)
}

/// Where a message lives: its channel or conversation, or, for a thread
/// reply without one, its parent's.
fn origin_of(s: &Session<'_>, message: &MessageRow) -> Result<(OriginKind, Uuid), ApiError> {
    let located = |m: &MessageRow| match (m.channel_id, m.conversation_id) {
        (Some(channel_id), _) => Some((OriginKind::Channel, channel_id)),
        (None, Some(conversation_id)) => Some((OriginKind::Conversation, conversation_id)),
        (None, None) => None,
    };

    if let Some(origin) = located(message) {
        return Ok(origin);
    }
    let parent_id = message
        .parent_message_id
        .ok_or(ApiError::Invalid("Message has no location"))?;
    let parent = messages::by_id(s.conn, parent_id)?.ok_or(ApiError::NotFound("Parent message"))?;
    located(&parent).ok_or(ApiError::Invalid("Message has no location"))
}

enum Destination {
    Channel(Uuid),
    Member(Uuid),
}

/// Copy a message to a channel or to a member's DM, keeping a snapshot of
/// the original. Forwarded copies can not be forwarded again.
pub fn forward(
    s: &mut Session<'_>,
    message_id: Uuid,
    req: ForwardMessageRequest,
) -> Result<Uuid, ApiError> {
    s.caller()?;
    let workspace_id = req.workspace_id;

    let destination = match (req.destination_channel_id, req.destination_member_id) {
        (Some(channel_id), None) => Destination::Channel(channel_id),
        (None, Some(member_id)) => Destination::Member(member_id),
        _ => {
            return Err(ApiError::Invalid(
                "Exactly one destination (channel or member) is required",
            ));
        }
    };

    let member = gate::require_member(s, workspace_id)?;
    let author = workspace_member(s, workspace_id, req.original_author_member_id)?;
    let source = messages::by_id(s.conn, message_id)?.ok_or(ApiError::NotFound("Message"))?;

    if source.forwarded_from.is_some() {
        return Err(ApiError::Invalid("Can not forward a forwarded message"));
    }
    if source.member_id != author.id || source.workspace_id != workspace_id {
        return Err(ApiError::Invalid(
            "Message does not belong to this author in the current workspace",
        ));
    }

    let (origin_kind, origin_id) = origin_of(s, &source)?;
    let origin_name = match origin_kind {
        OriginKind::Channel => {
            channels::by_id(s.conn, origin_id)?
                .ok_or(ApiError::NotFound("Channel"))?
                .name
        }
        OriginKind::Conversation => {
            let conversation = gate::participant_conversation(s, origin_id, workspace_id, &member)?;
            members::by_id(s.conn, conversation.other(author.id))?
                .map(|m| m.name)
                .unwrap_or_else(|| "Direct message".to_string())
        }
    };

    let (channel_id, conversation_id) = match destination {
        Destination::Channel(channel_id) => {
            channels::by_id(s.conn, channel_id)?
                .filter(|c| c.workspace_id == workspace_id)
                .ok_or(ApiError::NotFound("Channel"))?;
            (Some(channel_id), None)
        }
        Destination::Member(member_id) => {
            let target = workspace_member(s, workspace_id, member_id)?;
            let conversation = find_or_create(s, &member, &target)?;
            (None, Some(conversation.id))
        }
    };

    let snapshot = ForwardedFrom {
        message_id: source.id,
        author_member_id: author.id,
        author_name: author.name,
        author_image: author.image,
        body: source.body.clone(),
        image: source.image,
        origin_kind,
        origin_id,
        origin_name,
        created_at: to_datetime(source.created_at),
        updated_at: source.updated_at.map(to_datetime),
    };

    let message = NewMessage {
        id: Uuid::new_v4(),
        body: source.body,
        member_id: member.id,
        workspace_id,
        image: source.image,
        channel_id,
        conversation_id,
        parent_message_id: None,
        forwarded_from: Some(snapshot),
        created_at: now_millis(),
    };
    messages::insert(s.conn, &message)?;

    s.changed(
        workspace_id,
        ChangeScope::Messages {
            channel_id,
            conversation_id,
            parent_message_id: None,
        },
    );
    Ok(message.id)
}

/// Enrich stored rows into the API shape, dropping rows whose author is gone.
fn assemble_rows(
    s: &Session<'_>,
    urls: &FileUrls,
    rows: Vec<MessageRow>,
) -> Result<Vec<MessageView>, ApiError> {
    let ids: Vec<Uuid> = rows.iter().map(|m| m.id).collect();
    let mut reactions_by_message = reactions::for_messages(s.conn, &ids)?;

    let image_ids = rows.iter().flat_map(|m| {
        [
            m.image,
            m.forwarded_from.as_ref().and_then(|f| f.image),
        ]
        .into_iter()
        .flatten()
    });
    let image_urls = urls.resolve(s.conn, image_ids.collect::<Vec<_>>())?;

    let mut member_cache: HashMap<Uuid, Option<MemberRow>> = HashMap::new();
    let mut user_cache: HashMap<Uuid, Option<UserRow>> = HashMap::new();

    let mut member_of = |id: Uuid| -> Result<Option<MemberRow>, ApiError> {
        if let Some(hit) = member_cache.get(&id) {
            return Ok(hit.clone());
        }
        let row = members::by_id(s.conn, id)?;
        member_cache.insert(id, row.clone());
        Ok(row)
    };

    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let member = member_of(row.member_id)?;
        let user = match &member {
            Some(m) => match user_cache.get(&m.user_id) {
                Some(hit) => hit.clone(),
                None => {
                    let user = users::by_id(s.conn, m.user_id)?;
                    user_cache.insert(m.user_id, user.clone());
                    user
                }
            },
            None => None,
        };

        let (count, last_reply) = messages::thread_stats(s.conn, row.id)?;
        let last_author = match &last_reply {
            Some(reply) => member_of(reply.member_id)?,
            None => None,
        };
        let thread = read_model::thread_summary(count, last_reply.as_ref(), last_author.as_ref());

        let reactions = reactions_by_message.remove(&row.id).unwrap_or_default();
        if let Some(view) = read_model::assemble(row, member, user, &reactions, thread, &image_urls) {
            views.push(view);
        }
    }
    Ok(views)
}

/// Workspace that owns every location id in `q`, or `None` when any of them
/// is unknown or they disagree.
fn query_workspace(s: &Session<'_>, q: &MessageQuery) -> Result<Option<Uuid>, ApiError> {
    let mut workspace: Option<Uuid> = None;
    let mut agree = |id: Uuid| match workspace {
        Some(existing) => existing == id,
        None => {
            workspace = Some(id);
            true
        }
    };

    if let Some(channel_id) = q.channel_id {
        match channels::by_id(s.conn, channel_id)? {
            Some(c) if agree(c.workspace_id) => {}
            _ => return Ok(None),
        }
    }
    if let Some(conversation_id) = q.conversation_id {
        match conversations::by_id(s.conn, conversation_id)? {
            Some(c) if agree(c.workspace_id) => {}
            _ => return Ok(None),
        }
    }
    if let Some(parent_id) = q.parent_message_id {
        match messages::by_id(s.conn, parent_id)? {
            Some(m) if agree(m.workspace_id) => {}
            _ => return Ok(None),
        }
    }
    Ok(workspace)
}

/// Newest-first page of a channel, conversation or thread listing. Degrades
/// to an empty page when the caller may not read the location.
pub fn get(s: &Session<'_>, urls: &FileUrls, q: MessageQuery) -> Result<MessagePage, ApiError> {
    let empty = MessagePage {
        is_done: true,
        ..Default::default()
    };

    let after = q.cursor.as_deref().map(decode_cursor).transpose()?;
    let limit = q
        .num_items
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let Some(workspace_id) = query_workspace(s, &q)? else {
        return Ok(empty);
    };
    let Some(member) = gate::viewer_member(s, workspace_id)? else {
        return Ok(empty);
    };

    let mut conversation_id = q.conversation_id;
    if q.channel_id.is_none() && conversation_id.is_none() {
        if let Some(parent_id) = q.parent_message_id {
            conversation_id = messages::by_id(s.conn, parent_id)?.and_then(|p| p.conversation_id);
        }
    }

    if let Some(conversation_id) = conversation_id {
        match conversations::by_id(s.conn, conversation_id)? {
            Some(c) if c.includes(member.id) => {}
            _ => return Ok(empty),
        }
    }

    let location = Location {
        channel_id: q.channel_id,
        parent_message_id: q.parent_message_id,
        conversation_id,
    };

    let mut rows = messages::page(s.conn, &location, after, limit + 1)?;
    let is_done = rows.len() <= limit as usize;
    rows.truncate(limit as usize);

    let continue_cursor = if is_done {
        None
    } else {
        rows.last().map(|m| encode_cursor(PageCursor::from(m)))
    };

    Ok(MessagePage {
        page: assemble_rows(s, urls, rows)?,
        is_done,
        continue_cursor,
    })
}

pub fn get_by_id(s: &Session<'_>, urls: &FileUrls, id: Uuid) -> Result<Option<MessageView>, ApiError> {
    let Some(message) = messages::by_id(s.conn, id)? else {
        return Ok(None);
    };
    let Some(member) = gate::viewer_member(s, message.workspace_id)? else {
        return Ok(None);
    };
    if let Some(conversation_id) = message.conversation_id {
        let participant = conversations::by_id(s.conn, conversation_id)?
            .is_some_and(|c| c.includes(member.id));
        if !participant {
            return Ok(None);
        }
    }
    Ok(assemble_rows(s, urls, vec![message])?.pop())
}

// -- Handlers --

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Query(q): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let urls = state.blobs.urls.clone();
    Ok(Json(query(&state, caller, move |s| get(s, &urls, q)).await?))
}

pub async fn get_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let urls = state.blobs.urls.clone();
    Ok(Json(query(&state, caller, move |s| get_by_id(s, &urls, id)).await?))
}

pub async fn create_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| create(s, req)).await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

pub async fn update_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| update(s, id, &req.body)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn remove_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| remove(s, id)).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn forward_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(req): Json<ForwardMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = mutate(&state, caller, move |s| forward(s, id, req)).await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}
