use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_db::models::ReactionRow;
use huddle_db::now_millis;
use huddle_db::queries::{messages, reactions};
use huddle_types::api::{ToggleReactionRequest, ToggleReactionResponse};
use huddle_types::events::ChangeScope;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::gate;
use crate::middleware::Caller;
use crate::session::{Session, mutate};
use crate::validate;

/// Add the caller's `value` reaction to a message, or take it back if it is
/// already there. Returns the id of the reaction created or deleted.
pub fn toggle(
    s: &mut Session<'_>,
    message_id: Uuid,
    value: &str,
) -> Result<ToggleReactionResponse, ApiError> {
    validate::reaction(value)?;

    let message = messages::by_id(s.conn, message_id)?.ok_or(ApiError::NotFound("Message"))?;
    let member = gate::require_member(s, message.workspace_id)?;
    if let Some(conversation_id) = message.conversation_id {
        gate::participant_conversation(s, conversation_id, message.workspace_id, &member)?;
    }

    let response = match reactions::find(s.conn, message_id, member.id, value)? {
        Some(existing) => {
            reactions::delete(s.conn, existing.id)?;
            ToggleReactionResponse {
                id: existing.id,
                added: false,
            }
        }
        None => {
            let reaction = ReactionRow {
                id: Uuid::new_v4(),
                workspace_id: message.workspace_id,
                message_id,
                member_id: member.id,
                value: value.to_string(),
                created_at: now_millis(),
            };
            reactions::insert(s.conn, &reaction)?;
            ToggleReactionResponse {
                id: reaction.id,
                added: true,
            }
        }
    };

    s.changed(
        message.workspace_id,
        ChangeScope::Reactions {
            message_id,
            conversation_id: message.conversation_id,
        },
    );
    s.changed(
        message.workspace_id,
        ChangeScope::Messages {
            channel_id: message.channel_id,
            conversation_id: message.conversation_id,
            parent_message_id: message.parent_message_id,
        },
    );
    Ok(response)
}

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = mutate(&state, caller, move |s| toggle(s, message_id, &req.value)).await?;
    Ok(Json(response))
}
