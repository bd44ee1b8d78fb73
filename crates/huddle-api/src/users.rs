use axum::{Extension, Json, extract::State, response::IntoResponse};

use huddle_db::queries::users;
use huddle_types::models::User;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Caller;
use crate::session::{Session, query};

/// The caller's profile, or `None` without identity.
pub fn current(s: &Session<'_>) -> Result<Option<User>, ApiError> {
    let Some(user_id) = s.viewer() else {
        return Ok(None);
    };
    Ok(users::by_id(s.conn, user_id)?.map(User::from))
}

pub async fn get_current(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let user = query(&state, caller, |s| current(s)).await?;
    Ok(Json(user))
}
