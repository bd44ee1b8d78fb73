use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use huddle_types::api::Claims;

use crate::auth::AppState;

/// Identity resolved for the current request. `None` when no valid bearer
/// token was presented; handlers decide whether that fails or degrades.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Option<Uuid>);

/// Resolve the bearer JWT into a `Caller` extension. Never rejects.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let caller = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .and_then(|auth| match decode_token(&state.jwt_secret, auth.token()) {
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                debug!("Ignoring invalid bearer token: {}", e);
                None
            }
        });

    req.extensions_mut().insert(Caller(caller));
    next.run(req).await
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
