use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::UserRow;
use huddle_db::now_millis;
use huddle_db::queries::users;
use huddle_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use huddle_types::events::ChangeNotifier;

use crate::error::ApiError;
use crate::files::BlobStore;
use crate::session::{Session, mutate, query};
use crate::validate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub blobs: BlobStore,
}

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_TTL_DAYS: i64 = 30;

/// Insert a user account. The email must be unused.
pub fn create_account(
    s: &mut Session<'_>,
    name: &str,
    email: &str,
    password_hash: String,
    image: Option<String>,
) -> Result<UserRow, ApiError> {
    let name = validate::name(name)?;
    let email = normalize_email(email)?;

    if users::by_email(s.conn, &email)?.is_some() {
        return Err(ApiError::Conflict("Email is already registered"));
    }

    let user = UserRow {
        id: Uuid::new_v4(),
        name,
        email,
        password: password_hash,
        image,
        created_at: now_millis(),
    };
    users::insert(s.conn, &user)?;
    Ok(user)
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::Invalid("Invalid email address")),
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Invalid("Password must be at least 8 characters"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user = mutate(&state, None, move |s| {
        create_account(s, &req.name, &req.email, password_hash, req.image)
    })
    .await?;

    info!("Registered user {} ({})", user.name, user.id);
    let token = create_token(&state.jwt_secret, user.id, &user.name)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            name: user.name,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = query(&state, None, move |s| Ok(users::by_email(s.conn, &email)?))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)?;

    let token = create_token(&state.jwt_secret, user.id, &user.name)?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        name: user.name,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = create_token("secret", user_id, "ada").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|conn| {
            let mut s = Session::new(conn, None);
            let user = create_account(&mut s, "Ada", " Ada@Example.com ", "h".into(), None)?;
            assert_eq!(user.email, "ada@example.com");

            let err = create_account(&mut s, "Ada Two", "ada@example.com", "h".into(), None)
                .unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)));
            assert!(matches!(
                create_account(&mut s, "Bob", "not-an-email", "h".into(), None),
                Err(ApiError::Invalid(_))
            ));
            Ok::<_, ApiError>(())
        })
        .unwrap();
    }
}
