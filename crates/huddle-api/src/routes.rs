use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::resolve_identity;
use crate::{channels, conversations, files, members, messages, reactions, users, workspaces};

/// All HTTP operations. Identity is resolved for every route; each handler
/// decides whether a missing caller fails or degrades.
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.blobs.max_bytes);

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/users/me", get(users::get_current))
        .route(
            "/workspaces",
            get(workspaces::list_workspaces).post(workspaces::create_workspace),
        )
        .route(
            "/workspaces/{id}",
            get(workspaces::get_workspace)
                .patch(workspaces::update_workspace)
                .delete(workspaces::remove_workspace),
        )
        .route("/workspaces/{id}/info", get(workspaces::get_workspace_info))
        .route("/workspaces/{id}/join", post(workspaces::join_workspace))
        .route("/workspaces/{id}/join-code", post(workspaces::rotate_join_code))
        .route("/workspaces/{id}/members", get(members::list_members))
        .route(
            "/workspaces/{id}/members/current",
            get(members::get_current_member),
        )
        .route("/workspaces/{id}/search", get(members::search_workspace))
        .route(
            "/workspaces/{id}/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route(
            "/workspaces/{id}/conversations",
            post(conversations::create_or_get_conversation),
        )
        .route(
            "/members/{id}",
            get(members::get_member)
                .patch(members::update_member)
                .delete(members::remove_member),
        )
        .route(
            "/channels/{id}",
            get(channels::get_channel)
                .patch(channels::update_channel)
                .delete(channels::remove_channel),
        )
        .route(
            "/messages",
            get(messages::get_messages).post(messages::create_message),
        )
        .route(
            "/messages/{id}",
            get(messages::get_message)
                .patch(messages::update_message)
                .delete(messages::remove_message),
        )
        .route("/messages/{id}/forward", post(messages::forward_message))
        .route("/messages/{id}/reactions", post(reactions::toggle_reaction))
        .route("/files", post(files::upload_file).layer(upload_limit))
        .route("/files/{id}", get(files::download_file))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .with_state(state)
}
