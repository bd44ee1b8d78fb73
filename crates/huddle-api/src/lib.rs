pub mod auth;
pub mod channels;
pub mod conversations;
pub mod error;
pub mod files;
pub mod gate;
pub mod members;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod read_model;
pub mod routes;
pub mod session;
pub mod users;
pub mod validate;
pub mod workspaces;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
