use anyhow::anyhow;
use rusqlite::Connection;
use tracing::error;
use uuid::Uuid;

use huddle_types::events::{ChangeEvent, ChangeScope};

use crate::auth::AppState;
use crate::error::ApiError;

/// One handler invocation: the connection (inside a transaction for
/// mutations), the resolved caller, and the changes to announce on commit.
pub struct Session<'c> {
    pub conn: &'c Connection,
    caller: Option<Uuid>,
    changes: Vec<ChangeEvent>,
}

impl<'c> Session<'c> {
    pub fn new(conn: &'c Connection, caller: Option<Uuid>) -> Self {
        Self {
            conn,
            caller,
            changes: Vec::new(),
        }
    }

    /// Caller's user id. Mutations fail closed without one.
    pub fn caller(&self) -> Result<Uuid, ApiError> {
        self.caller.ok_or(ApiError::Unauthenticated)
    }

    /// Caller's user id for queries, which degrade instead of failing.
    pub fn viewer(&self) -> Option<Uuid> {
        self.caller
    }

    pub fn changed(&mut self, workspace_id: Uuid, scope: ChangeScope) {
        let event = ChangeEvent::new(workspace_id, scope);
        if !self.changes.contains(&event) {
            self.changes.push(event);
        }
    }

    pub fn into_changes(self) -> Vec<ChangeEvent> {
        self.changes
    }
}

/// Run `f` as one atomic mutation off the async runtime, then publish the
/// changes it recorded. Nothing is published when `f` fails.
pub async fn mutate<F, T>(state: &AppState, caller: Option<Uuid>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Session<'_>) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let st = state.clone();
    let (value, changes) = tokio::task::spawn_blocking(move || {
        st.db.with_tx(|conn| {
            let mut session = Session::new(conn, caller);
            let value = f(&mut session)?;
            Ok::<_, ApiError>((value, session.into_changes()))
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow!("mutation task failed"))
    })??;

    for event in changes {
        state.notifier.publish(event);
    }
    Ok(value)
}

/// Run read-only `f` off the async runtime.
pub async fn query<F, T>(state: &AppState, caller: Option<Uuid>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Session<'_>) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let st = state.clone();
    tokio::task::spawn_blocking(move || {
        st.db.with_conn(|conn| {
            let session = Session::new(conn, caller);
            f(&session)
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Storage(anyhow!("query task failed"))
    })?
}
