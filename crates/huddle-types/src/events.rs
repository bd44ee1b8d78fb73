use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The index range a committed mutation touched. Subscribers refetch any
/// query that reads from the same range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ChangeScope {
    Workspace,
    WorkspaceRemoved,
    Members,
    Channels,
    Conversations,
    Messages {
        channel_id: Option<Uuid>,
        conversation_id: Option<Uuid>,
        parent_message_id: Option<Uuid>,
    },
    /// Reactions on one message. `conversation_id` is set when the message
    /// lives in a conversation.
    Reactions {
        message_id: Uuid,
        conversation_id: Option<Uuid>,
    },
    /// Messages across the workspace changed, e.g. a member's history was
    /// removed.
    AllMessages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub workspace_id: Uuid,
    #[serde(flatten)]
    pub scope: ChangeScope,
}

impl ChangeEvent {
    pub fn new(workspace_id: Uuid, scope: ChangeScope) -> Self {
        Self { workspace_id, scope }
    }
}

/// Sink for change notifications. Storage code publishes after commit and
/// never learns how (or whether) events reach clients.
pub trait ChangeNotifier: Send + Sync {
    fn publish(&self, event: ChangeEvent);
}

/// Notifier that drops every event.
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn publish(&self, _event: ChangeEvent) {}
}

/// Events sent over the websocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// Workspaces the connection now receives changes for
    Subscribed { workspace_ids: Vec<Uuid> },

    /// Data behind a subscribed query changed
    Changed(ChangeEvent),
}

/// Commands sent FROM client TO server over websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the websocket connection
    Identify { token: String },

    /// Replace the set of workspaces this connection listens to.
    /// Workspaces the caller is not a member of are dropped silently.
    Subscribe { workspace_ids: Vec<Uuid> },
}
