use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::{RwLock, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use huddle_db::Database;
use huddle_db::queries::{conversations, members};
use huddle_types::api::Claims;
use huddle_types::events::{ChangeEvent, ChangeScope, GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Subscriptions = Arc<RwLock<HashSet<Uuid>>>;

/// The subset of `workspace_ids` in which `user_id` holds a member row.
pub fn member_workspaces(
    db: &Database,
    user_id: Uuid,
    workspace_ids: &[Uuid],
) -> anyhow::Result<HashSet<Uuid>> {
    db.with_conn(|conn| {
        let mut allowed = HashSet::new();
        for &workspace_id in workspace_ids {
            if members::by_workspace_user(conn, workspace_id, user_id)?.is_some() {
                allowed.insert(workspace_id);
            }
        }
        Ok(allowed)
    })
}

async fn member_workspaces_async(
    db: &Arc<Database>,
    user_id: Uuid,
    workspace_ids: Vec<Uuid>,
) -> HashSet<Uuid> {
    let db = db.clone();
    let result =
        tokio::task::spawn_blocking(move || member_workspaces(&db, user_id, &workspace_ids)).await;
    match result {
        Ok(Ok(allowed)) => allowed,
        Ok(Err(e)) => {
            error!("Membership lookup failed for {}: {:#}", user_id, e);
            HashSet::new()
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            HashSet::new()
        }
    }
}

/// Whether `user_id` holds one of the two member rows of `conversation_id`.
pub fn is_participant(db: &Database, user_id: Uuid, conversation_id: Uuid) -> anyhow::Result<bool> {
    db.with_conn(|conn| {
        let Some(conversation) = conversations::by_id(conn, conversation_id)? else {
            return Ok(false);
        };
        let member = members::by_workspace_user(conn, conversation.workspace_id, user_id)?;
        Ok(member.is_some_and(|m| conversation.includes(m.id)))
    })
}

async fn is_participant_async(db: &Arc<Database>, user_id: Uuid, conversation_id: Uuid) -> bool {
    let db = db.clone();
    let result =
        tokio::task::spawn_blocking(move || is_participant(&db, user_id, conversation_id)).await;
    match result {
        Ok(Ok(participant)) => participant,
        Ok(Err(e)) => {
            error!("Participant lookup failed for {}: {:#}", user_id, e);
            false
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            false
        }
    }
}

fn to_text(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            error!("Failed to serialize gateway event: {}", e);
            None
        }
    }
}

/// Handle a single WebSocket connection: Identify, then relay changes for
/// the workspaces the client subscribes to.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    // Step 2: Send Ready event
    let Some(ready) = to_text(&GatewayEvent::Ready { user_id }) else {
        return;
    };
    if sender.send(ready).await.is_err() {
        return;
    }

    let open = dispatcher.connection_opened();
    info!("{} connected to gateway ({} open)", user_id, open);

    run_connection_loop(sender, receiver, dispatcher.clone(), db, user_id).await;

    let open = dispatcher.connection_closed();
    info!("{} disconnected from gateway ({} open)", user_id, open);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
) {
    let mut broadcast_rx = dispatcher.subscribe();

    // Workspaces this connection relays, shared between send and recv tasks.
    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    // Replies to commands go out through the send task.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let send_db = db.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;
        // Conversation id -> whether this user takes part in it.
        let mut participation: HashMap<Uuid, bool> = HashMap::new();

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !is_relayed(&event, &*send_subscriptions.read().await) {
                        continue;
                    }

                    if let Some(conversation_id) = conversation_of(&event.scope) {
                        let participant = match participation.get(&conversation_id) {
                            Some(&participant) => participant,
                            None => {
                                let participant =
                                    is_participant_async(&send_db, user_id, conversation_id).await;
                                participation.insert(conversation_id, participant);
                                participant
                            }
                        };
                        if !participant {
                            continue;
                        }
                    }

                    let workspace_id = event.workspace_id;
                    let membership_changed = matches!(
                        event.scope,
                        ChangeScope::Members | ChangeScope::WorkspaceRemoved
                    );

                    let Some(text) = to_text(&GatewayEvent::Changed(event)) else {
                        continue;
                    };
                    if sender.send(text).await.is_err() {
                        break;
                    }

                    if membership_changed {
                        participation.clear();
                    }

                    // Stop relaying a workspace once the caller is no longer in it.
                    if membership_changed
                        && member_workspaces_async(&send_db, user_id, vec![workspace_id])
                            .await
                            .is_empty()
                    {
                        send_subscriptions.write().await.remove(&workspace_id);
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(reply) = reply else { break };
                    let Some(text) = to_text(&reply) else { continue };
                    if sender.send(text).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&db, user_id, cmd, &recv_subscriptions, &reply_tx).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Uuid> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify)
        .await
        .ok()
        .flatten()
}

async fn handle_command(
    db: &Arc<Database>,
    user_id: Uuid,
    cmd: GatewayCommand,
    subscriptions: &Subscriptions,
    reply_tx: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { workspace_ids } => {
            let requested = workspace_ids.len();
            let allowed = member_workspaces_async(db, user_id, workspace_ids).await;
            info!(
                "{} subscribed to {} of {} requested workspaces",
                user_id,
                allowed.len(),
                requested
            );

            let mut workspace_ids: Vec<Uuid> = allowed.iter().copied().collect();
            workspace_ids.sort();
            *subscriptions.write().await = allowed;
            let _ = reply_tx.send(GatewayEvent::Subscribed { workspace_ids });
        }
    }
}

/// Whether `event` should reach a connection subscribed to `subscriptions`.
pub fn is_relayed(event: &ChangeEvent, subscriptions: &HashSet<Uuid>) -> bool {
    subscriptions.contains(&event.workspace_id)
}

/// The conversation an event is confined to. Such events only reach the
/// conversation's two participants.
pub fn conversation_of(scope: &ChangeScope) -> Option<Uuid> {
    match scope {
        ChangeScope::Messages {
            conversation_id, ..
        }
        | ChangeScope::Reactions {
            conversation_id, ..
        } => *conversation_id,
        _ => None,
    }
}
