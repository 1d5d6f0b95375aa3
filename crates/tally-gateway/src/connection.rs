use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tally_types::api::Claims;
use tally_types::events::{GatewayCommand, GatewayEvent, Table};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// A client that has not identified by then is dropped.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Which tables a connection wants table-scoped events for.
/// Until the first Subscribe every table is forwarded.
#[derive(Debug, Default)]
pub struct Subscriptions {
    tables: Option<HashSet<Table>>,
}

impl Subscriptions {
    pub fn set(&mut self, tables: impl IntoIterator<Item = Table>) {
        self.tables = Some(tables.into_iter().collect());
    }

    /// Events without a table are global and always allowed.
    pub fn allows(&self, table: Option<Table>) -> bool {
        match (table, &self.tables) {
            (None, _) | (_, None) => true,
            (Some(t), Some(tables)) => tables.contains(&t),
        }
    }
}

/// Handle a WebSocket connection whose token was already validated at the
/// HTTP upgrade layer: skip the Identify handshake.
pub async fn handle_connection_authenticated(socket: WebSocket, dispatcher: Dispatcher, claims: Claims) {
    let (sender, receiver) = socket.split();
    run_connection_loop(sender, receiver, dispatcher, claims).await;
}

/// Handle a WebSocket connection that authenticates with an Identify command.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (sender, mut receiver) = socket.split();

    let claims = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    run_connection_loop(sender, receiver, dispatcher, claims).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    claims: Claims,
) {
    let user_id = claims.sub;
    let profile = claims.profile;

    // Subscribe before Ready so nothing published after Ready is missed
    let mut broadcast_rx = dispatcher.subscribe();

    let ready = GatewayEvent::Ready { user_id, profile };
    let ready = match serde_json::to_string(&ready) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize Ready: {}", e);
            return;
        }
    };
    if sender.send(Message::Text(ready.into())).await.is_err() {
        return;
    }

    info!("{} ({}) connected to gateway", profile, user_id);

    // Shared between the send and recv tasks.
    let subscriptions: Arc<RwLock<Subscriptions>> = Arc::new(RwLock::new(Subscriptions::default()));
    let send_subscriptions = subscriptions.clone();

    // Direct replies to this client, written by the send task
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let wanted = send_subscriptions
                        .read()
                        .map(|subs| subs.allows(msg.table))
                        .unwrap_or(true);
                    if !wanted {
                        continue;
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Some(reply) = reply_rx.recv() => {
                    let text = match serde_json::to_string(&reply) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize reply: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
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
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if let Some(reply) = handle_command(profile, cmd, &recv_subscriptions) {
                            let _ = reply_tx.send(reply);
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            profile,
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

    info!("{} ({}) disconnected from gateway", profile, user_id);
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<Claims> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text) {
                    return Claims::verify(&token, jwt_secret).ok();
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

/// Apply a command. Returns the reply to send back, if any.
fn handle_command(
    profile: tally_types::Person,
    cmd: GatewayCommand,
    subscriptions: &Arc<RwLock<Subscriptions>>,
) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Identify { .. } => None, // Already handled

        GatewayCommand::Subscribe { tables } => {
            info!("{} subscribing to {:?}", profile, tables);
            match subscriptions.write() {
                Ok(mut subs) => subs.set(tables.iter().copied()),
                Err(e) => {
                    warn!("Subscription lock poisoned: {}", e);
                    return None;
                }
            }
            Some(GatewayEvent::Subscribed { tables })
        }
    }
}
