use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_types::Person;
use tally_types::events::{GatewayCommand, GatewayEvent, Table};

use crate::error::{ClientError, Result};

/// A live change feed. Dropping it closes the connection.
pub struct Subscription {
    pub user_id: Uuid,
    pub profile: Person,
    pub events: mpsc::UnboundedReceiver<GatewayEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Next change event, or None once the connection is gone.
    pub async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connect, identify, subscribe to `tables`, and stream change events.
///
/// Returns once the server has applied the subscription.
pub async fn subscribe(gateway_url: &str, token: &str, tables: Vec<Table>) -> Result<Subscription> {
    let (ws, _) = connect_async(gateway_url).await?;
    let (mut sink, mut stream) = ws.split();

    let identify = serde_json::to_string(&GatewayCommand::Identify { token: token.to_string() })?;
    sink.send(Message::Text(identify.into())).await?;

    // Nothing is delivered before Ready
    let (user_id, profile) = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayEvent>(&text)? {
                GatewayEvent::Ready { user_id, profile } => break (user_id, profile),
                other => debug!("Ignoring {:?} before Ready", other),
            },
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ClientError::GatewayClosed),
        }
    };

    let subscribe = serde_json::to_string(&GatewayCommand::Subscribe { tables })?;
    sink.send(Message::Text(subscribe.into())).await?;

    // Changes that land before the ack are unfiltered but still real
    let (tx, events) = mpsc::unbounded_channel();
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayEvent>(&text)? {
                GatewayEvent::Subscribed { .. } => break,
                event => {
                    let _ = tx.send(event);
                }
            },
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ClientError::GatewayClosed),
        }
    }
    info!("Subscribed to gateway as {}", profile);

    let task = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<GatewayEvent>(&text) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Bad gateway event: {}", e),
                },
                // tungstenite answers pings on the next write; flush it now
                Ok(Message::Ping(_)) => {
                    if sink.flush().await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Gateway connection error: {}", e);
                    break;
                }
            }
        }
        info!("Gateway connection closed");
    });

    Ok(Subscription {
        user_id,
        profile,
        events,
        task,
    })
}
