use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Dispute, GameState, HistoryEntry, Person};

/// The three store collections a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    GameState,
    History,
    Disputes,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::GameState, Table::History, Table::Disputes];
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, profile: Person },

    /// A Subscribe took effect; everything after this is filtered by it
    Subscribed { tables: Vec<Table> },

    /// Totals, images or setup flag changed
    GameStateChanged { state: GameState },

    /// A point was awarded
    HistoryInserted { entry: HistoryEntry },

    /// An entry was reworded or marked disputed
    HistoryUpdated { entry: HistoryEntry },

    /// An entry was disputed
    DisputeInserted { dispute: Dispute },

    /// A dispute was approved or rejected
    DisputeUpdated { dispute: Dispute },

    /// History and disputes were wiped
    Reset { state: GameState },
}

impl GatewayEvent {
    /// Returns the table this event is scoped to.
    /// Events that return `None` touch every table (or none) and go to all clients.
    pub fn table(&self) -> Option<Table> {
        match self {
            Self::GameStateChanged { .. } => Some(Table::GameState),
            Self::HistoryInserted { .. } | Self::HistoryUpdated { .. } => Some(Table::History),
            Self::DisputeInserted { .. } | Self::DisputeUpdated { .. } => Some(Table::Disputes),
            Self::Ready { .. } | Self::Subscribed { .. } | Self::Reset { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Only forward table-scoped events for these tables.
    Subscribe { tables: Vec<Table> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"Subscribe","data":{"tables":["history","disputes"]}}"#)
                .unwrap();
        assert_eq!(
            cmd,
            GatewayCommand::Subscribe { tables: vec![Table::History, Table::Disputes] }
        );

        let json = serde_json::to_value(GatewayEvent::Reset { state: GameState::default() }).unwrap();
        assert_eq!(json["type"], "Reset");
        assert_eq!(json["data"]["state"]["my_points"], 0);
    }

    #[test]
    fn test_event_tables() {
        let state = GameState::default();
        assert_eq!(
            GatewayEvent::GameStateChanged { state: state.clone() }.table(),
            Some(Table::GameState)
        );
        assert_eq!(GatewayEvent::Reset { state }.table(), None);
        assert_eq!(GatewayEvent::Subscribed { tables: vec![Table::History] }.table(), None);
    }
}
