pub mod api;
pub mod events;
pub mod ledger;
pub mod models;

pub use models::{Dispute, DisputeStatus, GameState, HistoryEntry, Person};
