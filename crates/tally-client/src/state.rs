use tally_types::api::Snapshot;
use tally_types::events::GatewayEvent;
use tally_types::ledger::{self, AmountFilter, PointStats, TotalOverflow};
use tally_types::{Dispute, DisputeStatus, GameState, HistoryEntry, Person};

/// The client's copy of the store, kept current by merging change events.
#[derive(Debug, Clone)]
pub struct LocalState {
    snapshot: Snapshot,
    history_limit: usize,
}

impl LocalState {
    /// `history_limit` should match the limit the snapshot was fetched with.
    pub fn new(snapshot: Snapshot, history_limit: usize) -> Self {
        let mut state = Self {
            snapshot,
            history_limit,
        };
        state.snapshot.history.truncate(history_limit);
        state
    }

    /// Replace everything, e.g. after reconnecting.
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.snapshot.history.truncate(self.history_limit);
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn game(&self) -> &GameState {
        &self.snapshot.state
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.snapshot.history
    }

    pub fn disputes(&self) -> &[Dispute] {
        &self.snapshot.disputes
    }

    /// Merge one event. Returns false for events that carry no data change.
    pub fn apply(&mut self, event: &GatewayEvent) -> bool {
        match event {
            GatewayEvent::Ready { .. } | GatewayEvent::Subscribed { .. } => return false,

            GatewayEvent::GameStateChanged { state } => {
                self.snapshot.state = state.clone();
            }

            GatewayEvent::HistoryInserted { entry } => {
                if self.find_entry(entry.id).is_none() {
                    self.snapshot.history.insert(0, entry.clone());
                    self.snapshot.history.truncate(self.history_limit);
                }
            }

            GatewayEvent::HistoryUpdated { entry } => self.update_entry(entry),

            GatewayEvent::DisputeInserted { dispute } | GatewayEvent::DisputeUpdated { dispute } => {
                match self.snapshot.disputes.iter_mut().find(|d| d.id == dispute.id) {
                    Some(existing) => *existing = dispute.clone(),
                    None => self.snapshot.disputes.insert(0, dispute.clone()),
                }
                self.update_entry(&dispute.entry);
            }

            GatewayEvent::Reset { state } => {
                self.snapshot.history.clear();
                self.snapshot.disputes.clear();
                self.snapshot.state = state.clone();
            }
        }
        true
    }

    /// An entry may appear in history and nested in its dispute.
    fn update_entry(&mut self, entry: &HistoryEntry) {
        if let Some(existing) = self.snapshot.history.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        }
        for dispute in self.snapshot.disputes.iter_mut().filter(|d| d.entry.id == entry.id) {
            dispute.entry = entry.clone();
        }
    }

    pub fn find_entry(&self, id: i64) -> Option<&HistoryEntry> {
        self.snapshot.history.iter().find(|e| e.id == id)
    }

    pub fn stats(&self, person: Person) -> Result<PointStats, TotalOverflow> {
        ledger::compute_stats(person, &self.snapshot.history)
    }

    pub fn leader(&self) -> Option<Person> {
        self.snapshot.state.leader()
    }

    pub fn pending_disputes(&self) -> impl Iterator<Item = &Dispute> {
        self.snapshot
            .disputes
            .iter()
            .filter(|d| d.status == DisputeStatus::Pending)
    }

    pub fn filter_history(&self, person: Option<Person>, kind: AmountFilter) -> Vec<&HistoryEntry> {
        ledger::filter_history(&self.snapshot.history, person, kind)
    }

    /// Whether `actor`'s buttons are live on `target`'s card.
    pub fn can_award(&self, actor: Person, target: Person) -> bool {
        ledger::can_award(actor, target)
    }

    pub fn can_change_image(&self, actor: Person, person: Person) -> bool {
        ledger::can_change_image(actor, person)
    }

    pub fn can_dispute(&self, actor: Person, entry_id: i64) -> bool {
        self.find_entry(entry_id).is_some_and(|e| ledger::can_dispute(actor, e))
    }

    pub fn can_edit(&self, actor: Person, entry_id: i64) -> bool {
        self.find_entry(entry_id).is_some_and(|e| ledger::can_edit(actor, e))
    }
}
