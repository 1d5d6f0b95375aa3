//! Ledger write paths. Every operation runs in one SQLite transaction and
//! returns the rows it touched as they are after commit.

use rusqlite::Transaction;
use tally_types::ledger::{MAX_AMOUNT, default_reason, is_blank, is_valid_amount};
use tally_types::{Dispute, DisputeStatus, GameState, HistoryEntry, Person};
use tracing::info;

use crate::Database;
use crate::models::now_timestamp;
use crate::queries::{query_dispute, query_entry, query_game_state};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be nonzero")]
    ZeroAmount,

    #[error("amount {0} is outside -{max}..={max}", max = MAX_AMOUNT)]
    AmountOutOfRange(i64),

    #[error("reason must not be empty")]
    EmptyReason,

    #[error("history entry {0} not found")]
    EntryNotFound(i64),

    #[error("history entry {0} is already disputed")]
    AlreadyDisputed(i64),

    #[error("dispute {0} not found")]
    DisputeNotFound(i64),

    #[error("dispute {0} is already {1}")]
    AlreadyResolved(i64, &'static str),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.into())
    }
}

type LedgerResult<T> = Result<T, LedgerError>;

impl Database {
    fn transact<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> LedgerResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Record `amount` points for `person`. A blank reason gets the default
    /// text for the sign of the amount.
    pub fn award_point(
        &self,
        actor: Option<Person>,
        person: Person,
        amount: i64,
        reason: &str,
    ) -> LedgerResult<(HistoryEntry, GameState)> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if !is_valid_amount(amount) {
            return Err(LedgerError::AmountOutOfRange(amount));
        }
        let reason = if is_blank(reason) {
            default_reason(amount)
        } else {
            reason.trim()
        };

        let (entry, state) = self.transact(|tx| {
            tx.execute(
                "INSERT INTO history (person, amount, reason, given_by, disputed, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                rusqlite::params![
                    person.as_str(),
                    amount,
                    reason,
                    actor.map(|a| a.as_str()),
                    now_timestamp(),
                ],
            )?;
            let id = tx.last_insert_rowid();

            let entry = query_entry(tx, id)?.ok_or(LedgerError::EntryNotFound(id))?;
            Ok((entry, query_game_state(tx)?))
        })?;

        info!(
            "{} awarded {:+} to {} (entry {})",
            actor.map_or("nobody", |a| a.as_str()),
            amount,
            person,
            entry.id
        );
        Ok((entry, state))
    }

    /// Mark an entry disputed and open a pending dispute against it.
    pub fn dispute_entry(&self, entry_id: i64, reason: &str) -> LedgerResult<(HistoryEntry, Dispute)> {
        if is_blank(reason) {
            return Err(LedgerError::EmptyReason);
        }

        let (entry, dispute) = self.transact(|tx| {
            let entry = query_entry(tx, entry_id)?.ok_or(LedgerError::EntryNotFound(entry_id))?;
            if entry.disputed {
                return Err(LedgerError::AlreadyDisputed(entry_id));
            }

            tx.execute("UPDATE history SET disputed = 1 WHERE id = ?1", [entry_id])?;
            tx.execute(
                "INSERT INTO disputes (entry_id, dispute_reason, status, created_at)
                 VALUES (?1, ?2, 'pending', ?3)",
                rusqlite::params![entry_id, reason.trim(), now_timestamp()],
            )?;
            let dispute_id = tx.last_insert_rowid();

            let dispute =
                query_dispute(tx, dispute_id)?.ok_or(LedgerError::DisputeNotFound(dispute_id))?;
            Ok((dispute.entry.clone(), dispute))
        })?;

        info!("Entry {} disputed (dispute {})", entry_id, dispute.id);
        Ok((entry, dispute))
    }

    /// Approve (the point stands) or reject (the point is reverted) a
    /// pending dispute. Resolved disputes are never touched again.
    pub fn resolve_dispute(&self, dispute_id: i64, approved: bool) -> LedgerResult<(Dispute, GameState)> {
        let status = DisputeStatus::from_decision(approved);

        let (dispute, state) = self.transact(|tx| {
            let current =
                query_dispute(tx, dispute_id)?.ok_or(LedgerError::DisputeNotFound(dispute_id))?;
            if current.status.is_terminal() {
                return Err(LedgerError::AlreadyResolved(dispute_id, current.status.as_str()));
            }

            tx.execute(
                "UPDATE disputes SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.as_str(), dispute_id],
            )?;

            let dispute =
                query_dispute(tx, dispute_id)?.ok_or(LedgerError::DisputeNotFound(dispute_id))?;
            Ok((dispute, query_game_state(tx)?))
        })?;

        info!(
            "Dispute {} {} ({:+} for {})",
            dispute_id,
            status.as_str(),
            dispute.entry.amount,
            dispute.entry.person
        );
        Ok((dispute, state))
    }

    pub fn edit_reason(&self, entry_id: i64, reason: &str) -> LedgerResult<HistoryEntry> {
        if is_blank(reason) {
            return Err(LedgerError::EmptyReason);
        }

        let entry = self.transact(|tx| {
            let changed = tx.execute(
                "UPDATE history SET reason = ?1 WHERE id = ?2",
                rusqlite::params![reason.trim(), entry_id],
            )?;
            if changed == 0 {
                return Err(LedgerError::EntryNotFound(entry_id));
            }
            query_entry(tx, entry_id)?.ok_or(LedgerError::EntryNotFound(entry_id))
        })?;

        info!("Entry {} reason edited", entry_id);
        Ok(entry)
    }

    /// Delete every dispute and history entry. Images and the setup flag stay.
    pub fn reset_all(&self) -> LedgerResult<GameState> {
        let state = self.transact(|tx| {
            tx.execute("DELETE FROM disputes", [])?;
            tx.execute("DELETE FROM history", [])?;
            tx.execute("UPDATE game_state SET updated_at = ?1 WHERE id = 1", [now_timestamp()])?;
            Ok(query_game_state(tx)?)
        })?;

        info!("Scoreboard reset");
        Ok(state)
    }

    /// First-time setup: store both images and mark the game as set up.
    pub fn setup(&self, my_image: Option<&str>, their_image: Option<&str>) -> LedgerResult<GameState> {
        let state = self.transact(|tx| {
            tx.execute(
                "INSERT INTO game_state (id, my_image, their_image, is_setup, updated_at)
                 VALUES (1, ?1, ?2, 1, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    my_image = excluded.my_image,
                    their_image = excluded.their_image,
                    is_setup = 1,
                    updated_at = excluded.updated_at",
                rusqlite::params![my_image, their_image, now_timestamp()],
            )?;
            Ok(query_game_state(tx)?)
        })?;

        info!("Game set up");
        Ok(state)
    }

    /// Replace whichever images are given; the others are kept.
    pub fn update_images(
        &self,
        my_image: Option<&str>,
        their_image: Option<&str>,
    ) -> LedgerResult<GameState> {
        self.transact(|tx| {
            tx.execute(
                "INSERT INTO game_state (id, my_image, their_image, is_setup, updated_at)
                 VALUES (1, ?1, ?2, 1, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    my_image = COALESCE(excluded.my_image, game_state.my_image),
                    their_image = COALESCE(excluded.their_image, game_state.their_image),
                    is_setup = 1,
                    updated_at = excluded.updated_at",
                rusqlite::params![my_image, their_image, now_timestamp()],
            )?;
            Ok(query_game_state(tx)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_totals_follow_history() {
        let db = db();
        let awards = [
            (Person::Filipe, 1),
            (Person::Carlota, -1),
            (Person::Filipe, 1),
            (Person::Filipe, -1),
            (Person::Carlota, 3),
        ];
        for (person, amount) in awards {
            db.award_point(Some(person.other()), person, amount, "because").unwrap();
        }

        let state = db.snapshot(20).unwrap().state;
        for person in Person::ALL {
            let expected: i64 = awards.iter().filter(|(p, _)| *p == person).map(|(_, a)| a).sum();
            assert_eq!(state.points(person), expected);
        }
        assert_eq!(db.get_history(50).unwrap().len(), awards.len());
    }

    #[test]
    fn test_award_fills_default_reason() {
        let db = db();
        let (up, _) = db.award_point(Some(Person::Carlota), Person::Filipe, 1, "   ").unwrap();
        let (down, state) = db.award_point(None, Person::Carlota, -1, "").unwrap();

        assert_eq!(up.reason, "Boa vibração!");
        assert_eq!(up.given_by, Some(Person::Carlota));
        assert_eq!(down.reason, "Ups!");
        assert_eq!(down.given_by, None);
        assert_eq!((state.my_points, state.their_points), (1, -1));
    }

    #[test]
    fn test_award_rejects_zero() {
        let db = db();
        assert!(matches!(
            db.award_point(None, Person::Filipe, 0, "nothing"),
            Err(LedgerError::ZeroAmount)
        ));
        assert!(db.get_history(50).unwrap().is_empty());
    }

    #[test]
    fn test_award_rejects_oversized_amounts() {
        let db = db();
        for amount in [i64::MAX, i64::MIN, MAX_AMOUNT + 1] {
            assert!(matches!(
                db.award_point(None, Person::Filipe, amount, "too much"),
                Err(LedgerError::AmountOutOfRange(a)) if a == amount
            ));
        }
        assert!(db.get_history(50).unwrap().is_empty());

        // The store stays usable afterwards
        let (_, state) = db.award_point(None, Person::Filipe, MAX_AMOUNT, "max").unwrap();
        assert_eq!(state.my_points, MAX_AMOUNT);
    }

    #[test]
    fn test_dispute_rejections_leave_state_alone() {
        let db = db();
        let (entry, _) = db.award_point(Some(Person::Filipe), Person::Carlota, -1, "late").unwrap();

        assert!(matches!(db.dispute_entry(entry.id, "  "), Err(LedgerError::EmptyReason)));
        assert!(matches!(db.dispute_entry(999, "unfair"), Err(LedgerError::EntryNotFound(999))));
        assert!(!db.snapshot(20).unwrap().history[0].disputed);
        assert!(db.snapshot(20).unwrap().disputes.is_empty());

        let (disputed, dispute) = db.dispute_entry(entry.id, "unfair").unwrap();
        assert!(disputed.disputed);
        assert_eq!(dispute.status, DisputeStatus::Pending);
        assert_eq!(dispute.entry_id(), entry.id);

        assert!(matches!(
            db.dispute_entry(entry.id, "still unfair"),
            Err(LedgerError::AlreadyDisputed(_))
        ));
        let disputes = db.snapshot(20).unwrap().disputes;
        assert_eq!(disputes.len(), 1);
        assert_eq!(disputes[0].dispute_reason, "unfair");
    }

    #[test]
    fn test_reject_reverts_exactly_once() {
        let db = db();
        db.award_point(Some(Person::Carlota), Person::Filipe, 1, "nice").unwrap();
        let (late, _) = db.award_point(Some(Person::Filipe), Person::Carlota, -1, "late").unwrap();
        let (_, dispute) = db.dispute_entry(late.id, "unfair").unwrap();

        let (resolved, state) = db.resolve_dispute(dispute.id, false).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Rejected);
        assert_eq!((state.my_points, state.their_points), (1, 0));

        assert!(matches!(
            db.resolve_dispute(dispute.id, false),
            Err(LedgerError::AlreadyResolved(_, "rejected"))
        ));
        assert!(matches!(
            db.resolve_dispute(dispute.id, true),
            Err(LedgerError::AlreadyResolved(..))
        ));

        let state = db.snapshot(20).unwrap().state;
        assert_eq!((state.my_points, state.their_points), (1, 0));
        let disputes = db.snapshot(20).unwrap().disputes;
        assert_eq!(disputes.len(), 1);
        assert_eq!(disputes[0].status, DisputeStatus::Rejected);
    }

    #[test]
    fn test_approve_keeps_totals() {
        let db = db();
        let (entry, before) = db.award_point(Some(Person::Filipe), Person::Carlota, 2, "kind").unwrap();
        let (_, dispute) = db.dispute_entry(entry.id, "too generous").unwrap();

        let (resolved, after) = db.resolve_dispute(dispute.id, true).unwrap();
        assert_eq!(resolved.status, DisputeStatus::Approved);
        assert_eq!(after.my_points, before.my_points);
        assert_eq!(after.their_points, before.their_points);
    }

    #[test]
    fn test_resolve_unknown_dispute() {
        let db = db();
        assert!(matches!(db.resolve_dispute(4, true), Err(LedgerError::DisputeNotFound(4))));
    }

    #[test]
    fn test_edit_reason() {
        let db = db();
        let (entry, _) = db.award_point(Some(Person::Filipe), Person::Carlota, 1, "typo").unwrap();

        assert!(matches!(db.edit_reason(entry.id, ""), Err(LedgerError::EmptyReason)));
        assert!(matches!(db.edit_reason(42, "fixed"), Err(LedgerError::EntryNotFound(42))));

        let edited = db.edit_reason(entry.id, "fixed").unwrap();
        assert_eq!(edited.reason, "fixed");
        assert_eq!(db.snapshot(20).unwrap().history[0].reason, "fixed");
    }

    #[test]
    fn test_reset_clears_everything_but_images() {
        let db = db();
        db.setup(Some("data:image/png;base64,AAA"), Some("data:image/png;base64,BBB")).unwrap();
        let (entry, _) = db.award_point(Some(Person::Filipe), Person::Carlota, -1, "late").unwrap();
        db.award_point(Some(Person::Carlota), Person::Filipe, 1, "nice").unwrap();
        let (_, dispute) = db.dispute_entry(entry.id, "unfair").unwrap();
        db.resolve_dispute(dispute.id, false).unwrap();

        let state = db.reset_all().unwrap();
        assert_eq!((state.my_points, state.their_points), (0, 0));
        assert!(state.is_setup);
        assert_eq!(state.my_image.as_deref(), Some("data:image/png;base64,AAA"));

        let snapshot = db.snapshot(20).unwrap();
        assert!(snapshot.history.is_empty());
        assert!(snapshot.disputes.is_empty());

        // Reset on an empty store is fine too.
        let state = db.reset_all().unwrap();
        assert_eq!((state.my_points, state.their_points), (0, 0));
    }

    #[test]
    fn test_setup_and_images() {
        let db = db();
        assert!(!db.snapshot(20).unwrap().state.is_setup);

        let state = db.setup(Some("me"), None).unwrap();
        assert!(state.is_setup);
        assert_eq!(state.my_image.as_deref(), Some("me"));
        assert_eq!(state.their_image, None);

        let state = db.update_images(None, Some("them")).unwrap();
        assert_eq!(state.my_image.as_deref(), Some("me"));
        assert_eq!(state.their_image.as_deref(), Some("them"));
    }

    #[test]
    fn test_one_dispute_per_entry_in_schema() {
        let db = db();
        let (entry, _) = db.award_point(None, Person::Filipe, 1, "x").unwrap();
        db.dispute_entry(entry.id, "first").unwrap();

        let second = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO disputes (entry_id, dispute_reason) VALUES (?1, 'again')",
                [entry.id],
            )?;
            Ok(())
        });
        assert!(second.is_err());
    }

    #[test]
    fn test_snapshot_order_and_limit() {
        let db = db();
        for i in 1..=5 {
            db.award_point(None, Person::Filipe, 1, &format!("r{i}")).unwrap();
        }

        let snapshot = db.snapshot(3).unwrap();
        let reasons: Vec<_> = snapshot.history.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, vec!["r5", "r4", "r3"]);
        // Totals cover all history, not just the page.
        assert_eq!(snapshot.state.my_points, 5);
    }
}
