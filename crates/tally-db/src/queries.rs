use crate::models::{DisputeRow, GameStateRow, HistoryRow, UserRow, parse_timestamp};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};
use tally_types::api::Snapshot;
use tally_types::ledger::Scoreboard;
use tally_types::{Dispute, DisputeStatus, GameState, HistoryEntry, Person};

/// Upper bound for a single history page.
pub const MAX_HISTORY_LIMIT: u32 = 200;

impl Database {
    // -- Users --

    /// Returns false when the email is already taken.
    pub fn create_user(&self, id: &str, email: &str, password_hash: &str, profile: Person) -> Result<bool> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, email, password, profile) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, profile.as_str()),
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    // -- Reads --

    pub fn get_history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        self.with_conn(|conn| query_history(conn, limit))
    }

    /// All three collections read under one lock, so the snapshot is consistent.
    pub fn snapshot(&self, history_limit: u32) -> Result<Snapshot> {
        self.with_conn(|conn| {
            Ok(Snapshot {
                state: query_game_state(conn)?,
                history: query_history(conn, history_limit)?,
                disputes: query_disputes(conn)?,
            })
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, password, profile, created_at FROM users WHERE email = ?1",
    )?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                profile: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Current scoreboard. A missing row reads as a fresh, not-set-up game.
pub(crate) fn query_game_state(conn: &Connection) -> Result<GameState> {
    let row = conn
        .query_row(
            "SELECT my_image, their_image, is_setup, updated_at FROM game_state WHERE id = 1",
            [],
            |row| {
                Ok(GameStateRow {
                    my_image: row.get(0)?,
                    their_image: row.get(1)?,
                    is_setup: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()?;

    let board = query_scoreboard(conn)?;

    let mut state = match row {
        Some(row) => GameState {
            my_image: row.my_image,
            their_image: row.their_image,
            is_setup: row.is_setup,
            updated_at: Some(parse_timestamp(&row.updated_at)),
            ..GameState::default()
        },
        None => GameState::default(),
    };
    state.my_points = board.total(Person::Filipe);
    state.their_points = board.total(Person::Carlota);
    Ok(state)
}

/// Fold every history line, with its dispute status, into totals.
pub(crate) fn query_scoreboard(conn: &Connection) -> Result<Scoreboard> {
    let mut stmt = conn.prepare(
        "SELECT h.person, h.amount, d.status
         FROM history h
         LEFT JOIN disputes d ON d.entry_id = h.id",
    )?;

    let lines = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut folded = Vec::with_capacity(lines.len());
    for (person, amount, status) in lines {
        let person: Person = person.parse()?;
        let status = status.map(|s| s.parse::<DisputeStatus>()).transpose()?;
        folded.push((person, amount, status));
    }

    Ok(Scoreboard::fold(folded)?)
}

const HISTORY_COLUMNS: &str = "id, person, amount, reason, given_by, disputed, created_at";

fn history_row(row: &Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        person: row.get(1)?,
        amount: row.get(2)?,
        reason: row.get(3)?,
        given_by: row.get(4)?,
        disputed: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn query_entry(conn: &Connection, id: i64) -> Result<Option<HistoryEntry>> {
    let sql = format!("SELECT {HISTORY_COLUMNS} FROM history WHERE id = ?1");
    conn.query_row(&sql, [id], history_row)
        .optional()?
        .map(HistoryRow::into_entry)
        .transpose()
}

pub(crate) fn query_history(conn: &Connection, limit: u32) -> Result<Vec<HistoryEntry>> {
    let sql = format!(
        "SELECT {HISTORY_COLUMNS} FROM history ORDER BY created_at DESC, id DESC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([limit.min(MAX_HISTORY_LIMIT)], history_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(HistoryRow::into_entry).collect()
}

// JOIN history to fetch each dispute's entry in a single query
const DISPUTE_SELECT: &str =
    "SELECT d.id, d.dispute_reason, d.status, d.created_at,
            h.id, h.person, h.amount, h.reason, h.given_by, h.disputed, h.created_at
     FROM disputes d
     JOIN history h ON h.id = d.entry_id";

fn dispute_row(row: &Row<'_>) -> rusqlite::Result<DisputeRow> {
    Ok(DisputeRow {
        id: row.get(0)?,
        dispute_reason: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        entry: HistoryRow {
            id: row.get(4)?,
            person: row.get(5)?,
            amount: row.get(6)?,
            reason: row.get(7)?,
            given_by: row.get(8)?,
            disputed: row.get(9)?,
            created_at: row.get(10)?,
        },
    })
}

pub(crate) fn query_dispute(conn: &Connection, id: i64) -> Result<Option<Dispute>> {
    let sql = format!("{DISPUTE_SELECT} WHERE d.id = ?1");
    conn.query_row(&sql, [id], dispute_row)
        .optional()?
        .map(DisputeRow::into_dispute)
        .transpose()
}

pub(crate) fn query_disputes(conn: &Connection) -> Result<Vec<Dispute>> {
    let sql = format!("{DISPUTE_SELECT} ORDER BY d.created_at DESC, d.id DESC");
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([], dispute_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(DisputeRow::into_dispute).collect()
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_email_is_reported() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_user("u1", "carlota@example.com", "hash", Person::Carlota).unwrap());
        // Same address in another case still collides
        assert!(!db.create_user("u2", "CARLOTA@example.com", "hash", Person::Filipe).unwrap());

        let user = db.get_user_by_email("carlota@example.com").unwrap().unwrap();
        assert_eq!(user.id, "u1");
    }
}
