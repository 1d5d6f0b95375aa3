//! Database row types. These map directly to SQLite rows and stay
//! stringly-typed; conversion into tally-types models happens here.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tally_types::{Dispute, DisputeStatus, HistoryEntry, Person};
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub profile: String,
    pub created_at: String,
}

impl UserRow {
    pub fn profile(&self) -> Result<Person> {
        self.profile
            .parse()
            .with_context(|| format!("corrupt profile on user '{}'", self.id))
    }
}

pub struct GameStateRow {
    pub my_image: Option<String>,
    pub their_image: Option<String>,
    pub is_setup: bool,
    pub updated_at: String,
}

pub struct HistoryRow {
    pub id: i64,
    pub person: String,
    pub amount: i64,
    pub reason: String,
    pub given_by: Option<String>,
    pub disputed: bool,
    pub created_at: String,
}

impl HistoryRow {
    pub fn into_entry(self) -> Result<HistoryEntry> {
        let person = self
            .person
            .parse()
            .with_context(|| format!("corrupt person on entry {}", self.id))?;

        // An unknown awarder is kept as "nobody" rather than failing the read.
        let given_by = self.given_by.as_deref().and_then(|g| {
            g.parse::<Person>()
                .map_err(|e| warn!("Corrupt given_by on entry {}: {}", self.id, e))
                .ok()
        });

        Ok(HistoryEntry {
            id: self.id,
            person,
            amount: self.amount,
            reason: self.reason,
            given_by,
            disputed: self.disputed,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

pub struct DisputeRow {
    pub id: i64,
    pub dispute_reason: String,
    pub status: String,
    pub created_at: String,
    pub entry: HistoryRow,
}

impl DisputeRow {
    pub fn into_dispute(self) -> Result<Dispute> {
        let status: DisputeStatus = self
            .status
            .parse()
            .with_context(|| format!("corrupt status on dispute {}", self.id))?;

        Ok(Dispute {
            id: self.id,
            entry: self.entry.into_entry()?,
            dispute_reason: self.dispute_reason,
            status,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

/// Fixed-width UTC timestamp so lexical order matches time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Rows written by SQLite defaults use
/// "YYYY-MM-DD HH:MM:SS" without timezone; treat those as UTC.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2026-03-01T10:20:30.000001Z");
        let sqlite = parse_timestamp("2026-03-01 10:20:30");
        assert_eq!(rfc.timestamp(), sqlite.timestamp());
        assert_eq!(parse_timestamp("garbage"), DateTime::<Utc>::default());
    }

    #[test]
    fn test_unknown_given_by_is_dropped() {
        let row = HistoryRow {
            id: 7,
            person: "Carlota".into(),
            amount: -1,
            reason: "late".into(),
            given_by: Some("Mallory".into()),
            disputed: false,
            created_at: now_timestamp(),
        };
        let entry = row.into_entry().unwrap();
        assert_eq!(entry.person, Person::Carlota);
        assert_eq!(entry.given_by, None);
    }
}
