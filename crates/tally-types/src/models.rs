use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two fixed participants of the scoreboard.
///
/// Filipe owns the "my" side of `GameState` and Carlota the "their" side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Person {
    Filipe,
    Carlota,
}

impl Person {
    pub const ALL: [Person; 2] = [Person::Filipe, Person::Carlota];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filipe => "Filipe",
            Self::Carlota => "Carlota",
        }
    }

    pub fn other(&self) -> Person {
        match self {
            Self::Filipe => Self::Carlota,
            Self::Carlota => Self::Filipe,
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown person: {0}")]
pub struct UnknownPerson(pub String);

impl FromStr for Person {
    type Err = UnknownPerson;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Filipe" => Ok(Self::Filipe),
            "Carlota" => Ok(Self::Carlota),
            other => Err(UnknownPerson(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Pending,
    Approved,
    Rejected,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected disputes never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn from_decision(approved: bool) -> Self {
        if approved { Self::Approved } else { Self::Rejected }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dispute status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DisputeStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The singleton scoreboard row.
///
/// `my_points` belongs to Filipe and `their_points` to Carlota. Both are
/// folded from history by the store on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub my_image: Option<String>,
    pub their_image: Option<String>,
    pub my_points: i64,
    pub their_points: i64,
    pub is_setup: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GameState {
    pub fn points(&self, person: Person) -> i64 {
        match person {
            Person::Filipe => self.my_points,
            Person::Carlota => self.their_points,
        }
    }

    /// `None` on a tie.
    pub fn leader(&self) -> Option<Person> {
        match self.my_points.cmp(&self.their_points) {
            std::cmp::Ordering::Greater => Some(Person::Filipe),
            std::cmp::Ordering::Less => Some(Person::Carlota),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub person: Person,
    pub amount: i64,
    pub reason: String,
    pub given_by: Option<Person>,
    pub disputed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: i64,
    /// The disputed entry as it is now (its `disputed` flag is always set).
    pub entry: HistoryEntry,
    pub dispute_reason: String,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
}

impl Dispute {
    pub fn entry_id(&self) -> i64 {
        self.entry.id
    }
}
