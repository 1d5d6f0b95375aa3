//! Pure ledger folds shared by the store and the client.

use serde::{Deserialize, Serialize};

use crate::models::{DisputeStatus, HistoryEntry, Person};

/// Largest magnitude a single award may carry.
pub const MAX_AMOUNT: i64 = 100;

/// A point total left the `i64` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("point total overflowed")]
pub struct TotalOverflow;

/// Nonzero and within `MAX_AMOUNT` either way.
pub fn is_valid_amount(amount: i64) -> bool {
    amount != 0 && (-MAX_AMOUNT..=MAX_AMOUNT).contains(&amount)
}

/// Reason stored when a point is awarded without one.
pub fn default_reason(amount: i64) -> &'static str {
    if amount > 0 { "Boa vibração!" } else { "Ups!" }
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Per-person totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scoreboard {
    pub filipe: i64,
    pub carlota: i64,
}

impl Scoreboard {
    /// Fold `(person, amount, dispute status)` lines into totals.
    ///
    /// An entry counts unless its dispute was rejected.
    pub fn fold<I>(lines: I) -> Result<Self, TotalOverflow>
    where
        I: IntoIterator<Item = (Person, i64, Option<DisputeStatus>)>,
    {
        let mut board = Self::default();
        for (person, amount, status) in lines {
            if counts(status) {
                let total = board.total_mut(person);
                *total = total.checked_add(amount).ok_or(TotalOverflow)?;
            }
        }
        Ok(board)
    }

    pub fn total(&self, person: Person) -> i64 {
        match person {
            Person::Filipe => self.filipe,
            Person::Carlota => self.carlota,
        }
    }

    fn total_mut(&mut self, person: Person) -> &mut i64 {
        match person {
            Person::Filipe => &mut self.filipe,
            Person::Carlota => &mut self.carlota,
        }
    }
}

/// Whether an entry with the given dispute status is still part of the totals.
pub fn counts(status: Option<DisputeStatus>) -> bool {
    status != Some(DisputeStatus::Rejected)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointStats {
    pub person: Person,
    pub positive_points: i64,
    /// Sum of the negative amounts, so zero or below.
    pub negative_points: i64,
    pub entries: Vec<HistoryEntry>,
}

pub fn compute_stats(person: Person, history: &[HistoryEntry]) -> Result<PointStats, TotalOverflow> {
    let entries: Vec<HistoryEntry> = history
        .iter()
        .filter(|e| e.person == person)
        .cloned()
        .collect();

    let (mut positive_points, mut negative_points) = (0i64, 0i64);
    for e in &entries {
        let sum = if e.amount > 0 { &mut positive_points } else { &mut negative_points };
        *sum = sum.checked_add(e.amount).ok_or(TotalOverflow)?;
    }

    Ok(PointStats {
        person,
        positive_points,
        negative_points,
        entries,
    })
}

/// Activity filter by sign of the amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountFilter {
    #[default]
    All,
    Positive,
    Negative,
}

impl AmountFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        match self {
            Self::All => true,
            Self::Positive => entry.amount > 0,
            Self::Negative => entry.amount < 0,
        }
    }
}

pub fn filter_history<'a>(
    history: &'a [HistoryEntry],
    person: Option<Person>,
    kind: AmountFilter,
) -> Vec<&'a HistoryEntry> {
    history
        .iter()
        .filter(|e| person.is_none_or(|p| e.person == p) && kind.matches(e))
        .collect()
}

/// Points always go to the other person.
pub fn can_award(actor: Person, target: Person) -> bool {
    actor != target
}

/// Each person picks their own picture.
pub fn can_change_image(actor: Person, person: Person) -> bool {
    actor == person
}

/// Only the recipient may dispute, and only once.
pub fn can_dispute(actor: Person, entry: &HistoryEntry) -> bool {
    entry.person == actor && !entry.disputed
}

/// Only the awarder may reword a reason, and only before it is disputed.
pub fn can_edit(actor: Person, entry: &HistoryEntry) -> bool {
    entry.given_by == Some(actor) && !entry.disputed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: i64, person: Person, amount: i64) -> HistoryEntry {
        HistoryEntry {
            id,
            person,
            amount,
            reason: format!("entry {id}"),
            given_by: Some(person.other()),
            disputed: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stats_partition_by_sign() {
        let history = vec![
            entry(1, Person::Filipe, 1),
            entry(2, Person::Filipe, -1),
            entry(3, Person::Carlota, 1),
            entry(4, Person::Filipe, 3),
            entry(5, Person::Filipe, -2),
        ];

        let stats = compute_stats(Person::Filipe, &history).unwrap();
        assert_eq!(stats.positive_points, 4);
        assert_eq!(stats.negative_points, -3);
        assert_eq!(
            stats.entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![1, 2, 4, 5]
        );

        // Same input, same output; the two sums cover every entry once.
        assert_eq!(compute_stats(Person::Filipe, &history).unwrap(), stats);
        let total: i64 = stats.entries.iter().map(|e| e.amount).sum();
        assert_eq!(stats.positive_points + stats.negative_points, total);
    }

    #[test]
    fn test_stats_empty_history() {
        let stats = compute_stats(Person::Carlota, &[]).unwrap();
        assert_eq!(stats.positive_points, 0);
        assert_eq!(stats.negative_points, 0);
        assert!(stats.entries.is_empty());
    }

    #[test]
    fn test_scoreboard_skips_rejected() {
        let board = Scoreboard::fold([
            (Person::Filipe, 1, None),
            (Person::Carlota, -1, Some(DisputeStatus::Rejected)),
            (Person::Carlota, 2, Some(DisputeStatus::Approved)),
            (Person::Filipe, -1, Some(DisputeStatus::Pending)),
        ])
        .unwrap();
        assert_eq!(board.total(Person::Filipe), 0);
        assert_eq!(board.total(Person::Carlota), 2);
    }

    #[test]
    fn test_totals_never_wrap() {
        let board = Scoreboard::fold([(Person::Filipe, i64::MAX, None), (Person::Filipe, 1, None)]);
        assert_eq!(board, Err(TotalOverflow));

        // A rejected line never enters the sum
        let board = Scoreboard::fold([
            (Person::Filipe, i64::MAX, None),
            (Person::Filipe, 1, Some(DisputeStatus::Rejected)),
        ]);
        assert_eq!(board.unwrap().total(Person::Filipe), i64::MAX);

        let history = vec![entry(1, Person::Carlota, i64::MIN), entry(2, Person::Carlota, -1)];
        assert_eq!(compute_stats(Person::Carlota, &history), Err(TotalOverflow));
    }

    #[test]
    fn test_amount_bounds() {
        assert!(is_valid_amount(1));
        assert!(is_valid_amount(-MAX_AMOUNT));
        assert!(is_valid_amount(MAX_AMOUNT));
        assert!(!is_valid_amount(0));
        assert!(!is_valid_amount(MAX_AMOUNT + 1));
        assert!(!is_valid_amount(i64::MIN));
    }

    #[test]
    fn test_default_reason() {
        assert_eq!(default_reason(1), "Boa vibração!");
        assert_eq!(default_reason(-1), "Ups!");
        assert!(is_blank("  \t"));
        assert!(!is_blank(" ok "));
    }

    #[test]
    fn test_filter_history() {
        let history = vec![
            entry(1, Person::Filipe, 1),
            entry(2, Person::Carlota, -1),
            entry(3, Person::Carlota, 1),
        ];
        let ids = |v: Vec<&HistoryEntry>| v.iter().map(|e| e.id).collect::<Vec<_>>();

        assert_eq!(ids(filter_history(&history, None, AmountFilter::All)), vec![1, 2, 3]);
        assert_eq!(ids(filter_history(&history, Some(Person::Carlota), AmountFilter::All)), vec![2, 3]);
        assert_eq!(ids(filter_history(&history, None, AmountFilter::Negative)), vec![2]);
        assert_eq!(ids(filter_history(&history, Some(Person::Filipe), AmountFilter::Negative)), Vec::<i64>::new());
    }

    #[test]
    fn test_permissions() {
        let mut e = entry(1, Person::Carlota, -1);
        e.given_by = Some(Person::Filipe);

        assert!(can_dispute(Person::Carlota, &e));
        assert!(!can_dispute(Person::Filipe, &e));
        assert!(can_edit(Person::Filipe, &e));
        assert!(!can_edit(Person::Carlota, &e));

        e.disputed = true;
        assert!(!can_dispute(Person::Carlota, &e));
        assert!(!can_edit(Person::Filipe, &e));

        assert!(can_award(Person::Filipe, Person::Carlota));
        assert!(!can_award(Person::Carlota, Person::Carlota));
        assert!(can_change_image(Person::Carlota, Person::Carlota));
        assert!(!can_change_image(Person::Carlota, Person::Filipe));
    }
}
