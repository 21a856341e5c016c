//! Hierarchy ordering: fixes the signing chain when a document is created.
//!
//! Signers are ranked by organisational title (rank 1 signs first). Ties
//! fall back to the order the caller asked for, then to input position.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::UserId;

/// Rank given to signers whose title is missing or not in the table.
pub const UNRANKED: u32 = 999;

/// Mapping from role title to signing priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTable {
    ranks: HashMap<String, u32>,
    #[serde(default = "default_unranked")]
    unranked: u32,
}

fn default_unranked() -> u32 {
    UNRANKED
}

impl RankTable {
    /// An empty table: every signer is unranked.
    pub fn empty() -> Self {
        Self {
            ranks: HashMap::new(),
            unranked: UNRANKED,
        }
    }

    /// Add or replace the rank of a title.
    pub fn with_rank(mut self, title: &str, rank: u32) -> Self {
        self.ranks.insert(normalize_title(title), rank);
        self
    }

    /// Override the rank used for unknown titles.
    pub fn with_unranked(mut self, rank: u32) -> Self {
        self.unranked = rank;
        self
    }

    /// Rank for a title; unknown or missing titles sign last.
    pub fn rank_of(&self, title: Option<&str>) -> u32 {
        title
            .and_then(|t| self.ranks.get(&normalize_title(t)).copied())
            .unwrap_or(self.unranked)
    }

    /// Rank used for titles not in the table.
    pub fn unranked(&self) -> u32 {
        self.unranked
    }

    /// Normalized titles and their ranks, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.ranks.iter().map(|(title, rank)| (title.as_str(), *rank))
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::empty()
            .with_rank("VICE_PRESIDENT", 1)
            .with_rank("SENIOR_MANAGER", 2)
            .with_rank("MANAGER", 3)
            .with_rank("ASISTEN_MANAGER", 4)
            .with_rank("SUPERVISOR", 5)
            .with_rank("STAFF", 6)
    }
}

/// `"Senior Manager"`, `"senior-manager"` and `"SENIOR_MANAGER"` all match.
fn normalize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// A signer as requested by the document creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRequest {
    pub signer_id: UserId,
    pub requested_order: u32,
}

impl SignerRequest {
    pub fn new(signer_id: impl Into<String>, requested_order: u32) -> Self {
        Self {
            signer_id: UserId::new(signer_id),
            requested_order,
        }
    }
}

/// A signer's final position in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSlot {
    pub signer_id: UserId,
    /// 1-based, contiguous.
    pub order: u32,
}

/// Sort requested signers into the final chain.
///
/// Ascending rank, then ascending `requested_order`, then input position.
/// The result is renumbered `1..=N`; requested orders are discarded.
pub fn sort_signers(
    requested: &[SignerRequest],
    rank_of: impl Fn(&UserId) -> u32,
) -> Vec<SignerSlot> {
    let mut ranked: Vec<(u32, &SignerRequest)> = requested
        .iter()
        .map(|r| (rank_of(&r.signer_id), r))
        .collect();

    // sort_by_key is stable, which keeps input position as the last tie-break
    ranked.sort_by_key(|(rank, r)| (*rank, r.requested_order));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (_, r))| SignerSlot {
            signer_id: r.signer_id.clone(),
            order: i as u32 + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table_lookup<'a>(
        table: &'a RankTable,
        titles: &'a HashMap<UserId, &'a str>,
    ) -> impl Fn(&UserId) -> u32 + 'a {
        move |id| table.rank_of(titles.get(id).copied())
    }

    #[test]
    fn test_senior_signs_before_assistant() {
        let table = RankTable::default();
        let titles: HashMap<UserId, &str> = [
            (UserId::new("ana"), "ASISTEN_MANAGER"),
            (UserId::new("sam"), "SENIOR_MANAGER"),
        ]
        .into_iter()
        .collect();

        let sorted = sort_signers(
            &[SignerRequest::new("ana", 1), SignerRequest::new("sam", 2)],
            table_lookup(&table, &titles),
        );

        assert_eq!(
            sorted,
            vec![
                SignerSlot { signer_id: UserId::new("sam"), order: 1 },
                SignerSlot { signer_id: UserId::new("ana"), order: 2 },
            ]
        );
    }

    #[test]
    fn test_unknown_title_signs_last() {
        let table = RankTable::default();
        assert_eq!(table.rank_of(Some("Intern")), UNRANKED);
        assert_eq!(table.rank_of(None), UNRANKED);
        assert_eq!(table.rank_of(Some("senior manager")), 2);
    }

    #[test]
    fn test_ties_use_requested_order() {
        let sorted = sort_signers(
            &[
                SignerRequest::new("c", 9),
                SignerRequest::new("a", 1),
                SignerRequest::new("b", 5),
            ],
            |_| 3,
        );
        let ids: Vec<&str> = sorted.iter().map(|s| s.signer_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(sorted.iter().map(|s| s.order).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_custom_unranked() {
        let table = RankTable::empty().with_rank("boss", 5).with_unranked(1);
        assert_eq!(table.rank_of(Some("nobody")), 1);
        assert_eq!(table.rank_of(Some("BOSS")), 5);
        assert_eq!(table.unranked(), 1);
        assert_eq!(table.entries().collect::<Vec<_>>(), vec![("BOSS", 5)]);
    }

    #[test]
    fn test_empty_request() {
        assert!(sort_signers(&[], |_| 1).is_empty());
    }

    proptest! {
        #[test]
        fn test_sort_is_deterministic_and_contiguous(
            entries in prop::collection::vec((0u32..5, 0u32..4), 0..20)
        ) {
            let requests: Vec<SignerRequest> = entries
                .iter()
                .enumerate()
                .map(|(i, (_, requested))| SignerRequest::new(format!("s{i}"), *requested))
                .collect();
            let ranks: HashMap<UserId, u32> = entries
                .iter()
                .enumerate()
                .map(|(i, (rank, _))| (UserId::new(format!("s{i}")), *rank))
                .collect();
            let rank_of = |id: &UserId| ranks[id];

            let first = sort_signers(&requests, rank_of);
            let second = sort_signers(&requests, rank_of);
            prop_assert_eq!(&first, &second);

            let orders: Vec<u32> = first.iter().map(|s| s.order).collect();
            let expected: Vec<u32> = (1..=requests.len() as u32).collect();
            prop_assert_eq!(orders, expected);

            // Equal (rank, requested_order) keeps input position.
            for pair in first.windows(2) {
                let a = &pair[0].signer_id;
                let b = &pair[1].signer_id;
                let ia: usize = a.as_str()[1..].parse().unwrap();
                let ib: usize = b.as_str()[1..].parse().unwrap();
                let ka = (entries[ia].0, entries[ia].1);
                let kb = (entries[ib].0, entries[ib].1);
                prop_assert!(ka <= kb);
                if ka == kb {
                    prop_assert!(ia < ib);
                }
            }
        }
    }
}
