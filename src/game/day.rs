use std::collections::{BTreeMap, HashMap, HashSet};

use crate::protocol::PlayerId;

/// Day-phase ballot box. Reset at every day entry. A voter may overwrite
/// their vote until resolution; the `submitted` set only grows.
#[derive(Debug, Default, Clone)]
pub struct DayVotes {
    votes: HashMap<PlayerId, (Option<PlayerId>, u64)>,
    submitted: HashSet<PlayerId>,
}

impl DayVotes {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record(&mut self, voter: PlayerId, target: Option<PlayerId>, seq: u64) {
        self.votes.insert(voter.clone(), (target, seq));
        self.submitted.insert(voter);
    }

    pub fn has_submitted(&self, voter: &PlayerId) -> bool {
        self.submitted.contains(voter)
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    /// Wire view: non-empty votes in a stable order plus the submitted set.
    pub fn wire_view(&self) -> (BTreeMap<PlayerId, PlayerId>, Vec<PlayerId>) {
        let votes = self
            .votes
            .iter()
            .filter_map(|(voter, (target, _))| {
                target.as_ref().map(|t| (voter.clone(), t.clone()))
            })
            .collect();
        let mut submitted: Vec<PlayerId> = self.submitted.iter().cloned().collect();
        submitted.sort();
        (votes, submitted)
    }

    /// Count non-empty votes and apply the majority rule.
    ///
    /// Majority threshold is strictly more than half the living players.
    /// The top candidate at or above the threshold is eliminated; a tie at
    /// the top resolves to the target whose earliest current vote arrived
    /// first. Anything else is a hung vote.
    pub fn outcome(&self, alive_count: usize) -> DayOutcome {
        let threshold = alive_count / 2 + 1;

        let mut tally: HashMap<&PlayerId, (usize, u64)> = HashMap::new();
        for (target, seq) in self.votes.values().filter_map(|(t, seq)| {
            t.as_ref().map(|target| (target, *seq))
        }) {
            let entry = tally.entry(target).or_insert((0, u64::MAX));
            entry.0 += 1;
            entry.1 = entry.1.min(seq);
        }

        let top = tally
            .into_iter()
            .min_by(|(_, (count_a, seq_a)), (_, (count_b, seq_b))| {
                count_b.cmp(count_a).then(seq_a.cmp(seq_b))
            });

        match top {
            Some((target, (count, _))) if count >= threshold => DayOutcome {
                eliminated: Some(target.clone()),
                no_majority: false,
            },
            _ => DayOutcome {
                eliminated: None,
                no_majority: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOutcome {
    pub eliminated: Option<PlayerId>,
    pub no_majority: bool,
}
