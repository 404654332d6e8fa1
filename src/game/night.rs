use std::collections::HashMap;

use crate::protocol::{PlayerId, Role};

/// A recorded mafia night vote. The sequence number is assigned at
/// validation time and drives the earliest-first-vote tie-break.
#[derive(Debug, Clone)]
pub struct MafiaBallot {
    pub target: Option<PlayerId>,
    pub seq: u64,
}

/// Night-phase action sheet. Reset at every night entry.
#[derive(Debug, Default, Clone)]
pub struct NightActions {
    pub mafia_votes: HashMap<PlayerId, MafiaBallot>,
    pub doctor_target: Option<PlayerId>,
    pub doctor_submitted: bool,
    pub detective_target: Option<PlayerId>,
    pub detective_submitted: bool,
}

impl NightActions {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_mafia_vote(&mut self, voter: PlayerId, target: Option<PlayerId>, seq: u64) {
        self.mafia_votes.insert(voter, MafiaBallot { target, seq });
    }

    /// Whether `actor` has already acted this night.
    pub fn has_submitted(&self, actor: &PlayerId, role: Role) -> bool {
        match role {
            Role::Mafia | Role::Godfather => self.mafia_votes.contains_key(actor),
            Role::Doctor => self.doctor_submitted,
            Role::Detective => self.detective_submitted,
            Role::Villager => false,
        }
    }

    /// The mafia's collective target: a non-empty Godfather ballot wins
    /// outright; otherwise the plurality target, ties resolved in favor of
    /// the target whose earliest current vote arrived first.
    pub fn resolved_mafia_target(
        &self,
        roles: &HashMap<PlayerId, Role>,
    ) -> Option<PlayerId> {
        let godfather_pick = self.mafia_votes.iter().find_map(|(voter, ballot)| {
            (roles.get(voter) == Some(&Role::Godfather))
                .then(|| ballot.target.clone())
                .flatten()
        });
        if godfather_pick.is_some() {
            return godfather_pick;
        }

        let mut tally: HashMap<&PlayerId, (usize, u64)> = HashMap::new();
        for ballot in self.mafia_votes.values() {
            let Some(target) = &ballot.target else {
                continue;
            };
            let entry = tally.entry(target).or_insert((0, u64::MAX));
            entry.0 += 1;
            entry.1 = entry.1.min(ballot.seq);
        }

        tally
            .into_iter()
            .min_by(|(_, (count_a, seq_a)), (_, (count_b, seq_b))| {
                count_b.cmp(count_a).then(seq_a.cmp(seq_b))
            })
            .map(|(target, _)| target.clone())
    }
}
