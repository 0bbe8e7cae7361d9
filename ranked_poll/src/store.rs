//! Per-poll storage of the rank assignments of every voter.

use log::debug;
use snafu::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::*;

/// The current choices of every voter, slot by slot.
///
/// The store enforces the ranking invariants of a poll: a voter has at most one option per
/// slot, and never the same option in two slots.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankingStore {
    options: Vec<String>,
    // slot -> (voter -> index in options)
    slots: Vec<BTreeMap<VoterId, usize>>,
}

impl RankingStore {
    pub fn new(config: &PollConfig) -> RankingStore {
        RankingStore {
            options: config.options().to_vec(),
            slots: vec![BTreeMap::new(); config.rankings()],
        }
    }

    pub fn rankings(&self) -> usize {
        self.slots.len()
    }

    /// Records `option` in `slot` for this voter and returns what the slot held before.
    ///
    /// Assigning the option the slot already holds is accepted. If the voter holds `option` in
    /// another slot, nothing changes and `DuplicateOptionAcrossRanks` names that slot.
    pub fn assign(
        &mut self,
        voter: &VoterId,
        slot: usize,
        option: &str,
    ) -> Result<Option<String>, PollError> {
        self.check_slot(slot)?;
        let idx = self
            .options
            .iter()
            .position(|o| o == option)
            .context(InvalidOptionSnafu { option })?;

        let existing = self
            .slots
            .iter()
            .enumerate()
            .find_map(|(s, votes)| (s != slot && votes.get(voter) == Some(&idx)).then_some(s));
        if let Some(existing_slot) = existing {
            debug!(
                "assign: voter {} already ranks {:?} in slot {}",
                voter, option, existing_slot
            );
            return DuplicateOptionAcrossRanksSnafu {
                option,
                slot: existing_slot,
            }
            .fail();
        }

        let previous = self.slots[slot].insert(voter.clone(), idx);
        debug!(
            "assign: voter {} slot {}: {:?} -> {:?}",
            voter, slot, previous, option
        );
        Ok(previous.map(|p| self.options[p].clone()))
    }

    /// Removes the choice of this voter in `slot`, if there is one, and returns it.
    pub fn withdraw(&mut self, voter: &VoterId, slot: usize) -> Result<Option<String>, PollError> {
        self.check_slot(slot)?;
        let removed = self.slots[slot].remove(voter);
        debug!("withdraw: voter {} slot {}: {:?}", voter, slot, removed);
        Ok(removed.map(|p| self.options[p].clone()))
    }

    /// The ordered preferences of every voter that holds at least one choice.
    ///
    /// Slots are read in order and empty slots are skipped.
    pub fn snapshot(&self) -> Preferences {
        let mut res = Preferences::new();
        for votes in self.slots.iter() {
            for (voter, idx) in votes.iter() {
                res.entry(voter.clone())
                    .or_default()
                    .push(self.options[*idx].clone());
            }
        }
        res
    }

    /// The choices of one voter, indexed by slot.
    pub fn voter_ballot(&self, voter: &VoterId) -> Vec<Option<String>> {
        self.slots
            .iter()
            .map(|votes| votes.get(voter).map(|idx| self.options[*idx].clone()))
            .collect()
    }

    pub fn voter_count(&self) -> usize {
        let voters: BTreeSet<&VoterId> = self.slots.iter().flat_map(|votes| votes.keys()).collect();
        voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|votes| votes.is_empty())
    }

    fn check_slot(&self, slot: usize) -> Result<(), PollError> {
        ensure!(
            slot < self.slots.len(),
            InvalidSlotSnafu {
                slot,
                rankings: self.slots.len()
            }
        );
        Ok(())
    }
}
