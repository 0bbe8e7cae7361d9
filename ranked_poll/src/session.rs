//! One live poll: the rankings of its voters and the latest tabulation.

use log::{debug, info, warn};
use parking_lot::Mutex;
use snafu::prelude::*;

use crate::config::*;
use crate::projector::{project, Projection};
use crate::store::RankingStore;
use crate::tabulate;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PollStatus {
    Open,
    Closed,
}

/// The outcome of a successful rank assignment.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Assignment {
    /// What the slot held before. The adapter uses it to retract the matching reaction.
    pub previous: Option<String>,
    pub result: TabulationResult,
}

#[derive(Debug)]
struct SessionState {
    status: PollStatus,
    store: RankingStore,
    last_result: TabulationResult,
}

impl SessionState {
    fn retabulate(&mut self, config: &PollConfig) -> Result<TabulationResult, PollError> {
        let result = tabulate(config.options(), &self.store.snapshot())?;
        self.last_result = result.clone();
        Ok(result)
    }
}

/// A poll open to votes.
///
/// All the mutations of a poll go through one lock: each of them reads the current rankings,
/// applies its change and recomputes the tabulation before the next one starts.
///
/// ```
/// use ranked_poll::open_poll;
/// # use ranked_poll::PollError;
///
/// let options = vec!["Pizza".to_string(), "Tacos".to_string(), "Sushi".to_string()];
/// let poll = open_poll(&options, 2)?;
///
/// poll.assign_rank("alice", 0, "Tacos")?;
/// let assignment = poll.assign_rank("alice", 0, "Sushi")?;
/// assert_eq!(assignment.previous, Some("Tacos".to_string()));
/// assert_eq!(assignment.result.winners, vec!["Sushi".to_string()]);
///
/// poll.close();
/// assert!(poll.withdraw_rank("alice", 0).is_err());
/// # Ok::<(), PollError>(())
/// ```
#[derive(Debug)]
pub struct PollSession {
    config: PollConfig,
    state: Mutex<SessionState>,
}

/// Opens a poll with the given options (2 to 10) and number of rankings (1 to the number of
/// options).
pub fn open_poll(options: &[String], rankings: usize) -> Result<PollSession, PollError> {
    PollSession::open(options, rankings)
}

impl PollSession {
    pub fn open(options: &[String], rankings: usize) -> Result<PollSession, PollError> {
        let config = PollConfig::new(options, rankings)?;
        let store = RankingStore::new(&config);
        let last_result = tabulate(config.options(), &store.snapshot())?;
        info!(
            "open: poll with options {:?} and {} rankings",
            config.options(),
            config.rankings()
        );
        Ok(PollSession {
            config,
            state: Mutex::new(SessionState {
                status: PollStatus::Open,
                store,
                last_result,
            }),
        })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn status(&self) -> PollStatus {
        self.state.lock().status
    }

    /// Places `option` in the `slot` of this voter and recomputes the result.
    ///
    /// Fails without touching the rankings if the poll is closed, if the slot or the option
    /// are unknown, or if the voter already ranks this option in another slot.
    pub fn assign_rank(
        &self,
        voter: impl Into<VoterId>,
        slot: usize,
        option: &str,
    ) -> Result<Assignment, PollError> {
        let voter = voter.into();
        let mut state = self.state.lock();
        ensure!(state.status == PollStatus::Open, PollClosedSnafu);
        let previous = state
            .store
            .assign(&voter, slot, option)
            .map_err(|e| {
                warn!("assign_rank: voter {} slot {}: {}", voter, slot, e);
                e
            })?;
        let result = state.retabulate(&self.config)?;
        debug!(
            "assign_rank: voter {} slot {} {:?} (was {:?}), winners {:?}",
            voter, slot, option, previous, result.winners
        );
        Ok(Assignment { previous, result })
    }

    /// Removes the choice of this voter in `slot` and recomputes the result.
    /// Withdrawing an empty slot is not an error.
    pub fn withdraw_rank(
        &self,
        voter: impl Into<VoterId>,
        slot: usize,
    ) -> Result<TabulationResult, PollError> {
        let voter = voter.into();
        let mut state = self.state.lock();
        ensure!(state.status == PollStatus::Open, PollClosedSnafu);
        let removed = state.store.withdraw(&voter, slot).map_err(|e| {
            warn!("withdraw_rank: voter {} slot {}: {}", voter, slot, e);
            e
        })?;
        let result = state.retabulate(&self.config)?;
        debug!(
            "withdraw_rank: voter {} slot {} removed {:?}, winners {:?}",
            voter, slot, removed, result.winners
        );
        Ok(result)
    }

    /// The result of the last computation. It does not recompute anything.
    pub fn current_result(&self) -> TabulationResult {
        self.state.lock().last_result.clone()
    }

    pub fn projection(&self) -> Projection {
        let result = self.current_result();
        project(self.config.options(), &result)
    }

    /// The current choices of one voter, indexed by slot.
    pub fn ballot(&self, voter: impl Into<VoterId>) -> Vec<Option<String>> {
        self.state.lock().store.voter_ballot(&voter.into())
    }

    pub fn voter_count(&self) -> usize {
        self.state.lock().store.voter_count()
    }

    /// Stops accepting votes. The rankings and the last result are kept.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.status == PollStatus::Closed {
            return;
        }
        state.status = PollStatus::Closed;
        info!(
            "close: poll closed with {} voters, winners {:?}",
            state.store.voter_count(),
            state.last_result.winners
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn names(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn session_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PollSession>();
    }

    #[test]
    fn open_rejects_bad_configuration() {
        assert!(matches!(
            open_poll(&names(&["A"]), 1),
            Err(PollError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            open_poll(&names(&["A", "B"]), 3),
            Err(PollError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn fresh_poll_is_a_tie() {
        init();
        let poll = open_poll(&names(&["A", "B", "C"]), 2).unwrap();
        let result = poll.current_result();
        assert!(result.winners.is_empty());
        assert_eq!(result.final_ranking.len(), 3);
        assert!(poll.projection().is_tied());
        assert_eq!(poll.status(), PollStatus::Open);
    }

    #[test]
    fn assign_returns_previous_and_result() {
        init();
        let poll = open_poll(&names(&["A", "B", "C"]), 2).unwrap();
        let a = poll.assign_rank("u1", 0, "A").unwrap();
        assert_eq!(a.previous, None);
        assert_eq!(a.result.winners, names(&["A"]));
        let b = poll.assign_rank("u1", 0, "B").unwrap();
        assert_eq!(b.previous, Some("A".to_string()));
        assert_eq!(b.result.winners, names(&["B"]));
        assert_eq!(poll.current_result(), b.result);
        assert_eq!(poll.ballot("u1"), vec![Some("B".to_string()), None]);
    }

    #[test]
    fn assign_then_withdraw_restores_result() {
        init();
        let poll = open_poll(&names(&["A", "B", "C", "D"]), 3).unwrap();
        poll.assign_rank("u1", 0, "A").unwrap();
        poll.assign_rank("u1", 1, "B").unwrap();
        poll.assign_rank("u2", 0, "B").unwrap();
        poll.assign_rank("u3", 0, "C").unwrap();
        poll.assign_rank("u3", 1, "A").unwrap();
        let before = poll.current_result();

        let during = poll.assign_rank("u4", 0, "D").unwrap().result;
        assert_ne!(during.rounds, before.rounds);
        let after = poll.withdraw_rank("u4", 0).unwrap();
        assert_eq!(after, before);
        assert_eq!(poll.current_result(), before);
    }

    #[test]
    fn duplicate_across_ranks_is_rejected() {
        init();
        let poll = open_poll(&names(&["A", "B", "C"]), 3).unwrap();
        poll.assign_rank("u1", 0, "A").unwrap();
        let before = poll.current_result();
        assert_eq!(
            poll.assign_rank("u1", 2, "A"),
            Err(PollError::DuplicateOptionAcrossRanks {
                option: "A".to_string(),
                slot: 0
            })
        );
        assert_eq!(poll.ballot("u1"), vec![Some("A".to_string()), None, None]);
        assert_eq!(poll.current_result(), before);
    }

    #[test]
    fn withdrawing_the_only_vote_leaves_a_tie() {
        init();
        let poll = open_poll(&names(&["A", "B", "C"]), 2).unwrap();
        poll.assign_rank("u1", 0, "B").unwrap();
        let result = poll.withdraw_rank("u1", 0).unwrap();
        assert!(result.winners.is_empty());
        assert_eq!(result.rounds[0].total(), 0);
        assert!(result.final_ranking.iter().all(|p| p.placement == 3));
        assert_eq!(result.elimination_order.len(), 3);
        assert_eq!(poll.voter_count(), 0);
    }

    #[test]
    fn closed_poll_rejects_mutations() {
        init();
        let poll = open_poll(&names(&["A", "B"]), 2).unwrap();
        poll.assign_rank("u1", 0, "A").unwrap();
        let last = poll.current_result();
        poll.close();
        poll.close();
        assert_eq!(poll.status(), PollStatus::Closed);
        assert_eq!(poll.assign_rank("u2", 0, "B"), Err(PollError::PollClosed));
        assert_eq!(poll.withdraw_rank("u1", 0), Err(PollError::PollClosed));
        assert_eq!(poll.current_result(), last);
        assert_eq!(poll.projection().winners(), vec!["A"]);
    }

    #[test]
    fn concurrent_assignments_are_serialized() {
        init();
        let options = names(&["A", "B", "C", "D"]);
        let poll = Arc::new(open_poll(&options, 4).unwrap());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let poll = poll.clone();
                let options = options.clone();
                thread::spawn(move || {
                    for i in 0..25u64 {
                        let voter = t * 100 + i;
                        for slot in 0..4 {
                            let option = &options[(slot + i as usize) % 4];
                            poll.assign_rank(voter, slot, option).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(poll.voter_count(), 200);
        let result = poll.current_result();
        assert_eq!(result.rounds[0].total(), 200);
        // The cached result is the one a fresh count of the final rankings gives.
        let fresh = {
            let state = poll.state.lock();
            tabulate(&options, &state.store.snapshot()).unwrap()
        };
        assert_eq!(result, fresh);
    }

    #[test]
    fn racing_reaction_swap_keeps_invariants() {
        init();
        // A user moves "A" from rank 1 to rank 2 while another thread replays the same
        // change: whatever the interleaving, the voter never holds "A" twice.
        let poll = Arc::new(open_poll(&names(&["A", "B", "C"]), 3).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let poll = poll.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _ = poll.assign_rank("u1", 0, "A");
                        let _ = poll.withdraw_rank("u1", 0);
                        let _ = poll.assign_rank("u1", 1, "A");
                        let _ = poll.withdraw_rank("u1", 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ballot = poll.ballot("u1");
        assert!(ballot.iter().filter(|o| o.as_deref() == Some("A")).count() <= 1);
    }
}
