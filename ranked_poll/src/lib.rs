pub mod builder;
mod config;
pub mod manual;
pub mod projector;
pub mod registry;
pub mod session;
pub mod store;

use log::{debug, info};
use snafu::prelude::*;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::AddAssign,
};

pub use crate::builder::Builder;
pub use crate::config::*;
pub use crate::projector::{
    project, GroupStatus, PlacementGroup, ProjectedEntry, Projection, RoundTable,
};
pub use crate::registry::{PollId, PollRegistry};
pub use crate::session::{open_poll, Assignment, PollSession, PollStatus};
pub use crate::store::RankingStore;

// **** Private structures ****

type RoundId = u32;

// Position of the option in the poll's option list. Comparing ids compares option order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct OptionId(u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
    const ONE: VoteCount = VoteCount(1);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

// The full preference list of one voter. It is never truncated during the count:
// the positional tiebreak needs the original positions.
// Invariant: no option appears twice.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
struct RankedChoice(Vec<OptionId>);

impl RankedChoice {
    /// The most preferred option that is still running, if any.
    fn first_valid(&self, still_valid: &[OptionId]) -> Option<OptionId> {
        self.0.iter().find(|oid| still_valid.contains(oid)).copied()
    }

    /// The weight of an option in this ballot: the first position is worth the number of
    /// options, and each following position one less. Unranked options are worth nothing.
    fn positional_score(&self, oid: OptionId, num_options: u64) -> u64 {
        self.0
            .iter()
            .position(|o| *o == oid)
            .map(|pos| num_options - pos as u64)
            .unwrap_or(0)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct RoundResult {
    round: RoundId,
    // In option order, including the options without any vote.
    tally: Vec<(OptionId, VoteCount)>,
    exhausted: VoteCount,
}

impl RoundResult {
    fn total(&self) -> VoteCount {
        self.tally.iter().map(|(_, vc)| *vc).sum()
    }

    fn count_of(&self, oid: OptionId) -> VoteCount {
        self.tally
            .iter()
            .find(|(o, _)| *o == oid)
            .map(|(_, vc)| *vc)
            .unwrap_or(VoteCount::EMPTY)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct EliminationInternal {
    oid: OptionId,
    round: RoundId,
    tiebreak: Tiebreak,
    transfers: Vec<(OptionId, VoteCount)>,
    exhausted: VoteCount,
}

impl EliminationInternal {
    fn swept(oid: OptionId, round: RoundId) -> EliminationInternal {
        EliminationInternal {
            oid,
            round,
            tiebreak: Tiebreak::None,
            transfers: Vec::new(),
            exhausted: VoteCount::EMPTY,
        }
    }
}

/// Runs the instant-runoff count over a snapshot of preferences.
///
/// Arguments:
/// * `options` the options of the poll. Their order is the fixed order used to break
/// ties that the vote counts and the positional scores cannot break.
/// * `preferences` the ordered choices of each voter.
///
/// The result is recomputed from scratch: the same inputs always give the same result.
///
/// ```
/// use ranked_poll::{tabulate, Preferences, VoterId};
/// # use ranked_poll::PollError;
///
/// let options = vec!["Anna".to_string(), "Bob".to_string()];
/// let mut preferences = Preferences::new();
/// preferences.insert(VoterId::from("u1"), vec!["Anna".to_string()]);
/// preferences.insert(VoterId::from("u2"), vec!["Anna".to_string(), "Bob".to_string()]);
///
/// let result = tabulate(&options, &preferences)?;
/// assert_eq!(result.winners, vec!["Anna".to_string()]);
/// assert_eq!(result.rounds.len(), 1);
/// # Ok::<(), PollError>(())
/// ```
pub fn tabulate(
    options: &[String],
    preferences: &Preferences,
) -> Result<TabulationResult, PollError> {
    info!(
        "tabulate: {:?} options, {:?} voters",
        options.len(),
        preferences.len()
    );
    let ballots = checks(options, preferences)?;
    let num_options = options.len() as u64;

    // The options that are still running, in option order.
    let mut remaining: Vec<OptionId> = (0..options.len())
        .map(|idx| OptionId(idx as u32))
        .collect();
    let mut placements: Vec<(OptionId, u32, VoteCount)> = Vec::new();
    let mut eliminations: Vec<EliminationInternal> = Vec::new();
    let mut winners: Vec<OptionId> = Vec::new();
    let mut rounds: Vec<RoundResult> = Vec::new();

    loop {
        let round_id = (rounds.len() + 1) as RoundId;
        // Every round without a winner removes one option.
        assert!(
            round_id as usize <= options.len(),
            "No convergence after {} rounds",
            rounds.len()
        );
        let round = compute_tally(&ballots, &remaining, round_id);
        debug!("tabulate: round {:?}: {:?}", round_id, round);
        let total = round.total();
        let current_placement = remaining.len() as u32;

        if total == VoteCount::EMPTY {
            debug!(
                "tabulate: round {:?}: no votes left, {:?} options tied last",
                round_id,
                remaining.len()
            );
            for oid in remaining.iter() {
                placements.push((*oid, current_placement, VoteCount::EMPTY));
                eliminations.push(EliminationInternal::swept(*oid, round_id));
            }
            rounds.push(round);
            break;
        }

        let majority: Vec<OptionId> = round
            .tally
            .iter()
            .filter(|(_, vc)| 2 * vc.0 > total.0)
            .map(|(oid, _)| *oid)
            .collect();
        if !majority.is_empty() {
            debug!(
                "tabulate: round {:?}: majority for {:?} (total {:?})",
                round_id, majority, total
            );
            for (oid, placement, vc) in place_final_round(&round.tally, &majority) {
                placements.push((oid, placement, vc));
                if !majority.contains(&oid) {
                    eliminations.push(EliminationInternal::swept(oid, round_id));
                }
            }
            winners = majority;
            rounds.push(round);
            break;
        }

        let (loser, tiebreak) = find_eliminated_option(&round.tally, &ballots, num_options);
        let still_running: Vec<OptionId> =
            remaining.iter().filter(|oid| **oid != loser).copied().collect();
        let (transfers, exhausted) = compute_transfers(&ballots, loser, &remaining, &still_running);
        debug!(
            "tabulate: round {:?}: eliminating {:?} ({:?}), transfers: {:?}, exhausted: {:?}",
            round_id, loser, tiebreak, transfers, exhausted
        );
        placements.push((loser, current_placement, round.count_of(loser)));
        eliminations.push(EliminationInternal {
            oid: loser,
            round: round_id,
            tiebreak,
            transfers,
            exhausted,
        });
        remaining = still_running;

        if let [last] = remaining[..] {
            debug!("tabulate: round {:?}: {:?} is the last option", round_id, last);
            placements.push((last, 1, round.count_of(last)));
            winners = vec![last];
            rounds.push(round);
            break;
        }
        rounds.push(round);
    }

    let result = assemble_result(options, &winners, placements, &eliminations, &rounds);
    assert_eq!(
        result.final_ranking.len(),
        options.len(),
        "Every option must be placed exactly once: {:?}",
        result.final_ranking
    );
    assert_eq!(
        result.elimination_order.len() + result.winners.len(),
        options.len(),
        "Every option must be either a winner or eliminated: {:?}",
        result.elimination_order
    );
    info!(
        "tabulate: winners {:?} after {:?} rounds",
        result.winners,
        result.rounds.len()
    );
    Ok(result)
}

fn compute_tally(ballots: &[RankedChoice], remaining: &[OptionId], round: RoundId) -> RoundResult {
    let mut tally: Vec<(OptionId, VoteCount)> = remaining
        .iter()
        .map(|oid| (*oid, VoteCount::EMPTY))
        .collect();
    let mut exhausted = VoteCount::EMPTY;
    for b in ballots.iter() {
        match b.first_valid(remaining) {
            Some(oid) => {
                if let Some((_, vc)) = tally.iter_mut().find(|(o, _)| *o == oid) {
                    *vc += VoteCount::ONE;
                }
            }
            None => {
                exhausted += VoteCount::ONE;
            }
        }
    }
    RoundResult {
        round,
        tally,
        exhausted,
    }
}

// Places every option still running once some of them reached a majority.
// Winners share the first placement. The others follow by decreasing vote count, and equal
// counts share a placement. The tally comes in option order and the sort is stable, so
// equal counts stay in option order.
fn place_final_round(
    tally: &[(OptionId, VoteCount)],
    winners: &[OptionId],
) -> Vec<(OptionId, u32, VoteCount)> {
    let mut res: Vec<(OptionId, u32, VoteCount)> = tally
        .iter()
        .filter(|(oid, _)| winners.contains(oid))
        .map(|(oid, vc)| (*oid, 1, *vc))
        .collect();
    let mut others: Vec<(OptionId, VoteCount)> = tally
        .iter()
        .filter(|(oid, _)| !winners.contains(oid))
        .copied()
        .collect();
    others.sort_by(|a, b| b.1.cmp(&a.1));

    let first_placement = winners.len() as u32 + 1;
    let mut placement = first_placement;
    let mut previous: Option<VoteCount> = None;
    for (idx, (oid, vc)) in others.iter().enumerate() {
        if previous != Some(*vc) {
            placement = first_placement + idx as u32;
            previous = Some(*vc);
        }
        res.push((*oid, placement, *vc));
    }
    res
}

// Flag to indicate if a tiebreak happened, and how it was resolved.
fn find_eliminated_option(
    tally: &[(OptionId, VoteCount)],
    ballots: &[RankedChoice],
    num_options: u64,
) -> (OptionId, Tiebreak) {
    assert!(tally.len() >= 2, "Nothing to eliminate in {:?}", tally);
    let min_count: VoteCount = tally
        .iter()
        .map(|(_, vc)| *vc)
        .min()
        .unwrap_or(VoteCount::EMPTY);

    let all_smallest: Vec<OptionId> = tally
        .iter()
        .filter_map(|(oid, vc)| if *vc <= min_count { Some(*oid) } else { None })
        .collect();
    debug!(
        "find_eliminated_option: all_smallest: {:?} with {:?} votes",
        all_smallest, min_count
    );

    // No tiebreak, the logic below is not relevant.
    if let [single] = all_smallest[..] {
        return (single, Tiebreak::None);
    }

    // The scores use the full preference lists, so they do not depend on the rounds played so far.
    let mut scored: Vec<(OptionId, u64)> = all_smallest
        .iter()
        .map(|oid| {
            let score: u64 = ballots
                .iter()
                .map(|b| b.positional_score(*oid, num_options))
                .sum();
            (*oid, score)
        })
        .collect();
    // Lowest score first. On equal scores, the option listed last in the poll goes first.
    scored.sort_by(|(oid_a, score_a), (oid_b, score_b)| {
        score_a.cmp(score_b).then(oid_b.cmp(oid_a))
    });
    debug!(
        "find_eliminated_option: sorted candidates in elimination queue: {:?}",
        scored
    );

    let (loser, lowest) = scored[0];
    let tiebreak = if scored[1].1 == lowest {
        Tiebreak::OptionOrder
    } else {
        Tiebreak::PositionalScore
    };
    (loser, tiebreak)
}

// For every voter of the eliminated option, where their vote goes next.
// Returns the transfers in option order and the number of exhausted ballots.
fn compute_transfers(
    ballots: &[RankedChoice],
    eliminated: OptionId,
    before: &[OptionId],
    after: &[OptionId],
) -> (Vec<(OptionId, VoteCount)>, VoteCount) {
    let mut transfers: BTreeMap<OptionId, VoteCount> = BTreeMap::new();
    let mut exhausted = VoteCount::EMPTY;
    for b in ballots
        .iter()
        .filter(|b| b.first_valid(before) == Some(eliminated))
    {
        match b.first_valid(after) {
            Some(next) => {
                *transfers.entry(next).or_insert(VoteCount::EMPTY) += VoteCount::ONE;
            }
            None => {
                exhausted += VoteCount::ONE;
            }
        }
    }
    (transfers.into_iter().collect(), exhausted)
}

fn assemble_result(
    options: &[String],
    winners: &[OptionId],
    placements: Vec<(OptionId, u32, VoteCount)>,
    eliminations: &[EliminationInternal],
    rounds: &[RoundResult],
) -> TabulationResult {
    let name = |oid: &OptionId| options[oid.0 as usize].clone();

    let mut sorted_placements = placements;
    sorted_placements.sort_by(|(oid_a, p_a, vc_a), (oid_b, p_b, vc_b)| {
        p_a.cmp(p_b).then(vc_b.cmp(vc_a)).then(oid_a.cmp(oid_b))
    });

    let mut sorted_winners: Vec<OptionId> = winners.to_vec();
    sorted_winners.sort();

    TabulationResult {
        winners: sorted_winners.iter().map(name).collect(),
        final_ranking: sorted_placements
            .iter()
            .map(|(oid, placement, vc)| Placement {
                option: name(oid),
                placement: *placement,
                votes: vc.0,
            })
            .collect(),
        elimination_order: eliminations
            .iter()
            .map(|e| Elimination {
                option: name(&e.oid),
                round: e.round,
                tiebreak: e.tiebreak,
                transfers: e.transfers.iter().map(|(oid, vc)| (name(oid), vc.0)).collect(),
                exhausted: e.exhausted.0,
            })
            .collect(),
        rounds: rounds
            .iter()
            .map(|r| RoundTally {
                round: r.round,
                tally: r.tally.iter().map(|(oid, vc)| (name(oid), vc.0)).collect(),
                exhausted: r.exhausted.0,
            })
            .collect(),
    }
}

// Translates the preferences into ballots of option ids. The voters are dropped: the count
// only depends on the multiset of ballots.
fn checks(options: &[String], preferences: &Preferences) -> Result<Vec<RankedChoice>, PollError> {
    debug!("checks: preferences size: {:?}", preferences.len());
    check_option_labels(options)?;
    let option_ids: HashMap<&str, OptionId> = options
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), OptionId(idx as u32)))
        .collect();

    let mut ballots: Vec<RankedChoice> = Vec::with_capacity(preferences.len());
    for (voter, choices) in preferences.iter() {
        let mut seen: HashSet<OptionId> = HashSet::new();
        let mut ranked: Vec<OptionId> = Vec::with_capacity(choices.len());
        for (slot, name) in choices.iter().enumerate() {
            let oid = *option_ids
                .get(name.as_str())
                .context(InvalidOptionSnafu { option: name })?;
            if !seen.insert(oid) {
                debug!("checks: voter {} ranks {:?} twice", voter, name);
                return DuplicateOptionAcrossRanksSnafu { option: name, slot }.fail();
            }
            ranked.push(oid);
        }
        ballots.push(RankedChoice(ranked));
    }
    Ok(ballots)
}
