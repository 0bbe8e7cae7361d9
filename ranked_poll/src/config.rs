// ********* Input data structures ***********

use snafu::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

/// The smallest number of options a poll may be opened with.
pub const MIN_OPTIONS: usize = 2;
/// The largest number of options a poll may be opened with.
pub const MAX_OPTIONS: usize = 10;

/// An opaque identifier for a voter, typically the user id on the chat platform.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VoterId(String);

impl VoterId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for VoterId {
    fn from(s: &str) -> VoterId {
        VoterId(s.to_string())
    }
}

impl From<String> for VoterId {
    fn from(s: String) -> VoterId {
        VoterId(s)
    }
}

impl From<u64> for VoterId {
    fn from(id: u64) -> VoterId {
        VoterId(id.to_string())
    }
}

impl From<&VoterId> for VoterId {
    fn from(v: &VoterId) -> VoterId {
        v.clone()
    }
}

impl Display for VoterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ordered preferences of each voter, most preferred first.
///
/// A voter does not need to fill every rank, so a sequence may be shorter than the
/// number of rankings of the poll, or even empty.
pub type Preferences = BTreeMap<VoterId, Vec<String>>;

/// The validated shape of a poll: its options, in display order, and the number of ranks.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PollConfig {
    options: Vec<String>,
    rankings: usize,
}

impl PollConfig {
    pub fn new(options: &[String], rankings: usize) -> Result<PollConfig, PollError> {
        check_option_labels(options)?;
        ensure!(
            options.len() <= MAX_OPTIONS,
            InvalidConfigurationSnafu {
                issue: ConfigIssue::TooManyOptions {
                    count: options.len()
                }
            }
        );
        ensure!(
            rankings >= 1 && rankings <= options.len(),
            InvalidConfigurationSnafu {
                issue: ConfigIssue::RankingsOutOfRange {
                    rankings,
                    options: options.len()
                }
            }
        );
        Ok(PollConfig {
            options: options.to_vec(),
            rankings,
        })
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn rankings(&self) -> usize {
        self.rankings
    }
}

// The tabulation only needs two distinct labels. The upper bound is a poll limit.
pub(crate) fn check_option_labels(options: &[String]) -> Result<(), PollError> {
    ensure!(
        options.len() >= MIN_OPTIONS,
        InvalidConfigurationSnafu {
            issue: ConfigIssue::TooFewOptions {
                count: options.len()
            }
        }
    );
    let mut seen: HashSet<&str> = HashSet::new();
    for option in options.iter() {
        ensure!(
            seen.insert(option.as_str()),
            InvalidConfigurationSnafu {
                issue: ConfigIssue::DuplicateOptionLabel {
                    option: option.clone()
                }
            }
        );
    }
    Ok(())
}

// ******** Output data structures *********

/// How an elimination was decided.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Tiebreak {
    /// A single option had the fewest votes, or the option was swept out in the final round.
    None,
    /// Several options shared the fewest votes and the cumulative positional score decided.
    PositionalScore,
    /// The positional scores were equal too, and the option order of the poll decided.
    OptionOrder,
}

/// The finishing position of one option. Placement 1 is the winner, ties share a placement.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Placement {
    pub option: String,
    pub placement: u32,
    /// The number of votes the option held in the round it left the race (or won).
    pub votes: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Elimination {
    pub option: String,
    pub round: u32,
    pub tiebreak: Tiebreak,
    /// Where the votes of this option went in the next round.
    pub transfers: Vec<(String, u64)>,
    /// Ballots of this option that had no remaining preference.
    pub exhausted: u64,
}

/// Statistics for one round
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundTally {
    pub round: u32,
    /// Votes of every option still running in this round, in the option order of the poll.
    pub tally: Vec<(String, u64)>,
    /// Voters that cast no vote in this round.
    pub exhausted: u64,
}

impl RoundTally {
    pub fn total(&self) -> u64 {
        self.tally.iter().map(|(_, count)| *count).sum()
    }

    pub fn votes_for(&self, option: &str) -> Option<u64> {
        self.tally
            .iter()
            .find(|(name, _)| name == option)
            .map(|(_, count)| *count)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TabulationResult {
    /// Empty when every remaining option ended with zero votes.
    pub winners: Vec<String>,
    /// Every option exactly once, best placement first.
    pub final_ranking: Vec<Placement>,
    /// Every non-winning option exactly once, in the order they left the race.
    pub elimination_order: Vec<Elimination>,
    pub rounds: Vec<RoundTally>,
}

impl TabulationResult {
    pub fn placement_of(&self, option: &str) -> Option<&Placement> {
        self.final_ranking.iter().find(|p| p.option == option)
    }

    pub fn eliminated_in(&self, option: &str) -> Option<u32> {
        self.elimination_order
            .iter()
            .find(|e| e.option == option)
            .map(|e| e.round)
    }

    pub fn is_winner(&self, option: &str) -> bool {
        self.winners.iter().any(|w| w == option)
    }
}

// ********* Errors **********

/// The reason a poll configuration was refused.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ConfigIssue {
    TooFewOptions { count: usize },
    TooManyOptions { count: usize },
    DuplicateOptionLabel { option: String },
    RankingsOutOfRange { rankings: usize, options: usize },
}

impl Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigIssue::TooFewOptions { count } => {
                write!(f, "at least {} options are needed, got {}", MIN_OPTIONS, count)
            }
            ConfigIssue::TooManyOptions { count } => {
                write!(f, "at most {} options are allowed, got {}", MAX_OPTIONS, count)
            }
            ConfigIssue::DuplicateOptionLabel { option } => {
                write!(f, "option {:?} is listed more than once", option)
            }
            ConfigIssue::RankingsOutOfRange { rankings, options } => write!(
                f,
                "rankings must be between 1 and {}, got {}",
                options, rankings
            ),
        }
    }
}

/// Errors returned by the poll operations.
///
/// All of them are recoverable except `InvalidConfiguration`, which prevents the poll from
/// being created at all.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PollError {
    #[snafu(display("invalid poll configuration: {issue}"))]
    InvalidConfiguration { issue: ConfigIssue },

    #[snafu(display("option {option:?} is already ranked by this voter in slot {slot}"))]
    DuplicateOptionAcrossRanks { option: String, slot: usize },

    #[snafu(display("slot {slot} is out of range, the poll has {rankings} rankings"))]
    InvalidSlot { slot: usize, rankings: usize },

    #[snafu(display("option {option:?} is not part of this poll"))]
    InvalidOption { option: String },

    #[snafu(display("the poll is closed"))]
    PollClosed,

    #[snafu(display("a poll is already registered under {poll_id}"))]
    PollAlreadyExists { poll_id: String },

    #[snafu(display("no poll registered under {poll_id}"))]
    UnknownPoll { poll_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn config_accepts_bounds() {
        assert!(PollConfig::new(&names(&["A", "B"]), 1).is_ok());
        assert!(PollConfig::new(&names(&["A", "B"]), 2).is_ok());
        let ten: Vec<String> = (0..10).map(|i| format!("option {}", i)).collect();
        assert_eq!(PollConfig::new(&ten, 10).unwrap().rankings(), 10);
    }

    #[test]
    fn config_rejects_option_counts() {
        assert_eq!(
            PollConfig::new(&names(&["A"]), 1),
            Err(PollError::InvalidConfiguration {
                issue: ConfigIssue::TooFewOptions { count: 1 }
            })
        );
        let eleven: Vec<String> = (0..11).map(|i| format!("option {}", i)).collect();
        assert_eq!(
            PollConfig::new(&eleven, 3),
            Err(PollError::InvalidConfiguration {
                issue: ConfigIssue::TooManyOptions { count: 11 }
            })
        );
    }

    #[test]
    fn config_rejects_rankings() {
        for rankings in [0, 4] {
            assert_eq!(
                PollConfig::new(&names(&["A", "B", "C"]), rankings),
                Err(PollError::InvalidConfiguration {
                    issue: ConfigIssue::RankingsOutOfRange {
                        rankings,
                        options: 3
                    }
                })
            );
        }
    }

    #[test]
    fn config_rejects_duplicate_labels() {
        let err = PollConfig::new(&names(&["A", "B", "A"]), 2).unwrap_err();
        assert_eq!(
            err,
            PollError::InvalidConfiguration {
                issue: ConfigIssue::DuplicateOptionLabel {
                    option: "A".to_string()
                }
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid poll configuration: option \"A\" is listed more than once"
        );
    }

    #[test]
    fn voter_ids() {
        assert_eq!(VoterId::from(42u64), VoterId::from("42"));
        assert_eq!(VoterId::from("u1".to_string()).as_str(), "u1");
    }
}
