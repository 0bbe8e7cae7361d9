use log::debug;
use snafu::prelude::*;
use std::collections::HashSet;

use crate::config::*;
use crate::tabulate;

/// A builder for adding ballots outside of a live poll.
///
/// It should be considered when all the ballots are known in advance, for example to
/// recount a closed poll.
///
/// ```
/// pub use ranked_poll::builder::Builder;
/// # use ranked_poll::PollError;
///
/// let mut builder = Builder::new(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_ballot("voter-1", &["Anna".to_string(), "".to_string()])?;
/// builder.add_ballot_simple(&["Bob".to_string(), "Anna".to_string()])?;
/// builder.add_ballot_simple(&["Anna".to_string()])?;
///
/// let result = builder.tabulate()?;
/// assert_eq!(result.winners, vec!["Anna".to_string()]);
/// # Ok::<(), PollError>(())
/// ```
pub struct Builder {
    pub(crate) _options: Vec<String>,
    pub(crate) _preferences: Preferences,
}

impl Builder {
    pub fn new(options: &[String]) -> Result<Builder, PollError> {
        check_option_labels(options)?;
        Ok(Builder {
            _options: options.to_vec(),
            _preferences: Preferences::new(),
        })
    }

    /// Adds a ballot with a generated voter id.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_ballot_simple(&mut self, choices: &[String]) -> Result<(), PollError> {
        let voter = format!("ballot-{:06}", self._preferences.len() + 1);
        self.add_ballot(voter.as_str(), choices)
    }

    /// Adds the ballot of a voter, replacing any previous ballot of the same voter.
    ///
    /// choices: the options in order of preference. An empty string is a rank left blank and is
    /// skipped. An option may not appear twice.
    pub fn add_ballot(
        &mut self,
        voter: impl Into<VoterId>,
        choices: &[String],
    ) -> Result<(), PollError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut ranked: Vec<String> = Vec::new();
        for (slot, c) in choices.iter().enumerate() {
            if c.is_empty() {
                continue;
            }
            ensure!(
                self._options.iter().any(|o| o == c),
                InvalidOptionSnafu { option: c }
            );
            ensure!(
                seen.insert(c.as_str()),
                DuplicateOptionAcrossRanksSnafu { option: c, slot }
            );
            ranked.push(c.clone());
        }
        let voter = voter.into();
        debug!("add_ballot: {} -> {:?}", voter, ranked);
        self._preferences.insert(voter, ranked);
        Ok(())
    }

    pub fn preferences(&self) -> &Preferences {
        &self._preferences
    }

    pub fn tabulate(&self) -> Result<TabulationResult, PollError> {
        tabulate(&self._options, &self._preferences)
    }
}
