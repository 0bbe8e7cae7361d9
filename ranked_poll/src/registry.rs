//! The polls currently known to an embedding application, by id.

use log::info;
use parking_lot::RwLock;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::*;
use crate::session::PollSession;

pub type PollId = String;

/// Keeps track of the live polls.
///
/// Polls do not share anything but this map. The lock of the map is never held while a
/// poll is being mutated.
#[derive(Debug, Default)]
pub struct PollRegistry {
    polls: RwLock<HashMap<PollId, Arc<PollSession>>>,
}

impl PollRegistry {
    pub fn new() -> PollRegistry {
        PollRegistry::default()
    }

    pub fn open(
        &self,
        poll_id: impl Into<PollId>,
        options: &[String],
        rankings: usize,
    ) -> Result<Arc<PollSession>, PollError> {
        let poll_id = poll_id.into();
        let mut polls = self.polls.write();
        ensure!(
            !polls.contains_key(&poll_id),
            PollAlreadyExistsSnafu { poll_id }
        );
        let session = Arc::new(PollSession::open(options, rankings)?);
        info!("open: registered poll {}", poll_id);
        polls.insert(poll_id, session.clone());
        Ok(session)
    }

    pub fn get(&self, poll_id: &str) -> Result<Arc<PollSession>, PollError> {
        self.polls
            .read()
            .get(poll_id)
            .cloned()
            .context(UnknownPollSnafu { poll_id })
    }

    /// Closes the poll. It stays registered so its last result can still be read.
    pub fn close(&self, poll_id: &str) -> Result<TabulationResult, PollError> {
        let session = self.get(poll_id)?;
        session.close();
        Ok(session.current_result())
    }

    /// Forgets the poll and hands it back for a last look.
    pub fn remove(&self, poll_id: &str) -> Result<Arc<PollSession>, PollError> {
        let session = self
            .polls
            .write()
            .remove(poll_id)
            .context(UnknownPollSnafu { poll_id })?;
        info!("remove: poll {} discarded", poll_id);
        Ok(session)
    }

    pub fn poll_ids(&self) -> Vec<PollId> {
        let mut ids: Vec<PollId> = self.polls.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.polls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.read().is_empty()
    }
}
