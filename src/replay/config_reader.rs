use crate::replay::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    pub title: String,
    pub options: Vec<String>,
    pub rankings: usize,
}

/// One reaction change recorded on the chat platform.
///
/// Ranks are numbered from 1 in the file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PollEvent {
    #[serde(rename = "assign")]
    Assign {
        voter: String,
        rank: usize,
        option: String,
    },
    #[serde(rename = "withdraw")]
    Withdraw { voter: String, rank: usize },
    #[serde(rename = "close")]
    Close,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub poll: PollSettings,
    #[serde(default)]
    pub events: Vec<PollEvent>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub title: String,
    pub options: Vec<String>,
    pub rankings: usize,
}

pub fn parse_replay(contents: &str) -> ReplayResult<ReplayConfig> {
    let config: ReplayConfig = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_replay_file(path: &str) -> ReplayResult<ReplayConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    parse_replay(contents.as_str())
}

pub fn read_summary(path: &str) -> ReplayResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read summary: {:?}", js);
    Ok(js)
}

/// Converts a rank from the file (1-based) into a slot of the poll (0-based).
pub fn rank_to_slot(rank: usize, rankings: usize) -> Result<usize, PollError> {
    rank.checked_sub(1)
        .ok_or(PollError::InvalidSlot { slot: rank, rankings })
}
