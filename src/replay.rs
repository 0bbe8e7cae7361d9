use log::{debug, info, warn};

use ranked_poll::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::replay::config_reader::*;

pub mod config_reader;

#[derive(Debug, Snafu)]
pub enum ReplayError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid poll: {source}"))]
    InvalidPoll { source: PollError },
    #[snafu(display("Error writing summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type ReplayResult<T> = Result<T, ReplayError>;

/// What happened to the events of a replay file.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ReplayOutcome {
    pub applied: usize,
    pub rejected: usize,
}

fn apply_event(session: &PollSession, event: &PollEvent) -> Result<(), PollError> {
    let rankings = session.config().rankings();
    match event {
        PollEvent::Assign {
            voter,
            rank,
            option,
        } => {
            let slot = rank_to_slot(*rank, rankings)?;
            let assignment = session.assign_rank(voter.as_str(), slot, option)?;
            if let Some(previous) = assignment.previous {
                debug!("apply_event: {} replaced {} by {}", voter, previous, option);
            }
        }
        PollEvent::Withdraw { voter, rank } => {
            let slot = rank_to_slot(*rank, rankings)?;
            session.withdraw_rank(voter.as_str(), slot)?;
        }
        PollEvent::Close => session.close(),
    }
    Ok(())
}

/// Feeds the events to the session in order.
///
/// A refused event does not stop the replay: the chat adapter would simply take the
/// reaction down.
pub fn apply_events(session: &PollSession, events: &[PollEvent]) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    for (idx, event) in events.iter().enumerate() {
        match apply_event(session, event) {
            Ok(()) => outcome.applied += 1,
            Err(e) => {
                warn!("apply_events: event {} {:?} rejected: {}", idx, event, e);
                outcome.rejected += 1;
            }
        }
    }
    info!(
        "apply_events: {} applied, {} rejected",
        outcome.applied, outcome.rejected
    );
    outcome
}

fn result_stats_to_json(result: &TabulationResult) -> Vec<JSValue> {
    let num_rounds = result.rounds.len();
    let mut l: Vec<JSValue> = Vec::new();
    for (idx, round_stat) in result.rounds.iter().enumerate() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in round_stat.tally.iter() {
            tally.insert(name.clone(), json!(count));
        }

        let mut tally_results: Vec<JSValue> = Vec::new();
        for elim in result
            .elimination_order
            .iter()
            .filter(|e| e.round == round_stat.round)
        {
            let mut transfers: JSMap<String, JSValue> = JSMap::new();
            for (name, count) in elim.transfers.iter() {
                transfers.insert(name.clone(), json!(count));
            }
            if elim.exhausted > 0 {
                transfers.insert("exhausted".to_string(), json!(elim.exhausted));
            }
            tally_results.push(json!({
                "eliminated": elim.option,
                "transfers": transfers
            }));
        }
        // Winners are only known after the last round.
        if idx + 1 == num_rounds {
            for winner_name in result.winners.iter() {
                tally_results.push(json!({
                    "elected": winner_name,
                    "transfers": {}
                }));
            }
        }

        l.push(json!({
            "round": round_stat.round,
            "tally": tally,
            "exhausted": round_stat.exhausted,
            "tallyResults": tally_results
        }));
    }
    l
}

fn placements_to_json(projection: &Projection) -> Vec<JSValue> {
    projection
        .groups
        .iter()
        .map(|g| {
            let (status, round) = match g.status {
                GroupStatus::Winner => ("winner", None),
                GroupStatus::Eliminated { round } => ("eliminated", Some(round)),
            };
            let entries: Vec<JSValue> = g
                .entries
                .iter()
                .map(|e| json!({"option": e.option, "votes": e.votes}))
                .collect();
            json!({
                "placement": g.placement,
                "status": status,
                "round": round,
                "tied": g.tied_elimination,
                "options": entries
            })
        })
        .collect()
}

fn build_summary_js(
    settings: &PollSettings,
    outcome: &ReplayOutcome,
    result: &TabulationResult,
) -> JSValue {
    let c = OutputConfig {
        title: settings.title.clone(),
        options: settings.options.clone(),
        rankings: settings.rankings,
    };
    let projection = project(&settings.options, result);
    json!({
        "config": c,
        "events": {"applied": outcome.applied, "rejected": outcome.rejected},
        "winners": result.winners,
        "placements": placements_to_json(&projection),
        "results": result_stats_to_json(result) })
}

/// Opens the poll of the replay file, applies its events and builds the summary.
pub fn replay_config(config: &ReplayConfig) -> ReplayResult<JSValue> {
    let session =
        open_poll(&config.poll.options, config.poll.rankings).context(InvalidPollSnafu {})?;
    info!(
        "replay: poll {:?} with {} options, {} events",
        config.poll.title,
        config.poll.options.len(),
        config.events.len()
    );
    let outcome = apply_events(&session, &config.events);
    let result = session.current_result();
    info!("replay: winners {:?}", result.winners);
    Ok(build_summary_js(&config.poll, &outcome, &result))
}

fn write_summary(out: &str, pretty_js_stats: &str) -> ReplayResult<()> {
    if out == "stdout" {
        println!("{}", pretty_js_stats);
    } else if !out.is_empty() {
        fs::write(out, pretty_js_stats).context(WritingSummarySnafu { path: out })?;
        info!("summary written to {}", out);
    }
    Ok(())
}

pub fn run_replay(args: &Args) -> ReplayResult<()> {
    let config = read_replay_file(args.input.as_str())?;
    debug!("config: {:?}", config);

    let result_js = replay_config(&config)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    if let Some(out) = &args.out {
        ensure_whatever!(
            out != &args.input,
            "Refusing to overwrite the replay file {} with the summary",
            out
        );
        write_summary(out.as_str(), pretty_js_stats.as_str())?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p.as_str())?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu {}.fail();
        }
        info!("summary matches the reference {}", summary_p);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn assign(voter: &str, rank: usize, option: &str) -> PollEvent {
        PollEvent::Assign {
            voter: voter.to_string(),
            rank,
            option: option.to_string(),
        }
    }

    fn lunch(events: Vec<PollEvent>) -> ReplayConfig {
        ReplayConfig {
            poll: PollSettings {
                title: "Lunch".to_string(),
                options: vec!["Pizza".to_string(), "Tacos".to_string(), "Sushi".to_string()],
                rankings: 2,
            },
            events,
        }
    }

    #[test]
    fn rejected_events_are_counted() {
        init();
        let config = lunch(vec![
            assign("alice", 1, "Tacos"),
            assign("alice", 2, "Tacos"),
            assign("bob", 0, "Pizza"),
            assign("bob", 3, "Pizza"),
            assign("bob", 1, "Ramen"),
            assign("bob", 1, "Pizza"),
            PollEvent::Withdraw {
                voter: "bob".to_string(),
                rank: 2,
            },
            PollEvent::Close,
            assign("carol", 1, "Sushi"),
        ]);
        let session = open_poll(&config.poll.options, config.poll.rankings).unwrap();
        let outcome = apply_events(&session, &config.events);
        assert_eq!(
            outcome,
            ReplayOutcome {
                applied: 4,
                rejected: 5
            }
        );
        assert_eq!(session.voter_count(), 2);
        assert_eq!(session.status(), PollStatus::Closed);
    }

    #[test]
    fn summary_of_a_replay() {
        init();
        let config = lunch(vec![
            assign("alice", 1, "Tacos"),
            assign("bob", 1, "Pizza"),
            assign("bob", 2, "Tacos"),
            assign("carol", 1, "Sushi"),
            assign("carol", 2, "Tacos"),
            assign("dave", 1, "Tacos"),
            PollEvent::Close,
        ]);
        let js = replay_config(&config).unwrap();
        assert_eq!(js["config"]["title"], json!("Lunch"));
        assert_eq!(js["events"], json!({"applied": 7, "rejected": 0}));
        // Round 1: Tacos 2 of 4, no majority. Pizza and Sushi tie on 1 vote and on
        // score, Sushi is listed last and goes first.
        assert_eq!(js["winners"], json!(["Tacos"]));
        let results = js["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0]["tally"],
            json!({"Pizza": 1, "Sushi": 1, "Tacos": 2})
        );
        assert_eq!(
            results[0]["tallyResults"],
            json!([{"eliminated": "Sushi", "transfers": {"Tacos": 1}}])
        );
        assert_eq!(results[1]["tally"], json!({"Pizza": 1, "Tacos": 3}));
        let placements = js["placements"].as_array().unwrap();
        assert_eq!(placements[0]["status"], json!("winner"));
        assert_eq!(placements[0]["round"], JSValue::Null);
        assert_eq!(placements[2]["options"], json!([{"option": "Sushi", "votes": 1}]));
        assert_eq!(placements[2]["round"], json!(1));
    }

    #[test]
    fn invalid_poll_is_fatal() {
        let mut config = lunch(vec![]);
        config.poll.rankings = 4;
        assert!(matches!(
            replay_config(&config),
            Err(ReplayError::InvalidPoll {
                source: PollError::InvalidConfiguration { .. }
            })
        ));
    }

    #[test]
    fn empty_poll_has_no_winner() {
        let js = replay_config(&lunch(vec![])).unwrap();
        assert_eq!(js["winners"], json!([]));
        let placements = js["placements"].as_array().unwrap();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0]["placement"], json!(3));
        assert_eq!(placements[0]["tied"], json!(true));
    }
}
