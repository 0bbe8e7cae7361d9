//! Reshapes a tabulation into what a presentation layer displays: placements grouped by
//! ties, and one vote table per round.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum GroupStatus {
    Winner,
    Eliminated { round: u32 },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProjectedEntry {
    pub option: String,
    pub votes: u64,
}

/// The options sharing one placement.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PlacementGroup {
    pub placement: u32,
    pub status: GroupStatus,
    /// More than one option left the race in the round this group was eliminated.
    pub tied_elimination: bool,
    /// Most votes first, then in option order.
    pub entries: Vec<ProjectedEntry>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundTable {
    pub round: u32,
    /// Most votes first, then in option order.
    pub rows: Vec<ProjectedEntry>,
    pub exhausted: u64,
    pub eliminated: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Projection {
    pub groups: Vec<PlacementGroup>,
    pub rounds: Vec<RoundTable>,
}

impl Projection {
    pub fn winners(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Winner)
            .flat_map(|g| g.entries.iter().map(|e| e.option.as_str()))
            .collect()
    }

    /// No winner, and several options share the best placement.
    pub fn is_tied(&self) -> bool {
        self.winners().is_empty()
            && self
                .groups
                .first()
                .map(|g| g.entries.len() > 1)
                .unwrap_or(false)
    }
}

pub fn project(options: &[String], result: &TabulationResult) -> Projection {
    let option_order: HashMap<&str, usize> = options
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let by_votes_then_order = |a: &ProjectedEntry, b: &ProjectedEntry| -> Ordering {
        b.votes.cmp(&a.votes).then(
            option_order
                .get(a.option.as_str())
                .cmp(&option_order.get(b.option.as_str())),
        )
    };

    let mut eliminated_per_round: HashMap<u32, usize> = HashMap::new();
    for e in result.elimination_order.iter() {
        *eliminated_per_round.entry(e.round).or_insert(0) += 1;
    }

    let mut groups: Vec<PlacementGroup> = Vec::new();
    for p in result.final_ranking.iter() {
        let entry = ProjectedEntry {
            option: p.option.clone(),
            votes: p.votes,
        };
        // The final ranking is sorted by placement: a tie group is a run of equal placements.
        if let Some(g) = groups.last_mut().filter(|g| g.placement == p.placement) {
            g.entries.push(entry);
            continue;
        }
        let status = if result.is_winner(&p.option) {
            GroupStatus::Winner
        } else {
            let round = result
                .eliminated_in(&p.option)
                .unwrap_or(result.rounds.len() as u32);
            GroupStatus::Eliminated { round }
        };
        let tied_elimination = match status {
            GroupStatus::Eliminated { round } => {
                eliminated_per_round.get(&round).copied().unwrap_or(0) > 1
            }
            GroupStatus::Winner => false,
        };
        groups.push(PlacementGroup {
            placement: p.placement,
            status,
            tied_elimination,
            entries: vec![entry],
        });
    }
    groups.sort_by_key(|g| g.placement);
    for g in groups.iter_mut() {
        g.entries.sort_by(by_votes_then_order);
    }

    let rounds = result
        .rounds
        .iter()
        .map(|r| {
            let mut rows: Vec<ProjectedEntry> = r
                .tally
                .iter()
                .map(|(option, votes)| ProjectedEntry {
                    option: option.clone(),
                    votes: *votes,
                })
                .collect();
            rows.sort_by(by_votes_then_order);
            RoundTable {
                round: r.round,
                rows,
                exhausted: r.exhausted,
                eliminated: result
                    .elimination_order
                    .iter()
                    .filter(|e| e.round == r.round)
                    .map(|e| e.option.clone())
                    .collect(),
            }
        })
        .collect();

    Projection { groups, rounds }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabulate;

    fn names(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    fn prefs(ballots: &[(&str, &[&str])]) -> Preferences {
        ballots
            .iter()
            .map(|(voter, choices)| (VoterId::from(*voter), names(choices)))
            .collect()
    }

    fn entry_names(g: &PlacementGroup) -> Vec<&str> {
        g.entries.iter().map(|e| e.option.as_str()).collect()
    }

    #[test]
    fn groups_winner_and_eliminations() {
        let options = names(&["A", "B", "C", "D"]);
        let p = prefs(&[
            ("1", &["A"]),
            ("2", &["A"]),
            ("3", &["B", "A"]),
            ("4", &["B"]),
            ("5", &["C", "A"]),
        ]);
        let result = tabulate(&options, &p).unwrap();
        let proj = project(&options, &result);

        // Round 1: A 2, B 2, C 1, D 0 -> D. Round 2: C goes to A. Round 3: A 3 of 5.
        assert_eq!(proj.winners(), vec!["A"]);
        assert!(!proj.is_tied());
        assert_eq!(proj.groups.len(), 4);
        assert_eq!(proj.groups[0].status, GroupStatus::Winner);
        assert_eq!(entry_names(&proj.groups[1]), vec!["B"]);
        assert_eq!(proj.groups[1].status, GroupStatus::Eliminated { round: 3 });
        assert!(!proj.groups[1].tied_elimination);
        assert_eq!(proj.groups[2].status, GroupStatus::Eliminated { round: 2 });
        assert_eq!(proj.groups[3].status, GroupStatus::Eliminated { round: 1 });
        assert_eq!(entry_names(&proj.groups[3]), vec!["D"]);

        assert_eq!(proj.rounds.len(), 3);
        assert_eq!(proj.rounds[0].eliminated, names(&["D"]));
        let first_rows: Vec<(&str, u64)> = proj.rounds[0]
            .rows
            .iter()
            .map(|e| (e.option.as_str(), e.votes))
            .collect();
        assert_eq!(first_rows, vec![("A", 2), ("B", 2), ("C", 1), ("D", 0)]);
    }

    #[test]
    fn tied_groups_in_final_round() {
        let options = names(&["A", "B", "C", "D"]);
        let p = prefs(&[("1", &["D"]), ("2", &["D"]), ("3", &["C"])]);
        let result = tabulate(&options, &p).unwrap();
        let proj = project(&options, &result);

        assert_eq!(proj.winners(), vec!["D"]);
        assert_eq!(proj.groups[1].placement, 2);
        assert_eq!(entry_names(&proj.groups[1]), vec!["C"]);
        assert_eq!(proj.groups[2].placement, 3);
        assert_eq!(entry_names(&proj.groups[2]), vec!["A", "B"]);
        assert!(proj.groups[2].tied_elimination);
        assert_eq!(proj.groups[2].status, GroupStatus::Eliminated { round: 1 });
        assert_eq!(proj.rounds[0].eliminated, names(&["C", "A", "B"]));
    }

    #[test]
    fn no_votes_is_a_tie() {
        let options = names(&["A", "B"]);
        let result = tabulate(&options, &Preferences::new()).unwrap();
        let proj = project(&options, &result);
        assert!(proj.winners().is_empty());
        assert!(proj.is_tied());
        assert_eq!(proj.groups.len(), 1);
        assert_eq!(proj.groups[0].placement, 2);
        assert!(proj.groups[0].tied_elimination);
        assert_eq!(entry_names(&proj.groups[0]), vec!["A", "B"]);
    }
}
