/*!

This is the long-form manual for `ranked_poll` and `rcvpoll`.

## Polls, slots and voters

A poll has a fixed list of 2 to 10 options and a number of rankings `R`, between 1 and the
number of options. Each ranking is a *slot*, numbered from 0: slot 0 is the first choice of a
voter, slot 1 the second choice, and so on. On a chat platform a slot is typically one message
that voters react to.

A voter holds at most one option per slot and never the same option in two slots. Slots can be
left empty: the preferences of a voter are read slot by slot, skipping the empty ones.

## Feeding events

The adapter to the chat platform translates every reaction into one of two calls:

* `assign_rank(voter, slot, option)` when a reaction is added,
* `withdraw_rank(voter, slot)` when it is removed.

When a voter picks a new option in a slot that already held one, `assign_rank` returns the
previous option so that the old reaction can be taken down. When the voter picks an option that
they already ranked in another slot, the call fails with `DuplicateOptionAcrossRanks` and the
adapter should remove the new reaction.

```
use ranked_poll::{open_poll, PollError};

let options: Vec<String> = ["Red", "Green", "Blue"].iter().map(|s| s.to_string()).collect();
let poll = open_poll(&options, 2)?;

// 1. alice reacts "Red" on the first rank, then changes her mind.
poll.assign_rank("alice", 0, "Red")?;
let changed = poll.assign_rank("alice", 0, "Blue")?;
assert_eq!(changed.previous.as_deref(), Some("Red")); // retract the "Red" reaction

// 2. alice tries "Blue" on the second rank as well.
let refused = poll.assign_rank("alice", 1, "Blue");
assert!(matches!(refused, Err(PollError::DuplicateOptionAcrossRanks { slot: 0, .. })));

// 3. bob votes, then withdraws his only vote.
poll.assign_rank("bob", 0, "Green")?;
poll.withdraw_rank("bob", 0)?;
assert_eq!(poll.current_result().winners, vec!["Blue".to_string()]);
# Ok::<(), PollError>(())
```

Every accepted event recomputes the full count. There is no incremental update: removing a
single vote in the first round may change which option gets eliminated, and everything after.

## The count

The count is an instant-runoff:

1. Each voter gives one vote to their most preferred option still running.
2. An option with strictly more than half of the votes wins. The other options are placed by
   their votes in that round.
3. Otherwise one option with the fewest votes is eliminated, and the count starts again.
4. When a single option remains, it wins.

When several options share the fewest votes, the one with the lowest *cumulative positional
score* is eliminated. On a ballot, the first position is worth the number of options, the second
one less, and so on. The score of an option is the sum over all ballots, always using the
complete ballots as cast, even after some options have been eliminated. If the scores are equal
too, the option listed last in the poll is eliminated.

If no vote is left at all, for example because every voter withdrew, all the options are tied
last and there is no winner.

## Displaying the result

`project` groups the final ranking by placement, marks the winners and the round in which every
other group was eliminated, and sorts each round's table by votes:

```
use ranked_poll::{project, Builder, GroupStatus, PollError};

let options: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
let mut builder = Builder::new(&options)?;
for ballot in [vec!["A"], vec!["A"], vec!["B", "A"], vec!["C", "B"], vec!["C", "B"]] {
    let ballot: Vec<String> = ballot.iter().map(|s| s.to_string()).collect();
    builder.add_ballot_simple(&ballot)?;
}
let result = builder.tabulate()?;
let projection = project(&options, &result);

// Round 1: A 2, B 1, C 2. B is eliminated and its vote goes to A.
assert_eq!(projection.rounds[0].eliminated, vec!["B".to_string()]);
assert_eq!(projection.winners(), vec!["A"]);
assert_eq!(projection.groups[2].status, GroupStatus::Eliminated { round: 1 });
# Ok::<(), PollError>(())
```

## The `rcvpoll` replay tool

`rcvpoll` replays a recorded stream of events and prints the resulting count in JSON:

```text
rcvpoll -i lunch.json --out stdout
```

The input describes the poll and the events, with ranks numbered from 1:

```text
{
  "poll": { "title": "Lunch", "options": ["Pizza", "Tacos", "Sushi"], "rankings": 2 },
  "events": [
    { "type": "assign", "voter": "alice", "rank": 1, "option": "Tacos" },
    { "type": "assign", "voter": "bob", "rank": 1, "option": "Pizza" },
    { "type": "withdraw", "voter": "bob", "rank": 1 },
    { "type": "close" }
  ]
}
```

Refused events are reported in the logs and counted in the summary; they do not stop the
replay. With `--reference expected.json`, the summary is compared to a previous one and the
differences are printed.

*/
