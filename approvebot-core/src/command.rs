/// Command parsing for review votes in comments
use serde::{Deserialize, Serialize};
use std::fmt;

/// The dimension a vote is cast on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// `/lgtm` and `/lbtm`, open to anyone except the author.
    Review,
    /// `/approve` and `/reject`, restricted to directory approvers.
    Approval,
}

/// A review command recognised in a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// `/lgtm`: the code looks good
    Agree,
    /// `/lbtm`: the code looks bad
    Disagree,
    /// `/approve`: the code can be merged
    Approve,
    /// `/reject`: the code can't be merged
    Reject,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::Agree,
        Command::Disagree,
        Command::Approve,
        Command::Reject,
    ];

    /// The wire-level token for this command. Tokens are case-sensitive.
    pub fn token(&self) -> &'static str {
        match self {
            Command::Agree => "/lgtm",
            Command::Disagree => "/lbtm",
            Command::Approve => "/approve",
            Command::Reject => "/reject",
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            Command::Agree | Command::Disagree => Axis::Review,
            Command::Approve | Command::Reject => Axis::Approval,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Parse a single line for a leading command token.
///
/// The token must start the line (after trimming) and be followed by
/// whitespace or the end of the line; anything after it is ignored.
fn parse_line(line: &str) -> Option<Command> {
    let trimmed = line.trim();

    Command::ALL.into_iter().find(|command| {
        trimmed
            .strip_prefix(command.token())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Parse every line of a comment body and return all recognised commands, in order.
///
/// Used to decide whether a comment is actionable at all. Unrecognised or
/// malformed lines are skipped.
pub fn parse_commands(body: &str) -> Vec<Command> {
    body.lines().filter_map(parse_line).collect()
}

/// Parse a comment body for its vote.
///
/// A comment carries at most one vote: the first recognised command wins.
pub fn parse_comment(body: &str) -> Option<Command> {
    body.lines().find_map(parse_line)
}
