use std::num::{ParseFloatError, ParseIntError};

use tempo_proto::Agg;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command string")]
    EmptyCommand,
    #[error("unknown command")]
    UnknownCommand,
    #[error("command reached end, no new tokens available")]
    CommandEndReached,
    #[error("bad integer literal: {0}")]
    BadInt(#[from] ParseIntError),
    #[error("bad float literal: {0}")]
    BadFloat(#[from] ParseFloatError),
}

/// Which wire request a parsed line maps to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommandKind {
    #[default]
    Create,
    Delete,
    Add,
    MAdd,
    Query,
}

/// One parsed line of the command language.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub name: String,
    /// Advisory retention in nanos, CREATE only.
    pub retention: i64,
    /// Nanos, zero meaning "now" (the server stamps the point).
    pub timestamp: i64,
    pub value: f64,
    pub range: (i64, i64),
    /// Aggregation tag, already shifted into wire position.
    pub flag: u8,
    /// `-1` raw records, `0` overall mean, `> 0` bucketed mean width.
    pub avg_interval_ms: i64,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            kind: CommandKind::default(),
            name: String::new(),
            retention: 0,
            timestamp: 0,
            value: 0.0,
            range: (0, 0),
            flag: 0,
            avg_interval_ms: -1,
        }
    }
}

/// Predictive parser over whitespace separated tokens. Keywords are case
/// insensitive:
///
/// ```text
/// CREATE name [retention]
/// DELETE name
/// ADD name (*|timestamp) value
/// QUERY name (*|MIN|MAX|FIRST|LAST|< ts|> ts|RANGE ts ts) [AVG [interval_ms]]
/// ```
pub struct Parser {
    tokens: Vec<String>,
    index: usize,
}

impl Parser {
    pub fn new(line: &str) -> Self {
        Self { tokens: line.split_whitespace().map(str::to_owned).collect(), index: 0 }
    }

    fn pop(&mut self) -> Result<String, CommandError> {
        let token = self.tokens.get(self.index).cloned().ok_or(CommandError::CommandEndReached)?;
        self.index += 1;
        Ok(token)
    }

    fn try_pop(&mut self) -> Option<String> {
        let token = self.tokens.get(self.index).cloned()?;
        self.index += 1;
        Some(token)
    }

    pub fn parse(mut self) -> Result<Command, CommandError> {
        if self.tokens.is_empty() {
            return Err(CommandError::EmptyCommand);
        }
        let mut command = Command::default();
        match self.pop()?.to_uppercase().as_str() {
            "CREATE" => {
                command.kind = CommandKind::Create;
                command.name = self.pop()?;
                if let Some(token) = self.try_pop() {
                    command.retention = token.parse()?;
                }
            }
            "DELETE" => {
                command.kind = CommandKind::Delete;
                command.name = self.pop()?;
            }
            "ADD" => {
                command.kind = CommandKind::Add;
                command.name = self.pop()?;
                let token = self.pop()?;
                if token != "*" {
                    command.timestamp = parse_timestamp(&token)?;
                }
                command.value = self.pop()?.parse()?;
            }
            // reserved, no body specified yet
            "MADD" => command.kind = CommandKind::MAdd,
            "QUERY" => {
                command.kind = CommandKind::Query;
                command.name = self.pop()?;
                let qualifier = self.pop()?;
                if qualifier != "*" {
                    match qualifier.to_uppercase().as_str() {
                        "MIN" => command.flag = Agg::Min.to_flags(),
                        "MAX" => command.flag = Agg::Max.to_flags(),
                        "FIRST" => command.flag = Agg::First.to_flags(),
                        "LAST" => command.flag = Agg::Last.to_flags(),
                        "<" => command.range.1 = parse_timestamp(&self.pop()?)?,
                        ">" => command.range.0 = parse_timestamp(&self.pop()?)?,
                        "RANGE" => {
                            command.range.0 = parse_timestamp(&self.pop()?)?;
                            command.range.1 = parse_timestamp(&self.pop()?)?;
                        }
                        _ => return Err(CommandError::UnknownCommand),
                    }
                }
                // aggregations answer a single record, AVG only composes
                // with the range forms
                if command.flag == 0
                    && let Some(token) = self.try_pop()
                {
                    if !token.eq_ignore_ascii_case("AVG") {
                        return Err(CommandError::UnknownCommand);
                    }
                    command.avg_interval_ms = match self.try_pop() {
                        Some(interval) => interval.parse()?,
                        None => 0,
                    };
                }
            }
            _ => return Err(CommandError::UnknownCommand),
        }
        Ok(command)
    }
}

/// Integer timestamps normalise to nanos: 10 digit literals are read as
/// seconds and 13 digit ones as millis, anything else is nanos already.
fn parse_timestamp(token: &str) -> Result<i64, CommandError> {
    let mul: i64 = match token.len() {
        10 => 1_000_000_000,
        13 => 1_000_000,
        _ => 1,
    };
    Ok(token.parse::<i64>()? * mul)
}
