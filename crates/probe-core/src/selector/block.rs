use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::ConfigurationError;
use crate::ast::Line;

/// A range of source lines eligible for instrumentation.
///
/// `start` is inclusive and `end` is exclusive, so `Block(3, 5)` covers lines
/// 3 and 4. Construction rejects `start >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(Line, Line)", into = "(Line, Line)")]
pub struct Block {
    start: Line,
    end: Line,
}

impl Block {
    pub fn new(start: Line, end: Line) -> Result<Self, ConfigurationError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(ConfigurationError::EmptyBlock { start, end })
        }
    }

    pub fn start(&self) -> Line {
        self.start
    }

    pub fn end(&self) -> Line {
        self.end
    }

    pub fn contains(&self, line: Line) -> bool {
        self.start <= line && line < self.end
    }
}

impl TryFrom<(Line, Line)> for Block {
    type Error = ConfigurationError;

    fn try_from((start, end): (Line, Line)) -> Result<Self, Self::Error> {
        Block::new(start, end)
    }
}

impl From<Block> for (Line, Line) {
    fn from(block: Block) -> Self {
        (block.start, block.end)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.start, self.end)
    }
}

/// Parses the command-line form `(start,end)`; the parentheses are optional.
impl FromStr for Block {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigurationError::MalformedBlock {
            input: s.to_string(),
        };
        let inner = s
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')');
        let (start, end) = inner.split_once(',').ok_or_else(malformed)?;
        let start = start.trim().parse::<Line>().map_err(|_| malformed())?;
        let end = end.trim().parse::<Line>().map_err(|_| malformed())?;
        Block::new(start, end)
    }
}
