use pest::error::{Error as PestError, InputLocation};
use thiserror::Error;

use crate::parse::Rule;

/// Example inputs shown to users next to a rejected expression.
pub const INPUT_HINT: &str = "Try: x^2, sin(x), 2*x + 1";

/// Every way a request can be rejected before any sampling happens.
///
/// Positions are byte offsets into the trimmed input.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("syntax error at position {position}: {reason}")]
    SyntaxError { position: usize, reason: String },

    #[error("unknown function `{name}` at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },
}

impl Error {
    pub(crate) fn syntax(position: usize, reason: impl Into<String>) -> Self {
        Self::SyntaxError {
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_grid(reason: impl Into<String>) -> Self {
        Self::InvalidGrid {
            reason: reason.into(),
        }
    }

    /// Message suitable for showing to the person who typed the expression.
    pub fn user_message(&self) -> String {
        format!("Error: {self}. {INPUT_HINT}")
    }
}

impl From<PestError<Rule>> for Error {
    fn from(err: PestError<Rule>) -> Self {
        let position = match err.location {
            InputLocation::Pos(pos) => pos,
            InputLocation::Span((start, _)) => start,
        };
        let err = err.renamed_rules(rule_display_name);
        Self::SyntaxError {
            position,
            reason: err.variant.message().into_owned(),
        }
    }
}

fn rule_display_name(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input",
        Rule::expr => "expression",
        Rule::number => "number",
        Rule::identifier => "variable or function",
        Rule::call => "function call",
        Rule::add => "`+`",
        Rule::subtract => "`-`",
        Rule::multiply => "`*`",
        Rule::divide => "`/`",
        Rule::power => "`^`",
        Rule::neg => "unary `-`",
        _ => "token",
    }
    .to_string()
}
