use crate::{Error, Function};

use strum::IntoEnumIterator;

const SYMBOLS: &str = "xXyY+-*/.,()^";

/// Rejects any input containing a character outside the expression alphabet.
///
/// The alphabet is digits, whitespace, the variables `x`/`y`, the operator and
/// grouping symbols, and the letters of the built-in function names in either
/// case. Passing this check says nothing about grammar; `sinx` passes here and
/// fails in the parser.
pub fn validate(input: &str) -> Result<&str, Error> {
    match input.char_indices().find(|(_, c)| !is_allowed(*c)) {
        Some((position, character)) => {
            log::debug!("rejected {character:?} at {position} in {input:?}");
            Err(Error::InvalidCharacter {
                character,
                position,
            })
        }
        None => Ok(input),
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_ascii_whitespace()
        || SYMBOLS.contains(c)
        || Function::iter().any(|function| {
            function
                .name()
                .contains(c.to_ascii_lowercase())
        })
}
