//! Structural validation of candidate payloads
//!
//! A payload is only handed to the JSON decoder once it is known to be a
//! balanced object or array. Quotes and escapes are tracked so brackets inside
//! string literals do not count, and a fragment cut inside a string is caught
//! even when its first and last characters happen to look balanced.

use crate::sse::events::Sentinel;

/// Why a payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Empty or shorter than two characters
    TooShort,
    /// One of the end-of-stream literals
    Sentinel,
    /// Not wrapped in `{}` or `[]`
    NotContainer,
    /// A closing bracket appeared before its opener
    Underflow,
    /// Ended inside a string literal
    UnterminatedString,
    /// Brace or bracket depth is non-zero at the end
    Unbalanced,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::TooShort => "payload too short",
            Rejection::Sentinel => "payload is an end-of-stream sentinel",
            Rejection::NotContainer => "payload is not a JSON object or array",
            Rejection::Underflow => "closing bracket without opener",
            Rejection::UnterminatedString => "payload ends inside a string",
            Rejection::Unbalanced => "unbalanced braces or brackets",
        };
        f.write_str(reason)
    }
}

/// Check a payload, returning the reason it is not well formed.
pub fn check(payload: &str) -> Result<(), Rejection> {
    if payload.len() < 2 {
        return Err(Rejection::TooShort);
    }
    if Sentinel::from_payload(payload).is_some() {
        return Err(Rejection::Sentinel);
    }

    let object = payload.starts_with('{') && payload.ends_with('}');
    let array = payload.starts_with('[') && payload.ends_with(']');
    if !object && !array {
        return Err(Rejection::NotContainer);
    }

    let mut brace_depth: i64 = 0;
    let mut bracket_depth: i64 = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for ch in payload.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => brace_depth += 1,
            '}' => brace_depth -= 1,
            '[' => bracket_depth += 1,
            ']' => bracket_depth -= 1,
            _ => {}
        }
        if brace_depth < 0 || bracket_depth < 0 {
            return Err(Rejection::Underflow);
        }
    }

    if in_string {
        return Err(Rejection::UnterminatedString);
    }
    if brace_depth != 0 || bracket_depth != 0 {
        return Err(Rejection::Unbalanced);
    }
    Ok(())
}

/// True when `payload` is a balanced JSON object or array.
pub fn is_well_formed(payload: &str) -> bool {
    check(payload).is_ok()
}
