use serde::{Deserialize, Serialize};
use std::fmt;

/// A letter written into a board cell. SOS only ever uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Letter {
    S,
    O,
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Letter::S => write!(f, "S"),
            Letter::O => write!(f, "O"),
        }
    }
}

impl Letter {
    /// Parses the single-character wire representation ("S" or "O").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "S" => Some(Letter::S),
            "O" => Some(Letter::O),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        for letter in [Letter::S, Letter::O] {
            assert_eq!(Letter::parse(&letter.to_string()), Some(letter));
        }
    }

    #[test]
    fn rejects_unknown_letters() {
        assert_eq!(Letter::parse("X"), None);
        assert_eq!(Letter::parse(""), None);
    }
}
