//! Line/column positions inside a module's source text.

use core::fmt;

/// Location of a single character: 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Position of the very first character of a stream.
    pub const FIRST_CHARACTER: Position = Position { line: 1, column: 1 };

    pub const fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::FIRST_CHARACTER
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Tracks the position of the current character as characters are consumed.
///
/// The tracker only ever sees logical characters, so a line break is a
/// single `'\n'` no matter how it was encoded in the file.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    position: Position,
    started: bool,
    previous_was_new_line: bool,
}

impl PositionTracker {
    pub fn new() -> Self {
        PositionTracker::default()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Advance onto `character`, the character that just became current.
    pub fn advance(&mut self, character: char) {
        if !self.started {
            self.started = true;
            self.position = Position::FIRST_CHARACTER;
        } else if self.previous_was_new_line {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        self.previous_was_new_line = character == '\n';
    }

    pub fn reset(&mut self) {
        *self = PositionTracker::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_character_starts_at_one_one() {
        let mut tracker = PositionTracker::new();
        tracker.advance('a');
        assert_eq!(tracker.position(), Position::new(1, 1));
    }

    #[test]
    fn new_line_moves_following_character_to_next_line() {
        let mut tracker = PositionTracker::new();
        for c in "ab\nc".chars() {
            tracker.advance(c);
        }
        assert_eq!(tracker.position(), Position::new(2, 1));
    }

    #[test]
    fn displays_as_line_colon_column() {
        assert_eq!(Position::new(3, 14).to_string(), "3:14");
    }
}
