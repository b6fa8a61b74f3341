//! Pull-based character source over a module's text.
//!
//! `RawCharStream` decodes characters lazily from the attached reader.
//! `CodeSource` sits on top of it, folds `\r\n`, `\r` and `\n` into a
//! single `'\n'` and tracks the position of the current character.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Cursor, Read};

use crate::diagnostic::{ErrorHandler, SourceError};
use crate::position::{Position, PositionTracker};

/// Raw characters of the attached stream with two characters of
/// lookahead, enough to see past a `\r\n` pair.
struct RawCharStream {
    reader: Option<Box<dyn BufRead>>,
    pending: VecDeque<char>,
    current: Option<char>,
    next: Option<char>,
    after_next: Option<char>,
    started: bool,
    exhausted: bool,
}

impl RawCharStream {
    fn new() -> Self {
        RawCharStream {
            reader: None,
            pending: VecDeque::new(),
            current: None,
            next: None,
            after_next: None,
            started: false,
            exhausted: false,
        }
    }

    fn attach(&mut self, reader: Box<dyn BufRead>) {
        *self = RawCharStream::new();
        self.reader = Some(reader);
    }

    fn detach(&mut self) {
        *self = RawCharStream::new();
    }

    fn move_to_next(&mut self) -> Result<(), SourceError> {
        if self.reader.is_none() {
            return Err(SourceError::StreamNotInitialized);
        }
        if !self.started {
            self.started = true;
            let filled = self.shift().and(self.shift());
            let moved = self.shift();
            return filled.and(moved);
        }
        self.shift()
    }

    /// Slide the window by one character. A failed read still slides it
    /// and only ends the lookahead.
    fn shift(&mut self) -> Result<(), SourceError> {
        let incoming = self.read_char();
        self.current = self.next;
        self.next = self.after_next;
        self.after_next = incoming.clone().unwrap_or_default();
        incoming.map(|_| ())
    }

    fn read_char(&mut self) -> Result<Option<char>, SourceError> {
        if let Some(c) = self.pending.pop_front() {
            return Ok(Some(c));
        }
        if self.exhausted {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(SourceError::StreamNotInitialized);
        };
        let mut line = String::new();
        let read = match reader.read_line(&mut line) {
            Ok(read) => read,
            Err(err) => {
                self.exhausted = true;
                return Err(SourceError::Read(err.to_string()));
            }
        };
        if read == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        self.pending.extend(line.chars());
        Ok(self.pending.pop_front())
    }
}

/// The character source the lexer reads from.
pub struct CodeSource<'h> {
    raw: RawCharStream,
    tracker: PositionTracker,
    handler: &'h ErrorHandler,
}

impl<'h> CodeSource<'h> {
    /// A source with no stream attached yet.
    pub fn new(handler: &'h ErrorHandler) -> Self {
        CodeSource {
            raw: RawCharStream::new(),
            tracker: PositionTracker::new(),
            handler,
        }
    }

    pub fn from_reader(reader: impl Read + 'static, handler: &'h ErrorHandler) -> Self {
        let mut source = CodeSource::new(handler);
        source.attach(Box::new(BufReader::new(reader)));
        source
    }

    pub fn from_text(text: impl Into<String>, handler: &'h ErrorHandler) -> Self {
        CodeSource::from_reader(Cursor::new(text.into().into_bytes()), handler)
    }

    /// Replace the current stream. The previous stream is dropped and the
    /// position is reset; no character is current until `move_to_next`.
    pub fn attach(&mut self, reader: Box<dyn BufRead>) {
        self.raw.attach(reader);
        self.tracker.reset();
    }

    pub fn detach(&mut self) {
        self.raw.detach();
        self.tracker.reset();
    }

    pub fn current_character(&self) -> Option<char> {
        self.raw.current.map(unify_new_line)
    }

    pub fn next_character(&self) -> Option<char> {
        if self.raw.current == Some('\r') && self.raw.next == Some('\n') {
            return self.raw.after_next.map(unify_new_line);
        }
        self.raw.next.map(unify_new_line)
    }

    /// Advance by exactly one logical character.
    pub fn move_to_next(&mut self) {
        let skip_line_feed = self.raw.current == Some('\r') && self.raw.next == Some('\n');
        if let Err(err) = self.advance_raw(skip_line_feed) {
            self.handler.raise_source_error(err);
        }
        if let Some(c) = self.current_character() {
            self.tracker.advance(c);
        }
    }

    pub fn position(&self) -> Position {
        self.tracker.position()
    }

    pub fn is_current_character_new_line(&self) -> bool {
        self.current_character() == Some('\n')
    }

    fn advance_raw(&mut self, skip_line_feed: bool) -> Result<(), SourceError> {
        let first = self.raw.move_to_next();
        if skip_line_feed {
            self.raw.move_to_next()?;
        }
        first
    }
}

fn unify_new_line(c: char) -> char {
    if c == '\r' { '\n' } else { c }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostic;

    fn read_all(text: &str) -> Vec<(char, Position)> {
        let handler = ErrorHandler::new(10);
        let mut source = CodeSource::from_text(text, &handler);
        let mut out = Vec::new();
        source.move_to_next();
        while let Some(c) = source.current_character() {
            out.push((c, source.position()));
            source.move_to_next();
        }
        out
    }

    #[test]
    fn ninth_character_of_two_lines() {
        let handler = ErrorHandler::new(10);
        let mut source = CodeSource::from_text("sample\ninput", &handler);
        for _ in 0..9 {
            source.move_to_next();
        }
        assert_eq!(source.current_character(), Some('n'));
        assert_eq!(source.position(), Position::new(2, 2));
    }

    #[test]
    fn position_is_pinned_at_end_of_stream() {
        for text in ["\n\n\n\n\n\n\n", "\r\n\r\n\r\n\r\n\r\n\r\n\r\n", "\r\r\r\r\r\r\r"] {
            let handler = ErrorHandler::new(10);
            let mut source = CodeSource::from_text(text, &handler);
            for _ in 0..100 {
                source.move_to_next();
            }
            assert_eq!(source.current_character(), None);
            assert_eq!(source.position(), Position::new(7, 1), "input {text:?}");
            assert!(!handler.has_errors());
        }
    }

    #[test]
    fn line_breaks_are_seen_as_single_line_feed() {
        let chars: Vec<char> = read_all("a\r\nb\rc\nd").into_iter().map(|(c, _)| c).collect();
        assert_eq!(chars, vec!['a', '\n', 'b', '\n', 'c', '\n', 'd']);
    }

    #[test]
    fn mixed_line_breaks_advance_lines() {
        let positions = read_all("a\r\nb\rc");
        assert_eq!(positions[2], ('b', Position::new(2, 1)));
        assert_eq!(positions[4], ('c', Position::new(3, 1)));
    }

    #[test]
    fn lookahead_skips_over_crlf_pair() {
        let handler = ErrorHandler::new(10);
        let mut source = CodeSource::from_text("\r\nx", &handler);
        source.move_to_next();
        assert!(source.is_current_character_new_line());
        assert_eq!(source.next_character(), Some('x'));
    }

    #[test]
    fn reading_without_stream_reports_source_error() {
        let handler = ErrorHandler::new(10);
        let mut source = CodeSource::new(&handler);
        source.move_to_next();
        assert_eq!(source.current_character(), None);
        assert_eq!(handler.error_count(), 1);
    }

    #[test]
    fn invalid_utf8_ends_the_stream_once() {
        let handler = ErrorHandler::new(10);
        let bytes = b"ab\n\xff\xfe\ncd".to_vec();
        let mut source = CodeSource::from_reader(Cursor::new(bytes), &handler);
        let mut chars = Vec::new();
        source.move_to_next();
        while let Some(c) = source.current_character() {
            chars.push(c);
            source.move_to_next();
        }
        source.move_to_next();

        assert_eq!(chars, vec!['a', 'b', '\n']);
        assert_eq!(source.position(), Position::new(1, 3));
        let reports = handler.reports();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            reports[0].diagnostic,
            Diagnostic::Source(SourceError::Read(_))
        ));
    }

    #[test]
    fn detaching_releases_the_stream() {
        let handler = ErrorHandler::new(10);
        let mut source = CodeSource::from_text("ab", &handler);
        source.move_to_next();
        assert_eq!(source.current_character(), Some('a'));

        source.detach();
        assert_eq!(source.current_character(), None);
        assert_eq!(source.position(), Position::default());
        source.move_to_next();
        assert_eq!(handler.error_count(), 1);
    }

    #[test]
    fn attaching_resets_position() {
        let handler = ErrorHandler::new(10);
        let mut source = CodeSource::from_text("ab\ncd", &handler);
        for _ in 0..5 {
            source.move_to_next();
        }
        assert_eq!(source.position(), Position::new(2, 2));
        source.attach(Box::new(Cursor::new(b"z".to_vec())));
        source.move_to_next();
        assert_eq!(source.current_character(), Some('z'));
        assert_eq!(source.position(), Position::FIRST_CHARACTER);
    }
}
