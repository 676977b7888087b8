//! Action Parser - free-text agent replies to typed actions.
//!
//! # Grammar
//!
//! One command per line, keywords case-insensitive:
//!
//! ```text
//! PASS
//! SEND <amount> TO <agent-name>
//! MESSAGE <agent-name> "<text>"
//! BROADCAST "<text>"
//! ```
//!
//! Everything else (reasoning, commentary, markdown) is dropped silently.
//! Parsing never fails: the worst case is a single implicit `PASS`.
//!
//! # Known Limitation
//!
//! Quotes inside message content are not escaped or nested. Content is the
//! raw text between the outermost pair of matching quotes.

use std::collections::HashMap;

use crate::types::{Action, RejectReason};

/// Maximum characters kept from MESSAGE/BROADCAST content.
pub const MAX_CONTENT_CHARS: usize = 500;

const COMMENT_MARKERS: [&str; 2] = ["#", "//"];

/// Punctuation tolerated after a keyword or agent name (`Agent-2:`).
const TRAILING_PUNCTUATION: [char; 4] = [':', ',', ';', '.'];

const QUOTE_PAIRS: [(char, char); 3] = [('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')];

/// Parses one agent's reply into actions.
///
/// # Arguments
/// * `raw` - The reply text, unmodified
/// * `known_names` - Display names of every agent in the run
/// * `own_name` - Display name of the replying agent
pub fn parse(raw: &str, known_names: &[String], own_name: &str) -> Vec<Action> {
    let roster = Roster::new(known_names, own_name);

    let mut actions: Vec<Action> = raw
        .lines()
        .filter_map(|line| parse_line(line, &roster))
        .collect();

    if actions.is_empty() {
        actions.push(Action::pass(own_name));
    }
    actions
}

// =============================================================================
// TOKENIZER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pass,
    Send,
    Message,
    Broadcast,
}

impl Command {
    fn from_keyword(word: &str) -> Option<Self> {
        let word = word.trim_end_matches(TRAILING_PUNCTUATION);
        [
            ("PASS", Command::Pass),
            ("SEND", Command::Send),
            ("MESSAGE", Command::Message),
            ("BROADCAST", Command::Broadcast),
        ]
        .into_iter()
        .find(|(keyword, _)| word.eq_ignore_ascii_case(keyword))
        .map(|(_, command)| command)
    }
}

/// Whitespace-delimited cursor over a single line.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn word(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(word)
    }

    fn remainder(&self) -> &'a str {
        self.rest.trim()
    }

    fn is_exhausted(&self) -> bool {
        self.rest.trim().is_empty()
    }
}

// =============================================================================
// PARSER
// =============================================================================

struct Roster<'a> {
    own: &'a str,
    by_lower: HashMap<String, &'a str>,
}

impl<'a> Roster<'a> {
    fn new(known_names: &'a [String], own: &'a str) -> Self {
        let by_lower = known_names
            .iter()
            .map(|name| (name.to_lowercase(), name.as_str()))
            .collect();
        Self { own, by_lower }
    }

    fn resolve(&self, name: &str) -> Option<&'a str> {
        self.by_lower.get(&name.to_lowercase()).copied()
    }

    fn is_self(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(self.own)
    }
}

fn parse_line(line: &str, roster: &Roster<'_>) -> Option<Action> {
    let line = line.trim();
    if line.is_empty() || COMMENT_MARKERS.iter().any(|m| line.starts_with(m)) {
        return None;
    }

    let mut cursor = Cursor::new(line);
    match Command::from_keyword(cursor.word()?)? {
        Command::Pass => cursor.is_exhausted().then(|| Action::pass(roster.own)),
        Command::Send => parse_send(&mut cursor, roster),
        Command::Message => parse_message(&mut cursor, roster),
        Command::Broadcast => {
            let content = message_content(cursor.remainder())?;
            Some(Action::broadcast(roster.own, &content))
        }
    }
}

fn parse_send(cursor: &mut Cursor<'_>, roster: &Roster<'_>) -> Option<Action> {
    let word = cursor.word()?;
    let (amount, overflow) = match word.parse::<i64>() {
        Ok(amount) => (amount, false),
        Err(_) if is_integer(word) => {
            let clamped = if word.starts_with('-') { i64::MIN } else { i64::MAX };
            (clamped, true)
        }
        Err(_) => return None,
    };
    if !cursor.word()?.eq_ignore_ascii_case("TO") {
        return None;
    }
    let target = clean_name(cursor.word()?);
    if target.is_empty() {
        return None;
    }

    if amount <= 0 {
        let target = roster.resolve(target).unwrap_or(target);
        return Some(
            Action::transfer(roster.own, target, amount).reject(RejectReason::NonPositiveAmount),
        );
    }
    Some(match roster.resolve(target) {
        None => Action::transfer(roster.own, target, amount).reject(RejectReason::UnknownTarget),
        Some(name) if roster.is_self(name) => {
            Action::transfer(roster.own, name, amount).reject(RejectReason::SelfTransfer)
        }
        Some(name) if overflow => {
            Action::transfer(roster.own, name, amount).reject(RejectReason::AmountOutOfRange)
        }
        Some(name) => Action::transfer(roster.own, name, amount),
    })
}

/// An optionally signed run of ASCII digits, whatever its magnitude.
fn is_integer(word: &str) -> bool {
    let digits = word.strip_prefix(['+', '-']).unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_message(cursor: &mut Cursor<'_>, roster: &Roster<'_>) -> Option<Action> {
    let target = clean_name(cursor.word()?);
    let content = message_content(cursor.remainder())?;
    if target.is_empty() {
        return None;
    }

    Some(match roster.resolve(target) {
        None => Action::direct_message(roster.own, target, &content)
            .reject(RejectReason::UnknownTarget),
        Some(name) if roster.is_self(name) => {
            Action::direct_message(roster.own, name, &content).reject(RejectReason::SelfMessage)
        }
        Some(name) => Action::direct_message(roster.own, name, &content),
    })
}

fn clean_name(word: &str) -> &str {
    word.trim_end_matches(TRAILING_PUNCTUATION)
        .trim_matches(|c| c == '"' || c == '\'')
}

/// Strips one pair of symmetric quotes and truncates. Empty content is unusable.
fn message_content(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let unquoted = QUOTE_PAIRS
        .iter()
        .find_map(|(open, close)| {
            raw.strip_prefix(*open)
                .and_then(|inner| inner.strip_suffix(*close))
        })
        .unwrap_or(raw)
        .trim();

    if unquoted.is_empty() {
        return None;
    }
    Some(unquoted.chars().take(MAX_CONTENT_CHARS).collect())
}
