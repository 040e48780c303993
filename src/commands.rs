//! The command-file grammar.
//!
//! One command per line: `insert <sequence>`, `remove <sequence>`,
//! `search <sequence>` (optionally `$`-terminated for an exact match),
//! and `print` with an optional `lengths` or `stats` mode. Blank lines
//! are skipped; anything else is reported and skipped.

use std::fmt;

use dnastore_engine::PrintMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert(String),
    Remove(String),
    Search(String),
    Print(PrintMode),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    UnknownCommand(String),
    MissingArgument(&'static str),
    TrailingArgument(String),
    UnknownPrintMode(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownCommand(word) => write!(f, "unrecognized command \"{word}\""),
            ParseError::MissingArgument(usage) => write!(f, "missing argument: usage is {usage}"),
            ParseError::TrailingArgument(word) => write!(f, "unexpected argument \"{word}\""),
            ParseError::UnknownPrintMode(word) => {
                write!(f, "unknown print mode \"{word}\" (expected lengths or stats)")
            }
        }
    }
}

/// Parses one line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
    let mut words = line.split_whitespace();
    let keyword = words.next()?;
    let command = match keyword {
        "insert" => match words.next() {
            Some(sequence) => Ok(Command::Insert(sequence.to_owned())),
            None => Err(ParseError::MissingArgument("insert <sequence>")),
        },
        "remove" => match words.next() {
            Some(sequence) => Ok(Command::Remove(sequence.to_owned())),
            None => Err(ParseError::MissingArgument("remove <sequence>")),
        },
        "search" => match words.next() {
            Some(sequence) => Ok(Command::Search(sequence.to_owned())),
            None => Err(ParseError::MissingArgument("search <sequence>")),
        },
        "print" => match words.next() {
            None => Ok(Command::Print(PrintMode::Plain)),
            Some("lengths") => Ok(Command::Print(PrintMode::Lengths)),
            Some("stats") => Ok(Command::Print(PrintMode::Stats)),
            Some(mode) => Err(ParseError::UnknownPrintMode(mode.to_owned())),
        },
        other => Err(ParseError::UnknownCommand(other.to_owned())),
    };
    let command = command.and_then(|command| match words.next() {
        Some(extra) => Err(ParseError::TrailingArgument(extra.to_owned())),
        None => Ok(command),
    });
    Some(command)
}
