//! Command-line tokenizer.
//!
//! Blank-separated words; a word opening with `'` runs to the next `'` and
//! may contain blanks. A final word starting with `&` requests a background
//! job and is dropped from the argument vector.

use crate::config::types::{Result, ShellError, MAX_ARGS};

/// Tokenized command line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedLine {
    pub argv: Vec<String>,
    pub background: bool,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Split `line` into words and a background flag.
///
/// An unterminated quote ends the line: the partial word is discarded.
pub fn parse_line(line: &str) -> Result<ParsedLine> {
    let mut rest = line.trim_end_matches(['\n', '\r']);
    let mut argv = Vec::new();

    loop {
        rest = rest.trim_start_matches(is_blank);
        if rest.is_empty() {
            break;
        }

        let word = if let Some(quoted) = rest.strip_prefix('\'') {
            let Some(end) = quoted.find('\'') else {
                break;
            };
            rest = &quoted[end + 1..];
            &quoted[..end]
        } else {
            let end = rest.find(is_blank).unwrap_or(rest.len());
            let word = &rest[..end];
            rest = &rest[end..];
            word
        };

        if argv.len() == MAX_ARGS {
            return Err(ShellError::InvalidCommand(format!(
                "too many arguments (max {})",
                MAX_ARGS
            )));
        }
        argv.push(word.to_string());
    }

    let background = argv.last().is_some_and(|word| word.starts_with('&'));
    if background {
        argv.pop();
    }

    Ok(ParsedLine { argv, background })
}
