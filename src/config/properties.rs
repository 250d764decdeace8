//! Line-oriented `key=value` properties parsing
//!
//! Accepts the format written by Java-style tooling: `#`/`!` comments, `=`,
//! `:` or whitespace separators, backslash line continuations and backslash
//! escapes (including `\uXXXX`). Later duplicates of a key win.

use std::collections::HashMap;
use std::io;

/// Parsed properties, keyed by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    /// Parse properties text.
    ///
    /// Fails with `InvalidData` on a malformed `\u` escape.
    pub fn parse(text: &str) -> io::Result<Self> {
        let mut entries = HashMap::new();

        for logical in logical_lines(text) {
            let (key, value) = split_entry(&logical)?;
            entries.insert(key, value);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for `key`, treating blank values as absent.
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// `true` only for a case-insensitive `true`, like the tooling that writes these files.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join physical lines into logical lines, dropping comments and blanks.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_start();

        let mut acc = match current.take() {
            Some(acc) => acc,
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                String::new()
            }
        };

        if ends_with_continuation(line) {
            acc.push_str(&line[..line.len() - 1]);
            current = Some(acc);
        } else {
            acc.push_str(line);
            lines.push(acc);
        }
    }

    if let Some(acc) = current {
        lines.push(acc);
    }

    lines
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> io::Result<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut key_end = chars.len();

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if c.is_whitespace() => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }

    let key_raw: String = chars[..key_end.min(chars.len())].iter().collect();

    // Skip whitespace, at most one separator, then whitespace again.
    let mut j = key_end;
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    if j < chars.len() && (chars[j] == '=' || chars[j] == ':') {
        j += 1;
    }
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    let value_raw: String = chars[j.min(chars.len())..].iter().collect();

    Ok((unescape(&key_raw)?, unescape(&value_raw)?))
}

fn unescape(s: &str) -> io::Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("malformed \\uXXXX escape: \\u{hex}"),
                        )
                    })?;
                out.push(code);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}
