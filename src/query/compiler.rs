//! Named-to-numbered placeholder compiler.
//!
//! Statements are built with named bind markers (`:instance_id`), but the
//! PostgreSQL extended protocol only understands positional `$1, $2, ...`
//! placeholders. [`compile`] rewrites the markers and records which name
//! feeds which position.
//!
//! The scanner skips string literals (plain, `E'...'` escape strings and
//! `$tag$` dollar-quoted bodies), quoted identifiers, comments and `::` casts.
//! It is not a SQL parser.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use serde_json::{Map, Value as JsonValue};

/// SQL text with positional placeholders and the names bound to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    sql: String,
    /// `param_names[n - 1]` is bound to `$n`.
    param_names: Vec<String>,
}

impl CompiledQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }

    /// Resolve named values into positional parameters.
    ///
    /// Extra entries in `values` are ignored; a missing name is an error.
    pub fn bind(&self, values: &Map<String, JsonValue>) -> DbResult<Vec<QueryParam>> {
        self.param_names
            .iter()
            .map(|name| {
                values.get(name).map(QueryParam::from).ok_or_else(|| {
                    DbError::invalid_input(format!("Missing value for parameter ':{}'", name))
                })
            })
            .collect()
    }
}

/// Rewrite `:name` markers in `sql` into `$n` placeholders.
///
/// The first occurrence of a name takes the next free position; later
/// occurrences reuse it.
pub fn compile(sql: &str) -> CompiledQuery {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len + 8);
    let mut param_names: Vec<String> = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i),
            b'E' | b'e' if bytes.get(i + 1) == Some(&b'\'') && !follows_word(bytes, i) => {
                i = skip_escape_string(bytes, i + 1);
            }
            b'$' if !follows_word(bytes, i) => i = skip_dollar_quoted(sql, i),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(len, |offset| i + offset + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(len, |offset| i + 2 + offset + 2);
            }
            b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
            b':' if bytes.get(i + 1).is_some_and(|b| is_name_start(*b)) => {
                let start = i + 1;
                let mut end = start;
                while end < len && is_name_char(bytes[end]) {
                    end += 1;
                }
                let name = &sql[start..end];
                let position = match param_names.iter().position(|n| n == name) {
                    Some(idx) => idx + 1,
                    None => {
                        param_names.push(name.to_string());
                        param_names.len()
                    }
                };
                out.push_str(&sql[copied..i]);
                out.push('$');
                out.push_str(&position.to_string());
                copied = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied..]);

    CompiledQuery {
        sql: out,
        param_names,
    }
}

/// Return the index just past the quoted run starting at `start`.
/// A doubled quote character is an escape, not a terminator.
fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Return the index just past an `E'...'` string whose quote is at `start`.
/// A backslash escapes the next byte; `''` is a literal quote.
fn skip_escape_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Return the index just past a `$tag$ ... $tag$` body opened at `start`,
/// or just past the `$` when it opens none (a `$1` placeholder, say).
fn skip_dollar_quoted(sql: &str, start: usize) -> usize {
    let bytes = sql.as_bytes();
    let mut end = start + 1;
    if bytes.get(end).is_some_and(|b| is_name_start(*b)) {
        while end < bytes.len() && is_name_char(bytes[end]) {
            end += 1;
        }
    }
    if bytes.get(end) != Some(&b'$') {
        return start + 1;
    }
    let tag = &sql[start..=end];
    let body = end + 1;
    sql[body..]
        .find(tag)
        .map_or(bytes.len(), |offset| body + offset + tag.len())
}

/// True when the byte before `i` continues an identifier.
fn follows_word(bytes: &[u8], i: usize) -> bool {
    i > 0 && (is_name_char(bytes[i - 1]) || bytes[i - 1] == b'$')
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
