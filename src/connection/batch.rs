use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::error::SqlBridgeError;
use crate::query::Query;

use super::Connection;

lazy_static! {
    static ref FUNCTION_HEADER: Regex =
        Regex::new(r"(?i)^(CREATE|REPLACE) .*FUNCTION").expect("function header pattern is valid");
    static ref FUNCTION_BODY_START: Regex =
        Regex::new(r"AS\s+(\S+)\s*$").expect("function body pattern is valid");
    static ref STATEMENT_END: Regex =
        Regex::new(r";(\s*|\s*--.*)$").expect("statement end pattern is valid");
    static ref COMMENT_ROW: Regex = Regex::new(r"^\s*--").expect("comment pattern is valid");
}

/// Split a script into statements.
///
/// A statement ends on a line finishing with `;` (optionally followed by a `--` comment).
/// Function bodies opened with `AS <delimiter>` are kept intact up to the line that repeats
/// the delimiter, so semicolons inside them do not split. Outside bodies, blank and
/// comment-only lines are dropped and the remaining lines are trimmed.
#[must_use]
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_function = false;
    let mut body_delimiter: Option<String> = None;

    for line in script.lines() {
        if in_function {
            current.push_str(line);
            current.push('\n');
            match &body_delimiter {
                None => {
                    if let Some(caps) = FUNCTION_BODY_START.captures(line) {
                        body_delimiter = Some(caps[1].to_string());
                    }
                }
                Some(delimiter) => {
                    if line.contains(delimiter.as_str()) {
                        body_delimiter = None;
                        in_function = false;
                        if STATEMENT_END.is_match(line) {
                            statements.push(current.trim().to_string());
                            current.clear();
                        }
                    }
                }
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || COMMENT_ROW.is_match(trimmed) {
            continue;
        }

        if FUNCTION_HEADER.is_match(trimmed) {
            in_function = true;
            current.push_str(line);
            current.push('\n');
            if let Some(caps) = FUNCTION_BODY_START.captures(trimmed) {
                body_delimiter = Some(caps[1].to_string());
            }
            continue;
        }

        current.push_str(trimmed);
        if STATEMENT_END.is_match(trimmed) {
            statements.push(current.trim().to_string());
            current.clear();
        } else {
            current.push('\n');
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }
    statements
}

/// Escape text for embedding in a SQL literal (`tsv == false`) or a tab-separated file.
///
/// ```rust
/// use sqlbridge::connection::escape_sql_string;
///
/// assert_eq!(escape_sql_string("O'Hara", false), "O''Hara");
/// assert_eq!(escape_sql_string("a\tb\nc", true), "a\\tb\\nc");
/// ```
#[must_use]
pub fn escape_sql_string(text: &str, tsv: bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match (tsv, ch) {
            (false, '\'') => out.push_str("''"),
            (true, '\\') => out.push_str("\\\\"),
            (true, '\t') => out.push_str("\\t"),
            (true, '\r') => out.push_str("\\r"),
            (true, '\n') => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

impl Connection {
    /// Run every statement of a script in order.
    ///
    /// With an `errors` sink, failures are collected as text and execution continues;
    /// without one, the first failure is returned.
    ///
    /// # Errors
    /// Returns the first statement's error when no sink is supplied.
    pub fn execute_batch_sql(
        &self,
        script: &str,
        mut errors: Option<&mut Vec<String>>,
    ) -> Result<(), SqlBridgeError> {
        let statements = split_statements(script);
        debug!("executing batch of {} statements", statements.len());
        for statement in &statements {
            let mut query = Query::new(self, statement).with_auto_prepare(false);
            match query.exec() {
                Ok(_) => {}
                Err(err) => match errors.as_deref_mut() {
                    Some(sink) => sink.push(err.to_string()),
                    None => return Err(err),
                },
            }
        }
        Ok(())
    }

    /// Read a script file and run it through [`Connection::execute_batch_sql`].
    ///
    /// # Errors
    /// Returns `SqlBridgeError::Io` if the file cannot be read, otherwise as `execute_batch_sql`.
    pub fn execute_batch_file(
        &self,
        path: impl AsRef<Path>,
        errors: Option<&mut Vec<String>>,
    ) -> Result<(), SqlBridgeError> {
        let script = std::fs::read_to_string(path)?;
        self.execute_batch_sql(&script, errors)
    }
}
