//! Named-parameter expansion.
//!
//! Queries are written with `:name` placeholders; each occurrence becomes one positional bind
//! slot rendered in the dialect's own mark (`$1`, `?1`, `:1`, `?`).

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_cast_or_assignment, is_line_comment_start,
    is_trigger_row_reference, matches_tag, try_start_dollar_quote,
};
use scanner::{State, scan_identifier};

/// SQL text with `:name` placeholders replaced by positional marks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpandedSql {
    pub sql: String,
    /// Parameter name for each bind position; position `n` (1-based) is `parameters[n - 1]`.
    pub parameters: Vec<String>,
}

/// Replace every `:name` placeholder with `param_mark(position)`.
///
/// Quoted strings, quoted identifiers, comments and dollar-quoted bodies are copied verbatim,
/// as are `::` casts, `:=` assignments and `:new.`/`:old.` trigger references.
///
/// ```rust
/// use sqlbridge::translation::expand_named_parameters;
///
/// let expanded = expand_named_parameters(
///     "select * from t where a = :id and b::text = ':id' or c = :id",
///     |n| format!("${n}"),
/// );
/// assert_eq!(expanded.sql, "select * from t where a = $1 and b::text = ':id' or c = $2");
/// assert_eq!(expanded.parameters, ["id", "id"]);
/// ```
pub fn expand_named_parameters<F>(sql: &str, mut param_mark: F) -> ExpandedSql
where
    F: FnMut(u32) -> String,
{
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut parameters = Vec::new();
    let mut copied_to = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b':' if is_cast_or_assignment(bytes, idx) => idx += 1,
                b':' => {
                    if let Some((name_end, name)) = scan_identifier(bytes, idx + 1) {
                        if !is_trigger_row_reference(name, bytes, name_end) {
                            parameters.push(name.to_string());
                            let position = u32::try_from(parameters.len()).unwrap_or(u32::MAX);
                            out.push_str(&sql[copied_to..idx]);
                            out.push_str(&param_mark(position));
                            copied_to = name_end;
                        }
                        idx = name_end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }
        idx += 1;
    }

    out.push_str(&sql[copied_to..]);
    ExpandedSql {
        sql: out,
        parameters,
    }
}
