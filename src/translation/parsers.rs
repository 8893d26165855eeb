pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// `::type` casts and `:=` assignments are not parameters.
pub(super) fn is_cast_or_assignment(bytes: &[u8], idx: usize) -> bool {
    matches!(bytes.get(idx + 1), Some(b':' | b'='))
}

/// Oracle trigger row references (`:new.col`, `:old.col`) are not parameters.
pub(super) fn is_trigger_row_reference(name: &str, bytes: &[u8], name_end: usize) -> bool {
    bytes.get(name_end) == Some(&b'.')
        && (name.eq_ignore_ascii_case("new") || name.eq_ignore_ascii_case("old"))
}

pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        // `$1` is a positional parameter, not a quote tag
        if tag.bytes().next().is_some_and(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((tag, idx))
    } else {
        None
    }
}

pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len()
        && bytes[idx + 1..=end].starts_with(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}
