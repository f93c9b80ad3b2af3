//! Character-bounded string helpers shared by the normalizer, the extractor
//! and the error bookkeeping.

/// Maximum length of a failure reason persisted on a queue item.
pub const MAX_ERROR_CHARS: usize = 900;

/// Truncates `text` to at most `max_chars` characters.
///
/// Counts Unicode scalar values, never bytes, so multi-byte input is never
/// split in the middle of a character.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Bounds a failure reason before it is persisted or returned to callers.
#[must_use]
pub fn truncate_error(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return "unknown error".to_string();
    }
    truncate_chars(trimmed, MAX_ERROR_CHARS)
}

/// Produces a single-line diagnostic sample of untrusted text.
///
/// Control characters become spaces, whitespace runs collapse to one space,
/// and the result holds at most `max_chars` characters.
#[must_use]
pub fn sanitize_sample(raw: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(raw.len().min(max_chars * 4));
    let mut count = 0;
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_whitespace() || ch.is_control() {
            pending_space = count > 0;
            continue;
        }
        if pending_space {
            if count + 1 >= max_chars {
                break;
            }
            out.push(' ');
            count += 1;
            pending_space = false;
        }
        if count >= max_chars {
            break;
        }
        out.push(ch);
        count += 1;
    }

    out
}
