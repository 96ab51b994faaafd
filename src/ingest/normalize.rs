/// Strips NUL characters, collapses every whitespace run to a single space
/// and trims. Idempotent, so re-normalizing stored text is a no-op.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch == '\0' {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out
}

/// Replaces every character outside `[A-Za-z0-9._-]` with an underscore.
/// Sanitized names double as vector-record id prefixes, so this must stay
/// deterministic.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
