//! Plain-text input sanitization

/// Reduces user-supplied text to a single clean line.
///
/// Whitespace runs (including newlines and tabs) collapse to one space,
/// other control characters are dropped, and the result is trimmed. A
/// value that sanitizes to the empty string is treated as "not provided"
/// by the store.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_control() {
            // Non-whitespace control characters are dropped outright.
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}
