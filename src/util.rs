// ABOUTME: Small string helpers shared by the HTTP clients and key loading
// ABOUTME: UTF-8 safe truncation and first-line extraction

pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }

    // Find a valid UTF-8 boundary at or before max_chars
    let mut boundary = max_chars;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    if boundary == 0 {
        return String::new();
    }

    format!("{}...", &s[..boundary])
}

/// Everything before the first newline, verbatim. A trailing `\r` from a
/// CRLF file is dropped.
pub fn first_line(content: &str) -> &str {
    let line = content.split('\n').next().unwrap_or_default();
    line.strip_suffix('\r').unwrap_or(line)
}
