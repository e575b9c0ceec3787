//! Small text normalization helpers shared by routing, synthesis, and logging.

/// Collapse all whitespace runs into single spaces and trim the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a free-form text field: collapse whitespace and cap length.
///
/// Empty or whitespace-only input yields the empty string; callers decide
/// whether that is an error (synthesis does, logging does not).
#[must_use]
pub fn normalize_text_field(value: &str, max_len: usize) -> String {
    let mut text = collapse_whitespace(value);
    if text.len() > max_len {
        text.truncate(floor_char_boundary(&text, max_len));
        text = text.trim_end().to_string();
    }
    text
}

/// Whitespace-collapsed, ellipsis-truncated preview for log lines.
#[must_use]
pub fn preview(value: &str, max_len: usize) -> String {
    let normalized = collapse_whitespace(value);
    if normalized.len() <= max_len {
        return normalized;
    }
    let cut = floor_char_boundary(&normalized, max_len.saturating_sub(3));
    format!("{}...", &normalized[..cut])
}

/// Slugify text into `[a-z0-9_]`: lowercase, non-alphanumeric runs become a
/// single underscore, leading/trailing underscores stripped.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut boundary = index;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}
