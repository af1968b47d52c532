//! Route template matching.
//!
//! A request path matches a template when both split into the same number
//! of `/`-separated segments and every literal template segment equals the
//! request segment case-insensitively (Unicode, not just ASCII). `{name}`
//! segments match anything.
//!
//! Segments are produced the way `String.split` works on the JVM: a leading
//! `/` gives a leading empty segment, trailing empty segments are dropped.
//! So `/pets/42/` matches `/pets/{id}` but `pets/42` does not.

/// Returns true if `request_path` matches the route `template`.
pub fn matches(request_path: &str, template: &str) -> bool {
    let path_segments = segments(request_path);
    let template_segments = segments(template);

    if path_segments.len() != template_segments.len() {
        return false;
    }

    path_segments
        .iter()
        .zip(&template_segments)
        .all(|(segment, pattern)| is_placeholder(pattern) || eq_ignore_case(pattern, segment))
}

/// Case-insensitive comparison with Unicode lower-casing, so `CAFÉ` equals `café`.
fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// True for a `{name}` template segment.
pub fn is_placeholder(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

fn segments(path: &str) -> Vec<&str> {
    if !path.contains('/') {
        return vec![path];
    }
    let mut parts: Vec<&str> = path.split('/').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}
