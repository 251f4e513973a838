//! Unified diffs between two renderings of a build file.

use std::path::Path;

use similar::TextDiff;

/// Render a unified diff from `before` to `after`, or `None` when the two are
/// identical.
pub fn unified_diff(path: &Path, before: &str, after: &str) -> Option<String> {
    if before == after {
        return None;
    }
    let name = path.display();
    let diff = TextDiff::from_lines(before, after);
    let rendered = diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string();
    Some(rendered)
}
