//! Whitespace and line hygiene.

/// Replace tabs, drop blank and comment lines, and rejoin with `\n`.
pub(crate) fn clean(text: &str) -> String {
    text.replace('\t', " ")
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('%')
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
