//! Nested math repair.
//!
//! Authored content sometimes nests inline math, e.g. `$\(\text{x}\)$`,
//! which LaTeX rejects. Inner `\(` and `\)` inside a `$…$` span on a single
//! line are replaced by spaces.

/// Strip inline-math delimiters nested inside `$…$` spans.
pub(crate) fn strip_nested_delimiters(text: &str) -> String {
    text.split('\n')
        .map(repair_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn repair_line(line: &str) -> String {
    let dollars = unescaped_dollars(line);
    if dollars.len() < 2 {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for pair in dollars.chunks_exact(2) {
        let (open, close) = (pair[0], pair[1]);
        out.push_str(&line[cursor..=open]);
        out.push_str(&line[open + 1..close].replace(r"\(", " ").replace(r"\)", " "));
        cursor = close;
    }
    out.push_str(&line[cursor..]);
    out
}

/// Byte offsets of `$` signs not escaped by an odd run of backslashes.
fn unescaped_dollars(line: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut backslashes = 0usize;
    for (idx, c) in line.char_indices() {
        if c == '$' && backslashes % 2 == 0 {
            positions.push(idx);
        }
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
    }
    positions
}
