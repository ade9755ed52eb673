/// Normalize extracted text before it goes into a note.
///
/// Collapses runs of whitespace to single spaces, strips the space OCR
/// engines tend to leave before punctuation, drops control characters,
/// and removes blank lines. Every extraction path runs through this,
/// so results compare and merge cleanly regardless of method.
pub fn normalize_whitespace(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();

    filtered
        .lines()
        .map(collapse_line)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse intra-line whitespace and strip space before punctuation.
fn collapse_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for token in line.split_whitespace() {
        let attaches = token.len() == 1
            && matches!(token.chars().next(), Some('.' | ',' | ';' | ':' | '!' | '?'));
        if attaches && !out.is_empty() {
            out.push_str(token);
        } else {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(token);
        }
    }
    out
}
