//! Heuristic confidence scoring for remote extraction output.
//!
//! The vision service returns no per-word confidence, so we estimate one
//! from output characteristics: text length as the primary signal, with
//! small bonuses for structural markers (headers, tables, lists) that
//! indicate the model actually read a document rather than guessing.

/// Estimate confidence for remote-extracted text.
///
/// Length tiers:
/// - 0 chars → 0.0 (extraction failed)
/// - 1-49 → 0.2, 50-199 → 0.4, 200-499 → 0.6, 500+ → 0.8
///
/// Structure bonuses: headers +0.05, tables +0.05, lists +0.03.
/// Capped at 0.95 — a heuristic never claims certainty.
pub fn estimate_confidence(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    let len = text.len();
    let base: f32 = if len < 50 {
        0.2
    } else if len < 200 {
        0.4
    } else if len < 500 {
        0.6
    } else {
        0.8
    };

    let has_headers = text.lines().any(|l| l.starts_with('#'));
    let has_tables = text
        .lines()
        .any(|l| l.contains('|') && l.matches('|').count() >= 2);
    let has_lists = text
        .lines()
        .any(|l| l.trim_start().starts_with("- ") || l.trim_start().starts_with("* "));

    let bonus: f32 = if has_headers { 0.05 } else { 0.0 }
        + if has_tables { 0.05 } else { 0.0 }
        + if has_lists { 0.03 } else { 0.0 };

    (base + bonus).min(0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(estimate_confidence(""), 0.0);
    }

    #[test]
    fn short_text_is_low() {
        let c = estimate_confidence("WBC 7.2");
        assert!((c - 0.2).abs() < f32::EPSILON, "got {c}");
    }

    #[test]
    fn length_tiers() {
        assert!((estimate_confidence(&"x".repeat(100)) - 0.4).abs() < f32::EPSILON);
        assert!((estimate_confidence(&"x".repeat(300)) - 0.6).abs() < f32::EPSILON);
        assert!((estimate_confidence(&"x".repeat(600)) - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn structure_bonuses_stack() {
        let text = format!(
            "# Lab Results\n\n| Test | Value |\n|------|-------|\n| WBC | 7.2 |\n\n- Normal range\n{}",
            "x".repeat(500)
        );
        let c = estimate_confidence(&text);
        // 0.8 + 0.05 + 0.05 + 0.03 = 0.93
        assert!((c - 0.93).abs() < 0.01, "got {c}");
    }

    #[test]
    fn capped_below_certainty() {
        let text = format!(
            "# H1\n| a | b |\n|---|---|\n- item\n{}",
            "x".repeat(2000)
        );
        assert!(estimate_confidence(&text) <= 0.95);
    }
}
