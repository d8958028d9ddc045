use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells. Tabs count as 4 cells.
pub fn display_width(s: &str) -> usize {
    s.split('\t')
        .enumerate()
        .map(|(i, part)| {
            let w = UnicodeWidthStr::width(part);
            if i > 0 { w + 4 } else { w }
        })
        .sum()
}

fn grapheme_display_width(g: &str) -> usize {
    if g == "\t" { 4 } else { UnicodeWidthStr::width(g) }
}

/// Truncate a string to fit within `max_cells` terminal cells, appending `…` if truncated.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells <= 1 {
        return "\u{2026}".to_string();
    }
    let budget = max_cells - 1; // reserve 1 cell for '…'
    let mut width = 0;
    let mut result = String::new();
    for grapheme in s.graphemes(true) {
        let gw = grapheme_display_width(grapheme);
        if width + gw > budget {
            break;
        }
        width += gw;
        result.push_str(grapheme);
    }
    result.push('\u{2026}');
    result
}

/// Collapse text to one display line: the first non-blank line, with `…`
/// appended when more lines follow.
pub fn single_line(s: &str) -> String {
    let mut lines = s.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (None, _) => String::new(),
        (Some(first), None) => first.to_string(),
        (Some(first), Some(_)) => format!("{} \u{2026}", first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_width() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本"), 4);
        assert_eq!(display_width("a\tb"), 6);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn test_truncate_fits() {
        assert_eq!(truncate_to_width("hello", 5), "hello");
        assert_eq!(truncate_to_width("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_width("Landscape plan", 8), "Landsca\u{2026}");
        assert_eq!(truncate_to_width("hello", 1), "\u{2026}");
        assert_eq!(truncate_to_width("hello", 0), "");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // Each CJK char is 2 cells; a 5-cell budget leaves room for two plus '…'
        assert_eq!(truncate_to_width("日本語テキスト", 5), "日本\u{2026}");
    }

    #[test]
    fn test_truncate_keeps_grapheme_clusters() {
        let s = "e\u{301}e\u{301}e\u{301}e\u{301}";
        assert_eq!(truncate_to_width(s, 3), "e\u{301}e\u{301}\u{2026}");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("Planning report"), "Planning report");
        assert_eq!(single_line("\n  first\nsecond"), "first \u{2026}");
        assert_eq!(single_line("   \n "), "");
    }
}
