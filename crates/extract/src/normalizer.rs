use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Bullets (`-`, `*`, `•`, `+`) and numbering (`1.`, `2)`) at the start of a line.
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+").expect("list marker regex"));

/// Canonical form of a concept or relation name.
///
/// Case is preserved: concept identity is exact-string, so `Energy` and
/// `energy` stay distinct nodes. Only presentation noise is removed.
pub fn normalize_concept(name: &str) -> String {
    let trimmed = name
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"' | '“' | '”'))
        .trim()
        .trim_end_matches([',', ';', ':'])
        .trim();

    WHITESPACE.replace_all(trimmed, " ").into_owned()
}

/// Drop a leading list marker from a model output line.
pub fn strip_list_marker(line: &str) -> &str {
    match LIST_MARKER.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_concept("Photosynthesis"), "Photosynthesis");
        assert_eq!(normalize_concept("  **Photosynthesis**  "), "Photosynthesis");
        assert_eq!(normalize_concept("\"chemical   energy\""), "chemical energy");
        assert_eq!(normalize_concept("Sunlight,"), "Sunlight");
    }

    #[test]
    fn test_case_is_preserved() {
        assert_ne!(normalize_concept("Energy"), normalize_concept("energy"));
    }

    #[test]
    fn test_list_markers() {
        assert_eq!(strip_list_marker("- A | is | B"), "A | is | B");
        assert_eq!(strip_list_marker("12. A | is | B"), "A | is | B");
        assert_eq!(strip_list_marker("3) A | is | B"), "A | is | B");
        assert_eq!(strip_list_marker("A | is | B"), "A | is | B");
        assert_eq!(strip_list_marker("-5 degrees | is | cold"), "-5 degrees | is | cold");
    }
}
