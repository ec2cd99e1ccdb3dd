//! Search text normalization.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize text for indexing and matching.
///
/// Decomposes to NFD, drops combining marks, lower-cases, and collapses runs
/// of whitespace to single spaces with no leading or trailing space. Queries
/// and stored search text go through the same function so that "Café" and
/// "cafe" match.
pub fn normalize_search_text(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize_search_text("Café Crème"), "cafe creme");
        assert_eq!(normalize_search_text("Ærøskøbing"), "ærøskøbing");
        assert_eq!(normalize_search_text("São Paulo"), "sao paulo");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize_search_text("  Main \t Street\n "), "main street");
        assert_eq!(normalize_search_text("   "), "");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_search_text("Ünter den  Linden");
        assert_eq!(normalize_search_text(&once), once);
    }
}
