//! Source-text normalization and hashing (spec §4.2 import step).
//!
//! Normalization is NFC, collapses runs of ASCII whitespace to a
//! single space, and trims the ends — but never touches `<br/>`, which
//! spec §9 requires to survive every TM/XML-adjacent path bit-exactly.
//! Splitting the string around `<br/>` before collapsing whitespace is
//! what makes that guarantee hold even when a source string has
//! leading/trailing whitespace on either side of a tag.

use unicode_normalization::UnicodeNormalization;

const BR_TAG: &str = "<br/>";

/// Normalizes `text` for TM comparison: NFC form, collapsed whitespace,
/// case preserved, `<br/>` preserved exactly.
pub fn normalize(text: &str) -> String {
    text.split(BR_TAG)
        .map(collapse_whitespace)
        .collect::<Vec<_>>()
        .join(BR_TAG)
}

fn collapse_whitespace(segment: &str) -> String {
    let nfc: String = segment.nfc().collect();
    let mut out = String::with_capacity(nfc.len());
    let mut last_was_space = false;
    for ch in nfc.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// Case/whitespace-insensitive form used by cascade tier 2: the
/// normalized form lowercased. Kept distinct from `normalize` so tier 1
/// (exact) and tier 2 (case-insensitive) compare against different hashes.
pub fn fold_case(normalized: &str) -> String {
    normalized.to_lowercase()
}

/// `source_hash` — a blake3 hex digest of the normalized source,
/// stored on `TMEntry` for O(1) exact-tier lookup (spec §3 TMEntry).
pub fn source_hash(normalized: &str) -> String {
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_but_keeps_br() {
        let input = "  기습   <br/>  strange   land  ";
        assert_eq!(normalize(input), "기습<br/>strange land");
    }

    #[test]
    fn preserves_case() {
        assert_eq!(normalize("Ambush"), "Ambush");
    }

    #[test]
    fn hash_is_stable_for_equal_normalized_forms() {
        let a = source_hash(&normalize("  Ambush  "));
        let b = source_hash(&normalize("Ambush"));
        assert_eq!(a, b);
    }

    #[test]
    fn fold_case_lowercases_normalized_form() {
        assert_eq!(fold_case(&normalize("Ambush")), "ambush");
    }
}
