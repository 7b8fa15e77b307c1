/// Content hashing for stable, collision-resistant generated ids.
use sha2::{Digest as _, Sha256};

/// Hex characters kept from the digest.
const SUFFIX_LEN: usize = 8;

/// Collapse whitespace runs to single spaces so reflowed but otherwise
/// identical content hashes the same.
fn normalize_whitespace(text: &str) -> String {
    return text.split_whitespace().collect::<Vec<_>>().join(" ");
}

/// Short hex suffix derived from `text`.
///
/// Normalization: split on whitespace, join with single spaces, SHA-256
/// the result, keep the first eight hex digits. Equal content always
/// yields the same suffix, so rendered footnote ids are reproducible.
pub fn content_suffix(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(SUFFIX_LEN);
    return hex;
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests fail by panicking"
)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_short_hex() {
        let suffix = content_suffix("a footnote");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn whitespace_changes_do_not_change_the_suffix() {
        assert_eq!(content_suffix("a  b\n c"), content_suffix("a b c"));
        assert_ne!(content_suffix("a b c"), content_suffix("a b d"));
    }
}
