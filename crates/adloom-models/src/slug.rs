//! Seed-to-slug conversion for artifact naming.

use sha2::{Digest, Sha256};

/// Default maximum slug length in characters.
pub const MAX_SLUG_LEN: usize = 40;

/// Hex characters of the content hash appended to truncated slugs.
const HASH_SUFFIX_LEN: usize = 6;

/// Convert free text into a URL-safe slug of at most `max_len` characters.
///
/// Alphanumerics are lowercased; every other run of characters collapses to a
/// single hyphen, with leading/trailing hyphens trimmed. Seeds whose slug
/// exceeds `max_len` keep a truncated prefix plus the first six hex digits of
/// the seed's SHA-256, so distinct long seeds stay distinct.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len().min(max_len * 2));
    let mut pending_hyphen = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() <= max_len {
        return slug;
    }

    let digest = Sha256::digest(text.as_bytes());
    let mut suffix = String::with_capacity(HASH_SUFFIX_LEN);
    for byte in digest.iter().take(HASH_SUFFIX_LEN / 2) {
        suffix.push_str(&format!("{byte:02x}"));
    }

    // Slug is pure ASCII here, so byte indexing is char-safe.
    let keep = max_len.saturating_sub(HASH_SUFFIX_LEN + 1);
    let prefix = slug[..keep.min(slug.len())].trim_end_matches('-');
    if prefix.is_empty() {
        return suffix;
    }
    format!("{prefix}-{suffix}")
}
