//! Article title normalization and cache file naming.
//!
//! Titles are compared in MediaWiki canonical form: underscores read as
//! spaces, whitespace runs collapsed, first character upper-cased.

use sha2::{Digest, Sha256};

use crate::error::{Result, WikirouteError};

/// Characters that cannot appear in a file name on at least one supported platform.
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Longest sanitized stem kept verbatim before a hash suffix is added.
const MAX_STEM_BYTES: usize = 180;

/// Extension of adjacency record files.
pub const RECORD_EXTENSION: &str = "json";

/// Bring a title into canonical form. Idempotent.
pub fn normalize_title(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    // Characters whose upper case is several chars (ß, ﬁ) stay as they are
    let mut upper = first.to_uppercase();
    let first = match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => first,
    };
    std::iter::once(first).chain(chars).collect()
}

/// Normalize a user-supplied title, rejecting titles that are empty after normalization.
pub fn parse_title(raw: &str) -> Result<String> {
    let title = normalize_title(raw);
    if title.is_empty() {
        return Err(WikirouteError::InvalidInput(format!(
            "article title is empty: {:?}",
            raw
        )));
    }
    Ok(title)
}

/// File name (with extension) of the adjacency record for `title`.
///
/// Not collision-free: distinct titles differing only in unsafe characters
/// (e.g. `A/B` and `A:B`) share a file.
pub fn cache_file_name(title: &str) -> String {
    let mut stem: String = title
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if stem.starts_with('.') || stem.is_empty() {
        stem.replace_range(..stem.chars().next().map_or(0, char::len_utf8), "_");
    }

    if stem.len() > MAX_STEM_BYTES {
        let mut cut = MAX_STEM_BYTES;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
        let digest = format!("{:x}", Sha256::digest(title.as_bytes()));
        stem.push('~');
        stem.push_str(&digest[..16]);
    }

    format!("{}.{}", stem, RECORD_EXTENSION)
}
