//! Content normalization and deterministic hashing for dedup.

use crate::types::SourceType;

/// Strip HTML tags from a string. Tag contents are kept, the markup is not.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                    // Tags act as word boundaries so "<p>a</p><p>b</p>" doesn't fuse
                    out.push(' ');
                } else {
                    out.push(c);
                }
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Normalize content for hashing and comparison: decode the common
/// entities, strip HTML, collapse whitespace, trim. Idempotent.
pub fn normalize_content(input: &str) -> String {
    // Double-escaped entities ("&amp;lt;") decode into markup on a later
    // pass, so iterate to a fixpoint. Every pass strictly shrinks or leaves
    // the string unchanged, so this terminates.
    let mut current = normalize_once(input);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(input: &str) -> String {
    let decoded = input
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    let stripped = strip_html(&decoded);
    stripped.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Deterministic content hash (FNV-1a) rendered as 16 hex chars.
/// Must be stable across process restarts — `DefaultHasher` is NOT
/// (HashDoS randomization).
pub fn content_hash(content: &str) -> String {
    let mut hash: u64 = 0xcbf29ce484222325; // FNV offset basis
    for byte in content.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3); // FNV prime
    }
    format!("{hash:016x}")
}

/// Dedup hash for a stored source, over the normalized
/// (type, url, author, raw_content) key.
pub fn source_dedup_hash(
    source_type: SourceType,
    url: &str,
    author: Option<&str>,
    raw_content: &str,
) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        source_type,
        url.trim(),
        author.unwrap_or("").trim(),
        normalize_content(raw_content),
    );
    content_hash(&key)
}

/// Dedup hash for a feed item before it becomes a source: url + title + content.
pub fn feed_item_hash(url: &str, title: &str, raw_content: &str) -> String {
    content_hash(&format!("{url}{title}{raw_content}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        let html = "<p>Missile   strike</p>\n<div>reported <b>near</b> the border</div>";
        assert_eq!(
            normalize_content(html),
            "Missile strike reported near the border"
        );
    }

    #[test]
    fn decodes_common_entities() {
        assert_eq!(
            normalize_content("War &amp; Peace &#39;quoted&#39;"),
            "War & Peace 'quoted'"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "<p>plain</p>",
            "  spaced   out  ",
            "a &amp; b",
            "already normal",
        ];
        for input in inputs {
            let once = normalize_content(input);
            assert_eq!(normalize_content(&once), once);
        }
    }

    #[test]
    fn normalize_is_idempotent_for_double_escaped_entities() {
        // "&amp;lt;" decodes to a bare "<", which a later pass would
        // otherwise strip as an unterminated tag
        for input in ["&amp;lt;", "&amp;amp;", "a &amp;lt;b&amp;gt; c"] {
            let once = normalize_content(input);
            assert_eq!(normalize_content(&once), once, "input: {input}");
        }
    }

    #[test]
    fn hash_is_stable_and_distinct() {
        let a = content_hash("the same input");
        let b = content_hash("the same input");
        let c = content_hash("a different input");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn source_hash_agrees_on_normalized_content() {
        let a = source_dedup_hash(
            SourceType::NewsMedia,
            "https://example.com/a",
            Some("reuters"),
            "<p>Strike   reported</p>",
        );
        let b = source_dedup_hash(
            SourceType::NewsMedia,
            "https://example.com/a",
            Some("reuters"),
            "Strike reported",
        );
        assert_eq!(a, b);

        let other_type = source_dedup_hash(
            SourceType::Twitter,
            "https://example.com/a",
            Some("reuters"),
            "Strike reported",
        );
        assert_ne!(a, other_type);
    }
}
