//! Pagination metadata carried in response headers.

use std::sync::LazyLock;

use regex::Regex;

use crate::transport::Headers;

/// Header carrying pagination links.
pub const LINK_HEADER: &str = "link";

/// Default header carrying the size of the full result set.
pub const DEFAULT_TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Matches one `<url>; param; param` entry of a Link header.
static LINK_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]*)>((?:\s*;\s*[^;,]+)*)").expect("valid link regex"));

/// Matches the `rel` parameter, quoted or bare.
static REL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)rel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#).expect("valid rel regex")
});

/// Find the URL for a link relation (`next`, `prev`) in a Link header.
///
/// `rel` may name several space-separated relations.
pub fn find_link(header: &str, relation: &str) -> Option<String> {
    LINK_ENTRY.captures_iter(header).find_map(|entry| {
        let params = entry.get(2)?.as_str();
        let rel = REL_PARAM.captures(params)?;
        let rels = rel.get(1).or_else(|| rel.get(2))?.as_str();
        rels.split_whitespace()
            .any(|r| r.eq_ignore_ascii_case(relation))
            .then(|| entry[1].to_string())
    })
}

/// The `next` page URL, if any.
pub fn next_link(headers: &Headers) -> Option<String> {
    headers.get(LINK_HEADER).and_then(|h| find_link(h, "next"))
}

/// The `prev` page URL, if any.
pub fn prev_link(headers: &Headers) -> Option<String> {
    headers.get(LINK_HEADER).and_then(|h| find_link(h, "prev"))
}

/// Parse a total-count header value.
///
/// Only values that convert to a non-negative integer count; anything else
/// is treated as absent.
pub fn parse_total_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }
    // Accept integral floats such as "12.0".
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
        .map(|n| n as u64)
}
