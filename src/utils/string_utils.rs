//! UTF-8-safe string helpers for scraped text
//!
//! Portal text is German and full of multi-byte characters (`ä`, `ß`, `€`),
//! so every cut happens on character boundaries.

/// Truncate a string to at most `max_chars` characters (not bytes).
///
/// # Examples
/// ```
/// # use elsa_crawl::utils::string_utils::truncate_chars;
/// assert_eq!(truncate_chars("Feldmaßnahmen", 8), "Feldmaßn");
/// assert_eq!(truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Normalize a tree link label.
///
/// Tree icons render as an `image` text node in front of the label, so a
/// leading `image` (any case) is stripped before trimming.
///
/// # Examples
/// ```
/// # use elsa_crawl::utils::string_utils::clean_label;
/// assert_eq!(clean_label("  imageMotor "), "Motor");
/// assert_eq!(clean_label("Imagefilm"), "film");
/// assert_eq!(clean_label("Getriebe"), "Getriebe");
/// ```
pub fn clean_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("image") => &trimmed[5..],
        _ => trimmed,
    };
    stripped.trim().to_string()
}
