#![forbid(unsafe_code)]

//! String helpers shared by extraction and materialization.

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::Regex;
use std::sync::LazyLock;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// Characters removed from playlist and item names before they hit the disk.
pub const FORBIDDEN_NAME_CHARS: [char; 5] = ['+', '/', '?', '|', ':'];

/// Removes HTML tags, leaving text and entities untouched.
pub fn strip_tags(input: &str) -> String {
    TAG_PATTERN.replace_all(input, "").into_owned()
}

/// Decodes HTML named and numeric entities. Input with an unknown entity is
/// returned as-is.
pub fn unescape_html(input: &str) -> String {
    match unescape_with(input, resolve_html5_entity) {
        Ok(value) => value.into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Strips the characters in [`FORBIDDEN_NAME_CHARS`].
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_NAME_CHARS.contains(c))
        .collect()
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tags_keeps_text() {
        assert_eq!(
            strip_tags("<p>Hello <b>world</b></p><br/>"),
            "Hello world"
        );
        assert_eq!(strip_tags("no markup"), "no markup");
    }

    #[test]
    fn unescape_html_handles_named_and_numeric() {
        assert_eq!(unescape_html("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(unescape_html("It&#39;s"), "It's");
        assert_eq!(unescape_html("caf&eacute;"), "café");
    }

    #[test]
    fn unescape_html_returns_raw_on_unknown_entity() {
        assert_eq!(unescape_html("a &bogus; b"), "a &bogus; b");
    }

    #[test]
    fn sanitize_removes_every_forbidden_char() {
        let cleaned = sanitize_file_name("a+b/c?d|e:f");
        assert_eq!(cleaned, "abcdef");
        for forbidden in FORBIDDEN_NAME_CHARS {
            assert!(!cleaned.contains(forbidden));
        }
    }

    #[test]
    fn escape_xml_escapes_all_markup() {
        assert_eq!(
            escape_xml(r#"<a href="x">Q&A</a> 'hi'"#),
            "&lt;a href=&quot;x&quot;&gt;Q&amp;A&lt;/a&gt; &apos;hi&apos;"
        );
    }
}
