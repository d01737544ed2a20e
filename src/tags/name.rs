//! Tag-name grammar and `#tag` / `#@tag` markers in raw text

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Marker introducing a tag in raw text
pub const TAG_MARKER: char = '#';
/// Follows the tag marker to imply the tag's descendants
pub const DESCENDANTS_MARKER: char = '@';

static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}_][\p{L}\p{N}_\-]*$").expect("tag name regex"));

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(@?)([\p{L}\p{N}_][\p{L}\p{N}_\-]*)").expect("tag marker regex")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[a-z][a-z0-9+.\-]*://|www\.)\S*").expect("url regex")
});

/// Whether `name` satisfies the tag-name grammar
#[must_use]
pub fn is_valid_tag_name(name: &str) -> bool {
    TAG_NAME.is_match(name)
}

/// Strip the `#` marker from a configuration reference such as `"#person"`.
#[must_use]
pub fn strip_marker(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(TAG_MARKER)
        .filter(|name| is_valid_tag_name(name))
}

/// One tag marker found in text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMarker {
    pub name: String,
    /// `#@name`: the tag's descendants are implied as well
    pub descendants: bool,
    /// Byte range of the whole marker, `#` included
    pub span: Range<usize>,
}

/// Every tag marker in `text`, in order of appearance
#[must_use]
pub fn extract_markers(text: &str) -> Vec<TagMarker> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(TagMarker {
                name: caps[2].to_string(),
                descendants: !caps[1].is_empty(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Replace every URL-like run with spaces of the same byte length, so that
/// `#` characters inside links are not taken for tags.
#[must_use]
pub fn blank_urls(text: &str) -> String {
    URL.replace_all(text, |caps: &regex::Captures<'_>| " ".repeat(caps[0].len()))
        .into_owned()
}

/// Whether `text` carries a marker for exactly `name`
#[must_use]
pub fn contains_marker(text: &str, name: &str) -> bool {
    MARKER.captures_iter(text).any(|caps| &caps[2] == name)
}

/// Rewrite `#old` and `#@old` markers to `#new` / `#@new`, leaving markers
/// of other tags (including ones that merely start with `old`) untouched.
/// Returns the new text and the number of replacements.
#[must_use]
pub fn replace_marker(text: &str, old: &str, new: &str) -> (String, usize) {
    let mut count = 0;
    let replaced = MARKER.replace_all(text, |caps: &regex::Captures<'_>| {
        if &caps[2] == old {
            count += 1;
            format!("{TAG_MARKER}{}{new}", &caps[1])
        } else {
            caps[0].to_string()
        }
    });
    (replaced.into_owned(), count)
}

/// Like [`replace_marker`], but markers inside URLs are left alone, in line
/// with how content markers are extracted.
#[must_use]
pub fn replace_content_marker(text: &str, old: &str, new: &str) -> (String, usize) {
    let blanked = blank_urls(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for marker in extract_markers(&blanked).into_iter().filter(|m| m.name == old) {
        out.push_str(&text[last..marker.span.start]);
        out.push(TAG_MARKER);
        if marker.descendants {
            out.push(DESCENDANTS_MARKER);
        }
        out.push_str(new);
        last = marker.span.end;
        count += 1;
    }
    out.push_str(&text[last..]);
    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_name_grammar() {
        assert!(is_valid_tag_name("FranzMandl"));
        assert!(is_valid_tag_name("2021"));
        assert!(is_valid_tag_name("sea-side_trip"));
        assert!(is_valid_tag_name("Österreich"));
        assert!(!is_valid_tag_name(""));
        assert!(!is_valid_tag_name("-lead"));
        assert!(!is_valid_tag_name("two words"));
        assert!(!is_valid_tag_name("a/b"));
        assert!(!is_valid_tag_name("#x"));
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_marker("#person"), Some("person"));
        assert_eq!(strip_marker("person"), None);
        assert_eq!(strip_marker("#bad name"), None);
    }

    #[test]
    fn test_extract_markers() {
        let markers = extract_markers("beach #holiday #@family.jpg");
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].name, "holiday");
        assert!(!markers[0].descendants);
        assert_eq!(markers[0].span, 6..14);
        assert_eq!(markers[1].name, "family");
        assert!(markers[1].descendants);
    }

    #[test]
    fn test_blank_urls_preserves_offsets() {
        let text = "see https://example.com/page#anchor and #real";
        let blanked = blank_urls(text);
        assert_eq!(blanked.len(), text.len());
        let markers = extract_markers(&blanked);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "real");
        assert_eq!(&text[markers[0].span.clone()], "#real");

        let www = blank_urls("www.site.org/#nope #yes");
        assert_eq!(extract_markers(&www).len(), 1);
    }

    #[test]
    fn test_replace_marker_respects_boundaries() {
        let (text, n) = replace_marker("#me and #meeting and #@me.", "me", "FranzMandl");
        assert_eq!(n, 2);
        assert_eq!(text, "#FranzMandl and #meeting and #@FranzMandl.");
        assert!(contains_marker(&text, "FranzMandl"));
        assert!(!contains_marker(&text, "me"));
    }

    #[test]
    fn test_replace_content_marker_skips_urls() {
        let text = "see http://x.org/#old, then #old and #@old!";
        let (out, n) = replace_content_marker(text, "old", "new");
        assert_eq!(n, 2);
        assert_eq!(out, "see http://x.org/#old, then #new and #@new!");
        let (back, _) = replace_content_marker(&out, "new", "old");
        assert_eq!(back, text);
    }
}
