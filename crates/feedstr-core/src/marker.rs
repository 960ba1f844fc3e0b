//! GUID markers embedded in published post bodies.
//!
//! Every post carries its feed entry's identifier in a trailing HTML comment:
//!
//! ```text
//! <!-- GUID: "https://example.com/posts/42" -->
//! ```
//!
//! The marker is how a later run recognizes what has already been published,
//! since nothing is persisted locally. Double quotes and `>` are stripped from
//! the identifier so the comment always closes where it should and the quoted
//! value is unambiguous.

use regex::Regex;
use std::sync::LazyLock;

/// Matches a marker at the start of any line.
static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^<!-- GUID: "([^"]*)" -->"#).expect("marker regex should compile")
});

/// Strip the characters that could break out of the marker comment.
pub fn normalize_guid(guid: &str) -> String {
    guid.chars().filter(|c| !matches!(c, '"' | '>')).collect()
}

/// Render the marker line for an identifier.
pub fn marker_line(guid: &str) -> String {
    format!("<!-- GUID: \"{}\" -->", normalize_guid(guid))
}

/// Append a marker for `guid` to `body`, separated by a blank line.
pub fn encode(body: &str, guid: &str) -> String {
    let body = body.trim_end();
    if body.is_empty() {
        return marker_line(guid);
    }
    format!("{body}\n\n{}", marker_line(guid))
}

/// All marker identifiers found in `body`, in order of appearance.
pub fn markers(body: &str) -> Vec<&str> {
    MARKER_REGEX
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Recover the identifier embedded in a published post body.
///
/// Returns `None` when the body carries no marker. When more than one marker
/// is present the first one wins and a warning is logged.
pub fn decode(body: &str) -> Option<String> {
    let found = markers(body);
    match found.as_slice() {
        [] => None,
        [only] => Some((*only).to_string()),
        [first, rest @ ..] => {
            tracing::warn!(
                guid = %first,
                extra = rest.len(),
                "post body carries multiple GUID markers, using the first"
            );
            Some((*first).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_appends_marker_after_blank_line() {
        let body = encode("Hello world\n\n  \n", "abc-123");
        assert_eq!(body, "Hello world\n\n<!-- GUID: \"abc-123\" -->");
    }

    #[test]
    fn encode_empty_body_is_just_the_marker() {
        assert_eq!(encode("   ", "x"), "<!-- GUID: \"x\" -->");
    }

    #[test]
    fn encode_strips_quotes_and_closing_brackets() {
        let body = encode("text", r#"a"b>c<d"#);
        assert!(body.ends_with(r#"<!-- GUID: "abc<d" -->"#));
        assert_eq!(decode(&body).as_deref(), Some("abc<d"));
    }

    #[test]
    fn decode_without_marker_is_none() {
        assert_eq!(decode("just a post"), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn decode_requires_marker_at_line_start() {
        assert_eq!(decode(r#"see <!-- GUID: "inline" -->"#), None);
        assert_eq!(
            decode("first line\n<!-- GUID: \"ok\" -->").as_deref(),
            Some("ok")
        );
    }

    #[test]
    fn decode_is_case_sensitive() {
        assert_eq!(decode(r#"<!-- guid: "lower" -->"#), None);
    }

    #[test]
    fn decode_multiple_markers_returns_first() {
        let body = "<!-- GUID: \"quoted-in-body\" -->\nmore text\n\n<!-- GUID: \"real\" -->";
        assert_eq!(markers(body), vec!["quoted-in-body", "real"]);
        assert_eq!(decode(body).as_deref(), Some("quoted-in-body"));
    }

    #[test]
    fn decode_multiple_markers_logs_a_warning() {
        let (logs, _guard) = crate::testing::capture_logs();
        let body = "<!-- GUID: \"first\" -->\n\n<!-- GUID: \"second\" -->";
        assert_eq!(decode(body).as_deref(), Some("first"));

        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("multiple GUID markers"), "{output}");
        assert!(output.contains("guid=first"), "{output}");
    }

    #[test]
    fn decode_single_marker_logs_nothing() {
        let (logs, _guard) = crate::testing::capture_logs();
        assert_eq!(decode(&encode("body", "only")).as_deref(), Some("only"));
        assert!(logs.contents().is_empty());
    }

    #[test]
    fn decode_accepts_empty_guid() {
        assert_eq!(decode(r#"<!-- GUID: "" -->"#).as_deref(), Some(""));
    }

    proptest! {
        #[test]
        fn round_trip_recovers_normalized_guid(body in ".*", guid in ".*") {
            let encoded = encode(&body, &guid);
            let expected: String = guid.chars().filter(|c| *c != '"' && *c != '>').collect();
            // A body may itself contain a marker line; the appended one is always last.
            let found = markers(&encoded);
            prop_assert_eq!(found.last().copied(), Some(expected.as_str()));
        }

        #[test]
        fn round_trip_on_marker_free_body(body in "[a-zA-Z0-9 .,\n]*", guid in "[^\n]*") {
            let encoded = encode(&body, &guid);
            let expected: String = guid.chars().filter(|c| *c != '"' && *c != '>').collect();
            prop_assert_eq!(decode(&encoded), Some(expected));
        }

        #[test]
        fn decode_ignores_quotes_and_brackets_in_body(
            body in "[a-z0-9 \"'<>&=/.,\n-]*",
            guid in "[^\n]*",
        ) {
            let encoded = encode(&body, &guid);
            let expected: String = guid.chars().filter(|c| *c != '"' && *c != '>').collect();
            prop_assert_eq!(decode(&encoded), Some(expected));
        }
    }
}
