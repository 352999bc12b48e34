//! Placeholder substitution for action command lines
//!
//! Commands configured for card insertion may reference the responses to the
//! configured APDUs with `{n}`, where `n` is the 1-based position of the
//! command in the configured list.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([0-9]+)\}").expect("placeholder pattern is valid"));

/// Substitute `{n}` placeholders in `template` with `responses[n - 1]`.
///
/// Placeholders whose index is zero or beyond the end of `responses` are kept
/// verbatim. Substituted text is never scanned again, so a response that looks
/// like a placeholder is inserted as-is.
pub fn render_command<S: AsRef<str>>(template: &str, responses: &[S]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| responses.get(i))
                .map_or_else(|| caps[0].to_string(), |r| r.as_ref().to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn test_substitutes_in_range_index() {
        assert_eq!(render_command("resp={1}", &["9000"]), "resp=9000");
        assert_eq!(
            render_command("{2} then {1}!", &["aa", "bb"]),
            "bb then aa!"
        );
    }

    #[test]
    fn test_out_of_range_index_is_kept() {
        assert_eq!(render_command("{5}", &["9000"]), "{5}");
        assert_eq!(render_command("{0}", &["9000"]), "{0}");
        assert_eq!(
            render_command("{99999999999999999999999}", &["9000"]),
            "{99999999999999999999999}"
        );
    }

    #[test]
    fn test_repeated_index() {
        assert_eq!(render_command("{1}-{1}", &["AA"]), "AA-AA");
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        assert_eq!(render_command("no placeholders", NONE), "no placeholders");
        assert_eq!(render_command("", NONE), "");
    }

    #[test]
    fn test_empty_responses_keep_every_placeholder() {
        assert_eq!(render_command("a {1} b {2}", NONE), "a {1} b {2}");
    }

    #[test]
    fn test_empty_response_substitutes_empty_string() {
        assert_eq!(render_command("echo {1}", &[""]), "echo ");
    }

    #[test]
    fn test_inserted_text_is_not_rescanned() {
        assert_eq!(render_command("{1}{2}", &["{2}", "x"]), "{2}x");
    }

    #[test]
    fn test_malformed_placeholders_are_copied() {
        assert_eq!(
            render_command("{} {a} {1 } {-1} {{1}}", &["r"]),
            "{} {a} {1 } {-1} {r}"
        );
    }
}
