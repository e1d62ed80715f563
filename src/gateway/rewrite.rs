//! Namespacing of exposition-format metric names.
//!
//! Applying [`rewrite_metrics`] twice with the same prefix prefixes names
//! twice; callers must only rewrite raw upstream bodies.

use std::sync::OnceLock;

use regex::Regex;

pub fn rewrite_metrics(body: &str, prefix: &str) -> String {
    body.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| rewrite_line(line, prefix))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rewrite_line(line: &str, prefix: &str) -> String {
    if line.starts_with("# TYPE ") || line.starts_with("# HELP ") {
        return match split_metadata(line) {
            Some((marker, directive, rest)) => format!("{marker} {directive} {prefix}_{rest}"),
            None => line.to_string(),
        };
    }
    if line.starts_with('#') {
        return line.to_string();
    }

    match metric_name_regex().find(line) {
        Some(name) => format!("{prefix}_{}{}", name.as_str(), &line[name.end()..]),
        None => line.to_string(),
    }
}

/// `# TYPE name rest...` -> (`#`, `TYPE`, `name rest...`). `None` when the
/// line has fewer than three whitespace-separated pieces.
fn split_metadata(line: &str) -> Option<(&str, &str, &str)> {
    let (marker, rest) = split_token(line)?;
    let (directive, rest) = split_token(rest)?;
    if rest.is_empty() {
        return None;
    }
    Some((marker, directive, rest))
}

fn split_token(input: &str) -> Option<(&str, &str)> {
    let end = input.find(char::is_whitespace)?;
    let (token, rest) = input.split_at(end);
    Some((token, rest.trim_start()))
}

fn metric_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_:][A-Za-z0-9_:]*").expect("metric name regex is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_type_and_help_lines() {
        assert_eq!(
            rewrite_metrics("# TYPE foo_metric counter", "ns"),
            "# TYPE ns_foo_metric counter"
        );
        assert_eq!(
            rewrite_metrics("# HELP foo_metric Total  things seen.", "ns"),
            "# HELP ns_foo_metric Total  things seen."
        );
    }

    #[test]
    fn metadata_with_runs_of_whitespace_is_rejoined_with_single_spaces() {
        assert_eq!(
            rewrite_metrics("# TYPE   foo gauge", "ns"),
            "# TYPE ns_foo gauge"
        );
    }

    #[test]
    fn malformed_metadata_passes_through() {
        assert_eq!(rewrite_metrics("# TYPE ", "ns"), "# TYPE ");
        assert_eq!(rewrite_metrics("# HELP    ", "ns"), "# HELP    ");
    }

    #[test]
    fn other_comments_pass_through() {
        assert_eq!(rewrite_metrics("# EOF", "ns"), "# EOF");
        assert_eq!(rewrite_metrics("#TYPE foo counter", "ns"), "#TYPE foo counter");
    }

    #[test]
    fn data_lines_keep_labels_value_and_timestamp() {
        assert_eq!(
            rewrite_metrics(
                "http_requests_total{method=\"get\",code=\"200\"} 1027 1395066363000",
                "ns"
            ),
            "ns_http_requests_total{method=\"get\",code=\"200\"} 1027 1395066363000"
        );
        assert_eq!(rewrite_metrics("up 1", "ns"), "ns_up 1");
        assert_eq!(rewrite_metrics(":colon:name 2", "ns"), "ns_:colon:name 2");
    }

    #[test]
    fn only_the_leading_name_is_replaced() {
        assert_eq!(
            rewrite_metrics("foo{label=\"foo\"} 1", "ns"),
            "ns_foo{label=\"foo\"} 1"
        );
    }

    #[test]
    fn lines_without_a_leading_name_pass_through() {
        assert_eq!(rewrite_metrics("  indented 1", "ns"), "  indented 1");
        assert_eq!(rewrite_metrics("9starts_with_digit 1", "ns"), "9starts_with_digit 1");
    }

    #[test]
    fn blank_lines_are_dropped() {
        let body = "# TYPE a counter\n\na 1\n   \nb 2\n";
        assert_eq!(
            rewrite_metrics(body, "ns"),
            "# TYPE ns_a counter\nns_a 1\nns_b 2"
        );
    }

    #[test]
    fn rewriting_twice_prefixes_twice() {
        let once = rewrite_metrics("# TYPE foo counter\nfoo 1", "ns");
        let twice = rewrite_metrics(&once, "ns");
        assert_eq!(twice, "# TYPE ns_ns_foo counter\nns_ns_foo 1");
        assert_eq!(rewrite_metrics("foo 1", "ns"), rewrite_metrics("foo 1", "ns"));
    }
}
