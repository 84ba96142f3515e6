//! Content-switching policy rule evaluation.
//!
//! Device policies carry rule expressions in a vendor mini-language, e.g.
//!
//! ```text
//! HTTP.REQ.HOSTNAME.EQ("shop.example.com") && HTTP.REQ.URL.PATH.STARTSWITH("/images")
//! ```
//!
//! Evaluation decides whether a candidate URL would be switched by a policy.
//! The expression is first normalized (legacy syntax translated, quoting
//! rewritten into bracket delimiters, decorations stripped), then evaluated
//! by a recursive scan that tracks parenthesis depth so operators inside
//! nested groups are not split on. Combination is left-to-right and does not
//! short-circuit.
//!
//! Supported leaf predicates: `hostname.eq`, `hostname.ne`,
//! `hostname.contains`, `url.startswith`, `url.contains`. Unsupported tests
//! evaluate to false; a rule that cannot be parsed at all counts as no match
//! rather than an error, so one malformed policy never aborts a resolution.

use tracing::{debug, trace};

use crate::lookup::{LookupError, LookupResult};

/// Host and path components of a candidate URL, lowercased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    /// Hostname part of the URL
    pub hostname: String,

    /// Path part of the URL; empty when the URL has no path segment after
    /// the host (never absent)
    pub path: String,
}

impl RequestUrl {
    /// Decompose a URL. The scheme is dropped, the first segment becomes the
    /// hostname, and the remainder becomes the path. A URL whose last
    /// segment is empty (trailing slash) evaluates with an empty path;
    /// policies in the field were authored against that behavior.
    pub fn parse(url: &str) -> Self {
        let url = url.to_lowercase();
        let bare = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(&url);
        let parts: Vec<&str> = bare.split('/').collect();
        let hostname = parts[0].to_string();
        let path = match parts.last() {
            Some(last) if parts.len() > 1 && !last.is_empty() => {
                format!("/{}", parts[1..].join("/"))
            }
            _ => String::new(),
        };
        Self { hostname, path }
    }
}

/// Translate the legacy classic syntax into the advanced one
fn convert_classic(rule: &str) -> String {
    rule.replace("req.http.url == '", "http.req.url.startswith(\"")
        .replace("*'", "\")")
}

/// Normalize a rule for evaluation: lowercase, translate classic syntax,
/// replace quote-parentheses with brackets, strip spaces and decorations.
pub fn normalize(rule: &str) -> String {
    let mut rule = rule.to_lowercase();
    if rule.contains("req.http") {
        trace!("classic policy expression detected, converting to advanced: {rule}");
        rule = convert_classic(&rule);
    }
    rule.replace("(\"", "[")
        .replace("\")", "]")
        .replace(' ', "")
        // url.path and plain url clauses evaluate identically here
        .replace("url.path", "url")
        // get(1) and set_text_mode(ignorecase) are no-ops after lowercasing
        .replace("get(1).", "")
        .replace("set_text_mode(ignorecase).", "")
}

/// Evaluate a single normalized predicate such as `http.req.hostname.eq[x]`
fn eval_predicate(expr: &str, req: &RequestUrl) -> LookupResult<bool> {
    let expr = expr.replace(']', "");
    let (head, value) = expr
        .split_once('[')
        .ok_or_else(|| LookupError::ParseError(format!("malformed predicate '{expr}'")))?;
    let mut fields = head.split('.').skip(2);
    let element = fields
        .next()
        .ok_or_else(|| LookupError::ParseError(format!("malformed predicate '{expr}'")))?;
    let test = fields
        .next()
        .ok_or_else(|| LookupError::ParseError(format!("malformed predicate '{expr}'")))?;
    trace!("test: {element} {test} {value}");

    let result = if element == "hostname" {
        match test {
            "eq" => req.hostname == value,
            "ne" => req.hostname != value,
            "contains" => req.hostname.contains(value),
            _ => {
                debug!("test not supported: {test}");
                false
            }
        }
    } else {
        match test {
            "startswith" => req.path.starts_with(value),
            "contains" => req.path.contains(value),
            _ => {
                debug!("test not supported: {test}");
                false
            }
        }
    };
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    And,
    Or,
}

impl Operator {
    fn combine(self, left: bool, right: bool) -> bool {
        match self {
            Operator::And => left && right,
            Operator::Or => left || right,
        }
    }
}

/// Evaluate a normalized compound expression.
///
/// Scans character by character, accumulating the current sub-expression and
/// tracking parenthesis depth. A top-level operator flushes the accumulated
/// left side; a doubled operator character selects AND/OR for the next
/// combination. Parenthesized groups recurse and evaluate as a unit.
fn eval_compound(rule: &str, req: &RequestUrl) -> LookupResult<bool> {
    trace!("expression: \"{rule}\"");
    let mut expression = String::new();
    let mut previous_char = '\0';
    let mut previous = false;
    let mut operator = Operator::Or;
    let mut depth = 0i32;
    let mut result = false;

    for c in rule.chars() {
        match c {
            '(' => {
                depth += 1;
                if !expression.is_empty() {
                    expression.push(c);
                }
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    trace!("closing top-level group: \"{expression}\"");
                    let group = eval_compound(&expression, req)?;
                    result = operator.combine(previous, group);
                    previous = result;
                    expression.clear();
                } else {
                    expression.push(c);
                }
            }
            '|' | '&' if depth == 0 && previous_char == c => {
                operator = if c == '|' { Operator::Or } else { Operator::And };
            }
            '|' | '&' if depth == 0 => {
                if !expression.is_empty() {
                    trace!("completing expression: \"{expression}\"");
                    let sub = eval_compound(&expression, req)?;
                    result = operator.combine(previous, sub);
                    previous = result;
                    expression.clear();
                }
            }
            _ => expression.push(c),
        }
        previous_char = c;
    }

    if !expression.is_empty() {
        trace!("completing expression: \"{expression}\", operator: {operator:?}");
        result = operator.combine(previous, eval_predicate(&expression, req)?);
    }
    trace!("returning result: {result}");
    Ok(result)
}

/// Decide whether a policy rule matches a URL.
///
/// Any evaluation failure counts as no match: a malformed rule must not
/// abort the resolution of the remaining policies.
pub fn policy_match(url: &str, rule: &str) -> bool {
    let req = RequestUrl::parse(url);
    let rule = normalize(rule);
    trace!(
        "hostname: '{}', path: '{}', rule: '{}'",
        req.hostname,
        req.path,
        rule
    );
    match eval_compound(&rule, &req) {
        Ok(result) => {
            trace!("expression evaluated to {result}");
            result
        }
        Err(e) => {
            trace!("error evaluating policy expression '{rule}': {e}; treating as no match");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn req(hostname: &str, path: &str) -> RequestUrl {
        RequestUrl {
            hostname: hostname.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_request_url_parse() {
        assert_eq!(
            RequestUrl::parse("https://Shop.Example.COM/Images/logo.png"),
            req("shop.example.com", "/images/logo.png")
        );
        assert_eq!(
            RequestUrl::parse("http://shop.example.com"),
            req("shop.example.com", "")
        );
        // no path segment after the host: empty path, never null
        assert_eq!(
            RequestUrl::parse("https://shop.example.com/"),
            req("shop.example.com", "")
        );
        // trailing slash also yields an empty path
        assert_eq!(
            RequestUrl::parse("https://shop.example.com/images/"),
            req("shop.example.com", "")
        );
    }

    #[test]
    fn test_normalize_advanced() {
        assert_eq!(
            normalize("HTTP.REQ.HOSTNAME.EQ(\"shop.example.com\")"),
            "http.req.hostname.eq[shop.example.com]"
        );
        assert_eq!(
            normalize("http.req.url.path.set_text_mode(ignorecase).startswith(\"/images\")"),
            "http.req.url.startswith[/images]"
        );
        assert_eq!(
            normalize("http.req.url.path.get(1).eq(\"images\")"),
            "http.req.url.eq[images]"
        );
    }

    #[test]
    fn test_normalize_classic() {
        assert_eq!(
            normalize("REQ.HTTP.URL == '/images*'"),
            "http.req.url.startswith[/images]"
        );
    }

    #[test]
    fn test_hostname_predicates() {
        let r = req("shop.example.com", "/images");
        assert!(eval_predicate("http.req.hostname.eq[shop.example.com]", &r).unwrap());
        assert!(!eval_predicate("http.req.hostname.eq[other.example.com]", &r).unwrap());
        assert!(eval_predicate("http.req.hostname.ne[other.example.com]", &r).unwrap());
        assert!(eval_predicate("http.req.hostname.contains[example]", &r).unwrap());
        assert!(!eval_predicate("http.req.hostname.contains[nothere]", &r).unwrap());
    }

    #[test]
    fn test_path_predicates() {
        let r = req("shop.example.com", "/images/logo.png");
        assert!(eval_predicate("http.req.url.startswith[/images]", &r).unwrap());
        assert!(!eval_predicate("http.req.url.startswith[/api]", &r).unwrap());
        assert!(eval_predicate("http.req.url.contains[logo]", &r).unwrap());
    }

    #[test]
    fn test_unsupported_test_is_false() {
        let r = req("shop.example.com", "/images");
        assert!(!eval_predicate("http.req.hostname.regex[x]", &r).unwrap());
        assert!(!eval_predicate("http.req.url.endswith[x]", &r).unwrap());
    }

    #[test]
    fn test_empty_path_predicates() {
        let r = req("shop.example.com", "");
        assert!(!eval_predicate("http.req.url.startswith[/images]", &r).unwrap());
        assert!(!eval_predicate("http.req.url.contains[images]", &r).unwrap());
    }

    #[test]
    fn test_flat_compounds_match_reference() {
        // hostname.eq true, url.startswith false for this request
        let url = "https://shop.example.com/api/v1";
        let t = "http.req.hostname.eq(\"shop.example.com\")";
        let f = "http.req.url.startswith(\"/images\")";

        for (rule, expected) in [
            (format!("{t} && {f}"), true && false),
            (format!("{t} || {f}"), true || false),
            (format!("{f} || {f}"), false),
            (format!("{t} && {t}"), true),
            (format!("{f} || {t} && {f}"), (false || true) && false),
        ] {
            assert_eq!(
                policy_match(url, &rule),
                expected,
                "rule {rule} should be {expected}"
            );
        }
    }

    #[test]
    fn test_parentheses_bind_first() {
        // A false, B false, C true: A && (B || C) = false, (A && B) || C = true
        let url = "https://shop.example.com/api/v1";
        let a = "http.req.hostname.eq(\"other.example.com\")";
        let b = "http.req.url.startswith(\"/images\")";
        let c = "http.req.url.startswith(\"/api\")";

        assert!(!policy_match(url, &format!("{a} && ({b} || {c})")));
        assert!(policy_match(url, &format!("({a} && {b}) || {c}")));
    }

    #[test]
    fn test_nested_groups() {
        // true && (false || (true && true))
        let url = "https://shop.example.com/api/v1";
        let rule = "http.req.hostname.contains(\"example\") && \
                    (http.req.url.startswith(\"/images\") || \
                    (http.req.url.startswith(\"/api\") && http.req.hostname.ne(\"x\")))";
        assert!(policy_match(url, rule));
    }

    #[test]
    fn test_classic_rule_end_to_end() {
        assert!(policy_match(
            "https://shop.example.com/images/logo.png",
            "REQ.HTTP.URL == '/images*'"
        ));
        assert!(!policy_match(
            "https://shop.example.com/api/v1",
            "REQ.HTTP.URL == '/images*'"
        ));
    }

    #[test]
    fn test_malformed_rule_is_no_match() {
        let url = "https://shop.example.com/images";
        assert!(!policy_match(url, "http.req.hostname.eq"));
        assert!(!policy_match(url, "garbage"));
        assert!(!policy_match(url, ""));
        // malformed side of a compound poisons the whole rule, not the batch
        assert!(!policy_match(
            url,
            "http.req.hostname.eq(\"shop.example.com\") && garbage"
        ));
    }

    #[test]
    fn test_case_insensitive_match() {
        assert!(policy_match(
            "https://SHOP.example.com/Images/Logo.png",
            "HTTP.REQ.URL.PATH.SET_TEXT_MODE(IGNORECASE).STARTSWITH(\"/IMAGES\")"
        ));
    }
}
