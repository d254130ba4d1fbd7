//! String pattern matching algebra.
//!
//! A [`PatternMatcher`] is a small immutable expression tree evaluated
//! against a single optional string value. Leaves test the value directly,
//! `And`/`Or`/`Not` combine other matchers. Every evaluation yields a
//! [`PatternMatch`] carrying the captured groups later used for response
//! templating.

use crate::compare::{json_equals, parse_xml, JsonCompareMode};
use crate::error::ConfigurationError;
use crate::notifier::Notifier;
use jsonpath_rust::JsonPath;
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Outcome of evaluating a matcher against a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternMatch {
    pub matched: bool,
    pub groups: Vec<String>,
}

impl PatternMatch {
    pub fn matched() -> Self {
        Self {
            matched: true,
            groups: Vec::new(),
        }
    }

    pub fn not_matched() -> Self {
        Self::default()
    }

    pub fn with_groups(groups: Vec<String>) -> Self {
        Self {
            matched: true,
            groups,
        }
    }

    pub fn from_bool(matched: bool) -> Self {
        Self {
            matched,
            groups: Vec::new(),
        }
    }

    /// Conjunction. `other` is only evaluated when `self` matched.
    pub fn and_then(self, other: impl FnOnce() -> PatternMatch) -> PatternMatch {
        if !self.matched {
            return PatternMatch::not_matched();
        }
        let right = other();
        if !right.matched {
            return PatternMatch::not_matched();
        }
        let mut groups = self.groups;
        groups.extend(right.groups);
        PatternMatch::with_groups(groups)
    }

    /// Disjunction. `other` is only evaluated when `self` did not match.
    pub fn or_else(self, other: impl FnOnce() -> PatternMatch) -> PatternMatch {
        if self.matched {
            return self;
        }
        let right = other();
        if right.matched {
            right
        } else {
            PatternMatch::not_matched()
        }
    }

    /// Negation. Groups never survive.
    pub fn negate(self) -> PatternMatch {
        PatternMatch::from_bool(!self.matched)
    }
}

/// Predicate over a single optional string value.
#[derive(Clone)]
pub enum PatternMatcher {
    /// Matches everything, including an absent value.
    Any,
    /// Matches only an absent value.
    None,
    Equals(String),
    Contains(String),
    Regex { pattern: String, compiled: Regex },
    JsonPath(String),
    JsonEquals {
        expected: String,
        parsed: Option<Value>,
        mode: JsonCompareMode,
    },
    XmlEquals(String),
    And(Box<PatternMatcher>, Box<PatternMatcher>),
    Or(Box<PatternMatcher>, Box<PatternMatcher>),
    Not(Box<PatternMatcher>),
}

impl PatternMatcher {
    pub fn equals(expected: impl Into<String>) -> Self {
        PatternMatcher::Equals(expected.into())
    }

    pub fn contains(expected: impl Into<String>) -> Self {
        PatternMatcher::Contains(expected.into())
    }

    /// Compile a full-match regex. `.` also matches line terminators.
    pub fn regex(pattern: impl Into<String>) -> Result<Self, ConfigurationError> {
        let pattern = pattern.into();
        let invalid = |e: regex::Error| ConfigurationError::InvalidRegex {
            pattern: pattern.clone(),
            reason: e.to_string(),
        };
        // Validate the pattern on its own first so errors point at user input.
        Regex::new(&pattern).map_err(invalid)?;
        let compiled = Regex::new(&format!("(?s)^(?:{})$", pattern)).map_err(invalid)?;
        Ok(PatternMatcher::Regex { pattern, compiled })
    }

    pub fn json_path(expression: impl Into<String>) -> Self {
        PatternMatcher::JsonPath(expression.into())
    }

    pub fn json_equals(expected: impl Into<String>, mode: JsonCompareMode) -> Self {
        let expected = expected.into();
        let parsed = serde_json::from_str(&expected).ok();
        PatternMatcher::JsonEquals {
            expected,
            parsed,
            mode,
        }
    }

    pub fn xml_equals(expected: impl Into<String>) -> Self {
        PatternMatcher::XmlEquals(expected.into())
    }

    pub fn and(self, other: PatternMatcher) -> PatternMatcher {
        match self {
            PatternMatcher::Any => other,
            PatternMatcher::None => PatternMatcher::None,
            left => PatternMatcher::And(Box::new(left), Box::new(other)),
        }
    }

    pub fn or(self, other: PatternMatcher) -> PatternMatcher {
        match self {
            PatternMatcher::Any => PatternMatcher::Any,
            PatternMatcher::None => other,
            left => PatternMatcher::Or(Box::new(left), Box::new(other)),
        }
    }

    pub fn not(self) -> PatternMatcher {
        match self {
            PatternMatcher::Any => PatternMatcher::None,
            PatternMatcher::None => PatternMatcher::Any,
            PatternMatcher::Not(inner) => *inner,
            other => PatternMatcher::Not(Box::new(other)),
        }
    }

    /// True for the two constant matchers, which never look at the value.
    pub fn is_constant(&self) -> bool {
        matches!(self, PatternMatcher::Any | PatternMatcher::None)
    }

    /// Evaluate against `value`. Diagnostics go to `notifier`; they never
    /// change the result.
    pub fn matches(&self, value: Option<&str>, notifier: &dyn Notifier) -> PatternMatch {
        match self {
            PatternMatcher::Any => PatternMatch::matched(),
            PatternMatcher::None => PatternMatch::from_bool(value.is_none()),
            PatternMatcher::Equals(expected) => {
                PatternMatch::from_bool(value == Some(expected.as_str()))
            }
            PatternMatcher::Contains(expected) => {
                PatternMatch::from_bool(value.is_some_and(|v| v.contains(expected.as_str())))
            }
            PatternMatcher::Regex { compiled, .. } => match value {
                Some(v) => regex_match(compiled, v),
                None => PatternMatch::not_matched(),
            },
            PatternMatcher::JsonPath(expression) => match value {
                Some(v) => json_path_match(expression, v, notifier),
                None => PatternMatch::not_matched(),
            },
            PatternMatcher::JsonEquals {
                expected,
                parsed,
                mode,
            } => {
                let Some(v) = value else {
                    return PatternMatch::not_matched();
                };
                let Some(expected_json) = parsed else {
                    notifier.info(&format!(
                        "Warning: expected JSON '{}' could not be parsed",
                        expected
                    ));
                    return PatternMatch::not_matched();
                };
                match serde_json::from_str::<Value>(v) {
                    Ok(actual) => PatternMatch::from_bool(json_equals(expected_json, &actual, *mode)),
                    Err(_) => {
                        notifier.info(&format!(
                            "Warning: JSON document '{}' could not be compared because it couldn't be parsed",
                            v
                        ));
                        PatternMatch::not_matched()
                    }
                }
            }
            PatternMatcher::XmlEquals(expected) => {
                let Some(v) = value else {
                    return PatternMatch::not_matched();
                };
                match (parse_xml(expected), parse_xml(v)) {
                    (Some(e), Some(a)) => PatternMatch::from_bool(e == a),
                    _ => {
                        notifier.info(&format!(
                            "Warning: XML document '{}' could not be compared with '{}' because one of them couldn't be parsed",
                            v, expected
                        ));
                        PatternMatch::not_matched()
                    }
                }
            }
            PatternMatcher::And(left, right) => left
                .matches(value, notifier)
                .and_then(|| right.matches(value, notifier)),
            PatternMatcher::Or(left, right) => left
                .matches(value, notifier)
                .or_else(|| right.matches(value, notifier)),
            PatternMatcher::Not(inner) => inner.matches(value, notifier).negate(),
        }
    }
}

fn regex_match(regex: &Regex, value: &str) -> PatternMatch {
    match regex.captures(value) {
        Some(captures) => PatternMatch::with_groups(
            captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        ),
        None => PatternMatch::not_matched(),
    }
}

fn json_path_match(expression: &str, value: &str, notifier: &dyn Notifier) -> PatternMatch {
    let fail = |reason: &str| {
        notifier.info(&format!(
            "Warning: JSON path expression '{}' failed to match document '{}' because {}",
            expression, value, reason
        ));
        PatternMatch::not_matched()
    };

    let document: Value = match serde_json::from_str(value) {
        Ok(document) => document,
        Err(_) => return fail("the JSON document couldn't be parsed"),
    };
    let path = match JsonPath::try_from(expression) {
        Ok(path) => path,
        Err(e) => return fail(&format!("of error '{}'", e)),
    };

    let results = match path.find(&document) {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };

    match results.as_slice() {
        [] => fail("the JSON path didn't match the document structure"),
        [single] => match single {
            Value::Null => PatternMatch::not_matched(),
            Value::Array(items) if items.is_empty() => PatternMatch::not_matched(),
            Value::Object(fields) if fields.is_empty() => PatternMatch::not_matched(),
            Value::Array(items) => PatternMatch::with_groups(items.iter().map(stringify).collect()),
            other => PatternMatch::with_groups(vec![stringify(other)]),
        },
        many => PatternMatch::with_groups(many.iter().map(stringify).collect()),
    }
}

// Strings are captured without their JSON quotes.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternMatcher::Any => write!(f, "any"),
            PatternMatcher::None => write!(f, "none"),
            PatternMatcher::Equals(v) => write!(f, "equal {}", v),
            PatternMatcher::Contains(v) => write!(f, "contains {}", v),
            PatternMatcher::Regex { pattern, .. } => write!(f, "matches {}", pattern),
            PatternMatcher::JsonPath(p) => write!(f, "matches JSON path {}", p),
            PatternMatcher::JsonEquals { expected, mode, .. } => {
                write!(f, "equal to JSON {} with mode {}", expected, mode)
            }
            PatternMatcher::XmlEquals(v) => write!(f, "equal to XML {}", v),
            PatternMatcher::And(a, b) => write!(f, "({} and {})", a, b),
            PatternMatcher::Or(a, b) => write!(f, "({} or {})", a, b),
            PatternMatcher::Not(a) => write!(f, "not ({})", a),
        }
    }
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatternMatcher({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::CollectingNotifier;

    fn eval(matcher: &PatternMatcher, value: &str) -> PatternMatch {
        matcher.matches(Some(value), &CollectingNotifier::default())
    }

    #[test]
    fn test_regex_capture_groups() {
        let matcher = PatternMatcher::regex("[0-9]{2}([0-9]{2})[0-9]{2}").unwrap();
        let result = eval(&matcher, "938475");
        assert!(result.matched);
        assert_eq!(result.groups, vec!["84"]);

        assert!(!eval(&matcher, "abcde").matched);
    }

    #[test]
    fn test_regex_non_capturing_group() {
        let matcher = PatternMatcher::regex("[0-9]{2}(?:[0-9]{2})[0-9]{2}").unwrap();
        let result = eval(&matcher, "938475");
        assert!(result.matched);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_regex_is_full_match_and_dot_all() {
        let matcher = PatternMatcher::regex("a.c").unwrap();
        assert!(eval(&matcher, "a\nc").matched);
        assert!(!eval(&matcher, "xabc").matched);
        assert!(!eval(&matcher, "abcx").matched);

        let alternation = PatternMatcher::regex("ab|cd").unwrap();
        assert!(!eval(&alternation, "abd").matched);
        assert!(eval(&alternation, "cd").matched);
    }

    #[test]
    fn test_invalid_regex_fails_fast() {
        let err = PatternMatcher::regex("(unclosed").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidRegex { .. }));
    }

    #[test]
    fn test_constants() {
        let n = CollectingNotifier::default();
        assert!(PatternMatcher::Any.matches(None, &n).matched);
        assert!(PatternMatcher::Any.matches(Some("x"), &n).matched);
        assert!(PatternMatcher::None.matches(None, &n).matched);
        assert!(!PatternMatcher::None.matches(Some("x"), &n).matched);
    }

    #[test]
    fn test_combinator_identities() {
        let eq = || PatternMatcher::equals("a");
        assert_eq!(PatternMatcher::Any.and(eq()).to_string(), "equal a");
        assert_eq!(PatternMatcher::None.and(eq()).to_string(), "none");
        assert_eq!(PatternMatcher::Any.or(eq()).to_string(), "any");
        assert_eq!(PatternMatcher::None.or(eq()).to_string(), "equal a");
        assert_eq!(PatternMatcher::Any.not().to_string(), "none");
        assert_eq!(PatternMatcher::None.not().to_string(), "any");
        assert_eq!(eq().not().not().to_string(), "equal a");
        assert_eq!(
            eq().and(PatternMatcher::contains("b")).to_string(),
            "(equal a and contains b)"
        );
    }

    #[test]
    fn test_and_concatenates_groups() {
        let matcher = PatternMatcher::regex("(a)(b)c")
            .unwrap()
            .and(PatternMatcher::regex("a(b)(c)").unwrap());
        let result = eval(&matcher, "abc");
        assert!(result.matched);
        assert_eq!(result.groups, vec!["a", "b", "b", "c"]);
    }

    #[test]
    fn test_or_uses_matching_side_groups() {
        let matcher = PatternMatcher::regex("x(.)")
            .unwrap()
            .or(PatternMatcher::regex("a(.)").unwrap());
        let result = eval(&matcher, "ab");
        assert!(result.matched);
        assert_eq!(result.groups, vec!["b"]);

        let result = eval(&matcher, "zz");
        assert!(!result.matched);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_not_drops_groups() {
        let matcher = PatternMatcher::regex("(a)").unwrap().not();
        let result = eval(&matcher, "b");
        assert!(result.matched);
        assert!(result.groups.is_empty());
        assert!(!eval(&matcher, "a").matched);
    }

    #[test]
    fn test_and_is_lazy() {
        let notifier = CollectingNotifier::default();
        let matcher = PatternMatcher::equals("nope").and(PatternMatcher::json_path("$.a"));
        assert!(!matcher.matches(Some("not json"), &notifier).matched);
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_json_path_array_yields_group_per_element() {
        let matcher = PatternMatcher::json_path("$.numbers");
        let result = eval(&matcher, r#"{"numbers": [1, "two", 3]}"#);
        assert!(result.matched);
        assert_eq!(result.groups, vec!["1", "two", "3"]);
    }

    #[test]
    fn test_json_path_scalar_and_filter() {
        let result = eval(&PatternMatcher::json_path("$.name"), r#"{"name": "stub"}"#);
        assert!(result.matched);
        assert_eq!(result.groups, vec!["stub"]);

        let filter = PatternMatcher::json_path("$.numbers[?(@.number == 2)]");
        let doc = r#"{"numbers": [{"number": 1}, {"number": 2}]}"#;
        assert!(eval(&filter, doc).matched);
    }

    #[test]
    fn test_json_path_empty_results_do_not_match() {
        let matcher = PatternMatcher::json_path("$.things");
        assert!(!eval(&matcher, r#"{"things": []}"#).matched);
        assert!(!eval(&matcher, r#"{"things": {}}"#).matched);
    }

    #[test]
    fn test_json_path_reports_unparsable_document() {
        let notifier = CollectingNotifier::default();
        let matcher = PatternMatcher::json_path("$.a");
        assert!(!matcher.matches(Some("{not json"), &notifier).matched);
        assert_eq!(
            notifier.messages(),
            vec!["Warning: JSON path expression '$.a' failed to match document '{not json' because the JSON document couldn't be parsed"]
        );
    }

    #[test]
    fn test_json_path_reports_unresolved_path() {
        let notifier = CollectingNotifier::default();
        let matcher = PatternMatcher::json_path("$.missing");
        assert!(!matcher.matches(Some(r#"{"a": 1}"#), &notifier).matched);
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].ends_with("because the JSON path didn't match the document structure"));
    }

    #[test]
    fn test_json_equals_modes() {
        let strict = PatternMatcher::json_equals(r#"{"x":0}"#, JsonCompareMode::NonExtensible);
        assert!(eval(&strict, r#"{"x":0.0}"#).matched);
        assert!(!eval(&strict, r#"{"x":0,"y":1}"#).matched);

        let reordered = PatternMatcher::json_equals(r#"{"x":0,"y":1}"#, JsonCompareMode::NonExtensible);
        assert!(eval(&reordered, r#"{"y":1,"x":0.0}"#).matched);

        let lenient = PatternMatcher::json_equals(r#"{"x":0}"#, JsonCompareMode::Lenient);
        assert!(eval(&lenient, r#"{"x":0,"y":1}"#).matched);
    }

    #[test]
    fn test_json_equals_unparsable_is_not_matched() {
        let notifier = CollectingNotifier::default();
        let matcher = PatternMatcher::json_equals(r#"{"x":0}"#, JsonCompareMode::Strict);
        assert!(!matcher.matches(Some("<xml/>"), &notifier).matched);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn test_xml_equals() {
        let matcher = PatternMatcher::xml_equals("<a><b>1</b></a>");
        assert!(eval(&matcher, "<a>\n  <b>1</b>\n</a>").matched);
        assert!(!eval(&matcher, "<a><b>2</b></a>").matched);
        assert!(!eval(&matcher, "garbage").matched);
    }

    #[test]
    fn test_leaves_reject_absent_value() {
        let n = CollectingNotifier::default();
        assert!(!PatternMatcher::equals("a").matches(None, &n).matched);
        assert!(!PatternMatcher::contains("a").matches(None, &n).matched);
        assert!(!PatternMatcher::regex(".*").unwrap().matches(None, &n).matched);
    }
}
