//! Request matching logic.
//!
//! A [`RequestPattern`] is the declared shape of a request. Every setter
//! recompiles it into a [`RequestMatcher`]: one facet matcher per concern,
//! joined by a short-circuiting AND in the fixed order URL, method,
//! headers, parameters, body.

use crate::error::ConfigurationError;
use crate::http::{Request, RequestMethod};
use crate::notifier::Notifier;
use crate::pattern::{PatternMatch, PatternMatcher};
use crate::value_pattern::ValuePattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Compiled request predicate.
#[derive(Debug, Clone)]
pub enum RequestMatcher {
    Url(PatternMatcher),
    Method(RequestMethod),
    Headers(BTreeMap<String, ValuePattern>),
    Parameters(BTreeMap<String, ValuePattern>),
    Body(Vec<ValuePattern>),
    And(Vec<RequestMatcher>),
}

impl RequestMatcher {
    pub fn matches(&self, request: &dyn Request, notifier: &dyn Notifier) -> PatternMatch {
        match self {
            RequestMatcher::Url(pattern) => {
                let result = pattern.matches(Some(request.url()), notifier);
                if !result.matched {
                    notifier.info(&format!(
                        "URL {} does not match. For a match, URL should {}",
                        request.url(),
                        pattern
                    ));
                }
                result
            }
            RequestMatcher::Method(method) => {
                let matched = *method == RequestMethod::Any || *method == request.method();
                if !matched {
                    notifier.info(&format!(
                        "URL {} is match, but method {} is not",
                        request.url(),
                        request.method()
                    ));
                }
                PatternMatch::from_bool(matched)
            }
            RequestMatcher::Headers(headers) => {
                for (name, pattern) in headers {
                    let result = request.header(name).has_value_matching(pattern, notifier);
                    if !matched_or_report(result, notifier) {
                        notifier.info(&format!(
                            "URL {} is match, but header {} is not. For a match, value should {}",
                            request.url(),
                            name,
                            pattern
                        ));
                        return PatternMatch::not_matched();
                    }
                }
                // Groups captured from header values are not carried forward.
                PatternMatch::matched()
            }
            RequestMatcher::Parameters(parameters) => {
                for (name, pattern) in parameters {
                    let result = request.parameter(name).has_value_matching(pattern, notifier);
                    if !matched_or_report(result, notifier) {
                        notifier.info(&format!(
                            "Parameter {} does not match. For a match, value should {}",
                            name, pattern
                        ));
                        return PatternMatch::not_matched();
                    }
                }
                PatternMatch::matched()
            }
            RequestMatcher::Body(patterns) => {
                let mut accumulated = PatternMatch::matched();
                for pattern in patterns {
                    let result = body_match(pattern, request, notifier);
                    if !result.matched {
                        notifier.info(&format!("Body does not match: {}", pattern));
                        return PatternMatch::not_matched();
                    }
                    accumulated = accumulated.and_then(|| result);
                }
                accumulated
            }
            RequestMatcher::And(facets) => {
                let mut accumulated = PatternMatch::matched();
                for facet in facets {
                    accumulated = accumulated.and_then(|| facet.matches(request, notifier));
                    if !accumulated.matched {
                        break;
                    }
                }
                accumulated
            }
        }
    }
}

// Constant patterns never look at the body, so skip materializing it.
fn body_match(pattern: &ValuePattern, request: &dyn Request, notifier: &dyn Notifier) -> PatternMatch {
    let result = if pattern.matcher().is_constant() {
        pattern.is_match_for(Some(""), notifier)
    } else {
        pattern.is_match_for(Some(request.body_as_string()), notifier)
    };
    match result {
        Ok(result) => result,
        Err(e) => {
            notifier.info(&e.to_string());
            PatternMatch::not_matched()
        }
    }
}

fn matched_or_report(
    result: Result<PatternMatch, ConfigurationError>,
    notifier: &dyn Notifier,
) -> bool {
    match result {
        Ok(result) => result.matched,
        Err(e) => {
            notifier.info(&e.to_string());
            false
        }
    }
}

/// Declared match facets, as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestPatternFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<RequestMethod>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, ValuePattern>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, ValuePattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    body_patterns: Vec<ValuePattern>,
}

impl RequestPatternFields {
    fn compile(&self) -> Result<RequestMatcher, ConfigurationError> {
        let url = match (&self.url, &self.url_pattern) {
            (Some(_), Some(_)) => return Err(ConfigurationError::UrlAndUrlPattern),
            (Some(url), None) => PatternMatcher::equals(url.as_str()),
            (None, Some(pattern)) => PatternMatcher::regex(pattern.as_str())?,
            (None, None) => PatternMatcher::Any,
        };

        let all_patterns = self
            .headers
            .values()
            .chain(self.parameters.values())
            .chain(self.body_patterns.iter());
        for pattern in all_patterns {
            if !pattern.has_criterion() {
                return Err(ConfigurationError::NoMatchType);
            }
        }

        Ok(RequestMatcher::And(vec![
            RequestMatcher::Url(url),
            RequestMatcher::Method(self.method.unwrap_or(RequestMethod::Any)),
            RequestMatcher::Headers(self.headers.clone()),
            RequestMatcher::Parameters(self.parameters.clone()),
            RequestMatcher::Body(self.body_patterns.clone()),
        ]))
    }
}

/// Declarative description of the requests a stub applies to.
///
/// Always usable: the compiled matcher is rebuilt by every setter, and a
/// setter that would leave the pattern invalid changes nothing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RequestPatternFields", into = "RequestPatternFields")]
pub struct RequestPattern {
    fields: RequestPatternFields,
    matcher: RequestMatcher,
}

impl Default for RequestPattern {
    fn default() -> Self {
        Self::everything()
    }
}

impl RequestPattern {
    /// Matches every request.
    pub fn everything() -> Self {
        let fields = RequestPatternFields::default();
        let matcher = RequestMatcher::And(vec![
            RequestMatcher::Url(PatternMatcher::Any),
            RequestMatcher::Method(RequestMethod::Any),
        ]);
        Self { fields, matcher }
    }

    /// Exact URL and method.
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            matcher: RequestMatcher::And(vec![
                RequestMatcher::Url(PatternMatcher::equals(url.as_str())),
                RequestMatcher::Method(method),
            ]),
            fields: RequestPatternFields {
                url: Some(url),
                method: Some(method),
                ..Default::default()
            },
        }
    }

    /// URL regex and method.
    pub fn url_matching(
        method: RequestMethod,
        url_pattern: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut pattern = Self::everything();
        pattern.set_method(method)?;
        pattern.set_url_pattern(url_pattern)?;
        Ok(pattern)
    }

    fn update(
        &mut self,
        apply: impl FnOnce(&mut RequestPatternFields),
    ) -> Result<(), ConfigurationError> {
        let mut fields = self.fields.clone();
        apply(&mut fields);
        self.matcher = fields.compile()?;
        self.fields = fields;
        Ok(())
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> Result<(), ConfigurationError> {
        let url = url.into();
        self.update(|f| f.url = Some(url))
    }

    pub fn set_url_pattern(&mut self, pattern: impl Into<String>) -> Result<(), ConfigurationError> {
        let pattern = pattern.into();
        self.update(|f| f.url_pattern = Some(pattern))
    }

    pub fn set_method(&mut self, method: RequestMethod) -> Result<(), ConfigurationError> {
        self.update(|f| f.method = Some(method))
    }

    pub fn add_header(
        &mut self,
        name: impl Into<String>,
        pattern: ValuePattern,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        self.update(|f| {
            f.headers.insert(name, pattern);
        })
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        pattern: ValuePattern,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        self.update(|f| {
            f.parameters.insert(name, pattern);
        })
    }

    pub fn add_body_pattern(&mut self, pattern: ValuePattern) -> Result<(), ConfigurationError> {
        self.update(|f| f.body_patterns.push(pattern))
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        pattern: ValuePattern,
    ) -> Result<Self, ConfigurationError> {
        self.add_header(name, pattern)?;
        Ok(self)
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        pattern: ValuePattern,
    ) -> Result<Self, ConfigurationError> {
        self.add_parameter(name, pattern)?;
        Ok(self)
    }

    pub fn with_body_pattern(mut self, pattern: ValuePattern) -> Result<Self, ConfigurationError> {
        self.add_body_pattern(pattern)?;
        Ok(self)
    }

    pub fn url(&self) -> Option<&str> {
        self.fields.url.as_deref()
    }

    pub fn url_pattern(&self) -> Option<&str> {
        self.fields.url_pattern.as_deref()
    }

    pub fn method(&self) -> RequestMethod {
        self.fields.method.unwrap_or(RequestMethod::Any)
    }

    pub fn is_matched_by(&self, request: &dyn Request, notifier: &dyn Notifier) -> PatternMatch {
        self.matcher.matches(request, notifier)
    }
}

impl TryFrom<RequestPatternFields> for RequestPattern {
    type Error = ConfigurationError;

    fn try_from(fields: RequestPatternFields) -> Result<Self, Self::Error> {
        let matcher = fields.compile()?;
        Ok(Self { fields, matcher })
    }
}

impl From<RequestPattern> for RequestPatternFields {
    fn from(pattern: RequestPattern) -> Self {
        pattern.fields
    }
}

impl PartialEq for RequestPattern {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Debug for RequestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPattern")
            .field("url", &self.fields.url)
            .field("url_pattern", &self.fields.url_pattern)
            .field("method", &self.method())
            .field("headers", &self.fields.headers)
            .field("parameters", &self.fields.parameters)
            .field("body_patterns", &self.fields.body_patterns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpRequest;
    use crate::notifier::CollectingNotifier;

    fn make_pattern(url: &str) -> RequestPattern {
        RequestPattern::new(RequestMethod::Get, url)
    }

    #[test]
    fn test_exact_url_matching() {
        let notifier = CollectingNotifier::default();
        let pattern = make_pattern("/api/users");
        assert!(pattern.is_matched_by(&HttpRequest::get("/api/users"), &notifier).matched);
        assert!(!pattern.is_matched_by(&HttpRequest::get("/api/posts"), &notifier).matched);
        assert_eq!(
            notifier.messages(),
            vec!["URL /api/posts does not match. For a match, URL should equal /api/users"]
        );
    }

    #[test]
    fn test_url_pattern_captures_groups() {
        let notifier = CollectingNotifier::default();
        let pattern = RequestPattern::url_matching(RequestMethod::Get, "/users/([0-9]+)").unwrap();
        let result = pattern.is_matched_by(&HttpRequest::get("/users/123"), &notifier);
        assert!(result.matched);
        assert_eq!(result.groups, vec!["123"]);
        assert!(!pattern.is_matched_by(&HttpRequest::get("/users/abc"), &notifier).matched);
        assert_eq!(
            notifier.messages(),
            vec!["URL /users/abc does not match. For a match, URL should matches /users/([0-9]+)"]
        );
    }

    #[test]
    fn test_url_and_url_pattern_are_exclusive() {
        let mut pattern = make_pattern("/a");
        assert_eq!(
            pattern.set_url_pattern("/.*").unwrap_err(),
            ConfigurationError::UrlAndUrlPattern
        );
        // Unchanged after the rejected update.
        assert_eq!(pattern.url(), Some("/a"));
        assert_eq!(pattern.url_pattern(), None);

        let result: Result<RequestPattern, _> =
            serde_json::from_str(r#"{"url": "/a", "urlPattern": "/.*"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_method_matching() {
        let notifier = CollectingNotifier::default();
        let pattern = RequestPattern::new(RequestMethod::Post, "/api/users");
        assert!(pattern.is_matched_by(&HttpRequest::post("/api/users"), &notifier).matched);
        assert!(!pattern.is_matched_by(&HttpRequest::get("/api/users"), &notifier).matched);
        assert_eq!(
            notifier.messages(),
            vec!["URL /api/users is match, but method GET is not"]
        );

        let any = RequestPattern::new(RequestMethod::Any, "/api/users");
        assert!(any.is_matched_by(&HttpRequest::get("/api/users"), &notifier).matched);
    }

    #[test]
    fn test_header_matching() {
        let notifier = CollectingNotifier::default();
        let pattern = make_pattern("/api/users")
            .with_header("Authorization", ValuePattern::containing("Bearer"))
            .unwrap();

        let request = HttpRequest::get("/api/users").with_header("authorization", "Bearer token");
        assert!(pattern.is_matched_by(&request, &notifier).matched);

        assert!(!pattern.is_matched_by(&HttpRequest::get("/api/users"), &notifier).matched);
        assert_eq!(
            notifier.messages(),
            vec!["URL /api/users is match, but header Authorization is not. For a match, value should contains Bearer"]
        );
    }

    #[test]
    fn test_absent_header() {
        let notifier = CollectingNotifier::default();
        let pattern = make_pattern("/a")
            .with_header("X-Debug", ValuePattern::absent())
            .unwrap();
        assert!(pattern.is_matched_by(&HttpRequest::get("/a"), &notifier).matched);
        let with_header = HttpRequest::get("/a").with_header("X-Debug", "1");
        assert!(!pattern.is_matched_by(&with_header, &notifier).matched);
    }

    #[test]
    fn test_header_and_parameter_groups_are_not_propagated() {
        let notifier = CollectingNotifier::default();
        let pattern = RequestPattern::url_matching(RequestMethod::Get, "/items/([a-z]+).*")
            .unwrap()
            .with_header("X-Id", ValuePattern::matching("id-([0-9]+)").unwrap())
            .unwrap()
            .with_parameter("page", ValuePattern::matching("([0-9]+)").unwrap())
            .unwrap();
        let request = HttpRequest::get("/items/books?page=4").with_header("X-Id", "id-77");
        let result = pattern.is_matched_by(&request, &notifier);
        assert!(result.matched);
        assert_eq!(result.groups, vec!["books"]);
    }

    #[test]
    fn test_parameter_matching() {
        let notifier = CollectingNotifier::default();
        let pattern = make_pattern("/api/users?page=1")
            .with_parameter("page", ValuePattern::equal_to("1"))
            .unwrap();
        assert!(pattern.is_matched_by(&HttpRequest::get("/api/users?page=1"), &notifier).matched);

        let pattern = RequestPattern::url_matching(RequestMethod::Get, "/api/users.*")
            .unwrap()
            .with_parameter("page", ValuePattern::equal_to("1"))
            .unwrap();
        assert!(!pattern.is_matched_by(&HttpRequest::get("/api/users?page=2"), &notifier).matched);
        assert_eq!(
            notifier.messages(),
            vec!["Parameter page does not match. For a match, value should equal 1"]
        );
    }

    #[test]
    fn test_body_patterns_accumulate_groups() {
        let notifier = CollectingNotifier::default();
        let pattern = RequestPattern::new(RequestMethod::Post, "/orders")
            .with_body_pattern(ValuePattern::matching_json_path("$.id"))
            .unwrap()
            .with_body_pattern(ValuePattern::matching(".*\"qty\": ([0-9]+).*").unwrap())
            .unwrap();
        let request = HttpRequest::post("/orders").with_body(r#"{"id": "o-1", "qty": 3}"#);
        let result = pattern.is_matched_by(&request, &notifier);
        assert!(result.matched);
        assert_eq!(result.groups, vec!["o-1", "3"]);

        let request = HttpRequest::post("/orders").with_body(r#"{"qty": 3}"#);
        assert!(!pattern.is_matched_by(&request, &notifier).matched);
        assert!(notifier
            .messages()
            .iter()
            .any(|m| m == "Body does not match: matches JSON path $.id"));
    }

    #[test]
    fn test_first_failing_facet_stops_evaluation() {
        let notifier = CollectingNotifier::default();
        let pattern = RequestPattern::new(RequestMethod::Post, "/a")
            .with_body_pattern(ValuePattern::matching_json_path("$.x"))
            .unwrap();
        let request = HttpRequest::get("/a").with_body("not json");
        assert!(!pattern.is_matched_by(&request, &notifier).matched);
        assert_eq!(notifier.messages(), vec!["URL /a is match, but method GET is not"]);
    }

    #[test]
    fn test_patterns_without_criterion_are_rejected() {
        let mut pattern = make_pattern("/a");
        assert_eq!(
            pattern.add_header("X", ValuePattern::new()).unwrap_err(),
            ConfigurationError::NoMatchType
        );
        assert!(pattern.is_matched_by(&HttpRequest::get("/a"), &CollectingNotifier::default()).matched);
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "urlPattern": "/users/.*",
            "method": "GET",
            "headers": {"Accept": {"contains": "json"}},
            "parameters": {"q": {"absent": true}},
            "bodyPatterns": [{"equalTo": ""}]
        }"#;
        let pattern: RequestPattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.url_pattern(), Some("/users/.*"));
        assert_eq!(pattern.method(), RequestMethod::Get);

        let request = HttpRequest::get("/users/1").with_header("Accept", "application/json");
        assert!(pattern.is_matched_by(&request, &CollectingNotifier::default()).matched);

        let back: RequestPattern =
            serde_json::from_value(serde_json::to_value(&pattern).unwrap()).unwrap();
        assert_eq!(back, pattern);
    }
}
