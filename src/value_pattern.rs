//! Declarative single-criterion value patterns.
//!
//! A [`ValuePattern`] is what stub files and the admin surface carry. It
//! holds at most one criterion and keeps a compiled [`PatternMatcher`] in
//! step with it: every setter recompiles before committing.

use crate::compare::JsonCompareMode;
use crate::error::ConfigurationError;
use crate::notifier::Notifier;
use crate::pattern::{PatternMatch, PatternMatcher};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Criterion {
    EqualTo(String),
    Contains(String),
    Matches(String),
    DoesNotMatch(String),
    Absent(bool),
    MatchesJsonPath(String),
    EqualToJson(String),
    EqualToXml(String),
}

impl Criterion {
    fn name(&self) -> &'static str {
        match self {
            Criterion::EqualTo(_) => "equalTo",
            Criterion::Contains(_) => "contains",
            Criterion::Matches(_) => "matches",
            Criterion::DoesNotMatch(_) => "doesNotMatch",
            Criterion::Absent(_) => "absent",
            Criterion::MatchesJsonPath(_) => "matchesJsonPaths",
            Criterion::EqualToJson(_) => "equalToJson",
            Criterion::EqualToXml(_) => "equalToXml",
        }
    }

    fn compile(&self, mode: JsonCompareMode) -> Result<PatternMatcher, ConfigurationError> {
        Ok(match self {
            Criterion::EqualTo(v) => PatternMatcher::equals(v.as_str()),
            Criterion::Contains(v) => PatternMatcher::contains(v.as_str()),
            Criterion::Matches(v) => PatternMatcher::regex(v.as_str())?,
            Criterion::DoesNotMatch(v) => PatternMatcher::regex(v.as_str())?.not(),
            Criterion::Absent(true) => PatternMatcher::None,
            Criterion::Absent(false) => PatternMatcher::Any,
            Criterion::MatchesJsonPath(v) => PatternMatcher::json_path(v.as_str()),
            Criterion::EqualToJson(v) => PatternMatcher::json_equals(v.as_str(), mode),
            Criterion::EqualToXml(v) => PatternMatcher::xml_equals(v.as_str()),
        })
    }
}

/// One declared match criterion against a single string value.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "ValuePatternFields", into = "ValuePatternFields")]
pub struct ValuePattern {
    criterion: Option<Criterion>,
    json_compare_mode: Option<JsonCompareMode>,
    matcher: PatternMatcher,
}

impl Default for ValuePattern {
    fn default() -> Self {
        Self {
            criterion: None,
            json_compare_mode: None,
            matcher: PatternMatcher::Any,
        }
    }
}

impl ValuePattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal_to(value: impl Into<String>) -> Self {
        Self::with(Criterion::EqualTo(value.into()))
    }

    pub fn containing(value: impl Into<String>) -> Self {
        Self::with(Criterion::Contains(value.into()))
    }

    pub fn matching(regex: impl Into<String>) -> Result<Self, ConfigurationError> {
        let mut pattern = Self::new();
        pattern.set_matches(regex)?;
        Ok(pattern)
    }

    pub fn not_matching(regex: impl Into<String>) -> Result<Self, ConfigurationError> {
        let mut pattern = Self::new();
        pattern.set_does_not_match(regex)?;
        Ok(pattern)
    }

    pub fn absent() -> Self {
        Self::with(Criterion::Absent(true))
    }

    pub fn matching_json_path(expression: impl Into<String>) -> Self {
        Self::with(Criterion::MatchesJsonPath(expression.into()))
    }

    pub fn equal_to_json(json: impl Into<String>) -> Self {
        Self::with(Criterion::EqualToJson(json.into()))
    }

    pub fn equal_to_xml(xml: impl Into<String>) -> Self {
        Self::with(Criterion::EqualToXml(xml.into()))
    }

    // Only for criteria whose compilation cannot fail.
    fn with(criterion: Criterion) -> Self {
        let mut pattern = Self::new();
        pattern.matcher = criterion
            .compile(JsonCompareMode::default())
            .unwrap_or(PatternMatcher::None);
        pattern.criterion = Some(criterion);
        pattern
    }

    pub fn set_equal_to(&mut self, value: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::EqualTo(value.into()))
    }

    pub fn set_contains(&mut self, value: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::Contains(value.into()))
    }

    pub fn set_matches(&mut self, regex: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::Matches(regex.into()))
    }

    pub fn set_does_not_match(&mut self, regex: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::DoesNotMatch(regex.into()))
    }

    pub fn set_absent(&mut self, absent: bool) -> Result<(), ConfigurationError> {
        self.set(Criterion::Absent(absent))
    }

    pub fn set_matches_json_path(&mut self, expression: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::MatchesJsonPath(expression.into()))
    }

    pub fn set_equal_to_json(&mut self, json: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::EqualToJson(json.into()))
    }

    pub fn set_equal_to_xml(&mut self, xml: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set(Criterion::EqualToXml(xml.into()))
    }

    /// Comparison mode for `equalToJson`. Not a criterion on its own.
    pub fn set_json_compare_mode(&mut self, mode: JsonCompareMode) -> Result<(), ConfigurationError> {
        let matcher = match &self.criterion {
            Some(criterion) => criterion.compile(mode)?,
            None => PatternMatcher::Any,
        };
        self.json_compare_mode = Some(mode);
        self.matcher = matcher;
        Ok(())
    }

    pub fn json_compare_mode(&self) -> JsonCompareMode {
        self.json_compare_mode.unwrap_or_default()
    }

    fn set(&mut self, criterion: Criterion) -> Result<(), ConfigurationError> {
        if let Some(existing) = &self.criterion {
            if existing.name() != criterion.name() {
                return Err(ConfigurationError::MultipleMatchTypes {
                    existing: existing.name(),
                    attempted: criterion.name(),
                });
            }
        }
        self.matcher = criterion.compile(self.json_compare_mode())?;
        self.criterion = Some(criterion);
        Ok(())
    }

    pub fn has_criterion(&self) -> bool {
        self.criterion.is_some()
    }

    /// True when this pattern only ever asks whether a value is present.
    pub fn is_absent(&self) -> bool {
        matches!(self.criterion, Some(Criterion::Absent(true)))
    }

    /// The compiled matcher for the current criterion.
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn is_match_for(
        &self,
        value: Option<&str>,
        notifier: &dyn Notifier,
    ) -> Result<PatternMatch, ConfigurationError> {
        if self.criterion.is_none() {
            return Err(ConfigurationError::NoMatchType);
        }
        Ok(self.matcher.matches(value, notifier))
    }
}

impl PartialEq for ValuePattern {
    fn eq(&self, other: &Self) -> bool {
        self.criterion == other.criterion && self.json_compare_mode == other.json_compare_mode
    }
}

impl fmt::Display for ValuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.matcher, f)
    }
}

impl fmt::Debug for ValuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuePattern")
            .field("criterion", &self.criterion)
            .field("json_compare_mode", &self.json_compare_mode)
            .finish()
    }
}

/// Wire form of a [`ValuePattern`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValuePatternFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equal_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    matches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    does_not_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    absent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    matches_json_paths: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equal_to_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    json_compare_mode: Option<JsonCompareMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equal_to_xml: Option<String>,
}

impl TryFrom<ValuePatternFields> for ValuePattern {
    type Error = ConfigurationError;

    fn try_from(fields: ValuePatternFields) -> Result<Self, Self::Error> {
        let mut pattern = ValuePattern::new();
        if let Some(mode) = fields.json_compare_mode {
            pattern.set_json_compare_mode(mode)?;
        }
        if let Some(v) = fields.equal_to {
            pattern.set_equal_to(v)?;
        }
        if let Some(v) = fields.contains {
            pattern.set_contains(v)?;
        }
        if let Some(v) = fields.matches {
            pattern.set_matches(v)?;
        }
        if let Some(v) = fields.does_not_match {
            pattern.set_does_not_match(v)?;
        }
        if let Some(v) = fields.absent {
            pattern.set_absent(v)?;
        }
        if let Some(v) = fields.matches_json_paths {
            pattern.set_matches_json_path(v)?;
        }
        if let Some(v) = fields.equal_to_json {
            pattern.set_equal_to_json(v)?;
        }
        if let Some(v) = fields.equal_to_xml {
            pattern.set_equal_to_xml(v)?;
        }
        Ok(pattern)
    }
}

impl From<ValuePattern> for ValuePatternFields {
    fn from(pattern: ValuePattern) -> Self {
        let mut fields = ValuePatternFields {
            json_compare_mode: pattern.json_compare_mode,
            ..Default::default()
        };
        match pattern.criterion {
            Some(Criterion::EqualTo(v)) => fields.equal_to = Some(v),
            Some(Criterion::Contains(v)) => fields.contains = Some(v),
            Some(Criterion::Matches(v)) => fields.matches = Some(v),
            Some(Criterion::DoesNotMatch(v)) => fields.does_not_match = Some(v),
            Some(Criterion::Absent(v)) => fields.absent = Some(v),
            Some(Criterion::MatchesJsonPath(v)) => fields.matches_json_paths = Some(v),
            Some(Criterion::EqualToJson(v)) => fields.equal_to_json = Some(v),
            Some(Criterion::EqualToXml(v)) => fields.equal_to_xml = Some(v),
            None => {}
        }
        fields
    }
}
