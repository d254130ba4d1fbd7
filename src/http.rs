//! In-memory HTTP request model.
//!
//! The transport layer converts wire requests into something implementing
//! [`Request`]; the matching engine and the journal only ever see this
//! trait.

use crate::error::ConfigurationError;
use crate::notifier::Notifier;
use crate::pattern::PatternMatch;
use crate::value_pattern::ValuePattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// HTTP method. `ANY` only appears in patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
    Any,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Options => "OPTIONS",
            RequestMethod::Head => "HEAD",
            RequestMethod::Trace => "TRACE",
            RequestMethod::Any => "ANY",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(RequestMethod::Get),
            "POST" => Ok(RequestMethod::Post),
            "PUT" => Ok(RequestMethod::Put),
            "DELETE" => Ok(RequestMethod::Delete),
            "PATCH" => Ok(RequestMethod::Patch),
            "OPTIONS" => Ok(RequestMethod::Options),
            "HEAD" => Ok(RequestMethod::Head),
            "TRACE" => Ok(RequestMethod::Trace),
            "ANY" => Ok(RequestMethod::Any),
            other => Err(format!("Unknown HTTP method: {}", other)),
        }
    }
}

/// A named multi-valued field: a header or a query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiValue {
    pub key: String,
    pub values: Vec<String>,
}

pub type HttpHeader = MultiValue;
pub type HttpParameter = MultiValue;

impl MultiValue {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Self::new(key, Vec::new())
    }

    pub fn is_present(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Match any value against `pattern`. With no values at all only an
    /// `absent` pattern matches.
    pub fn has_value_matching(
        &self,
        pattern: &ValuePattern,
        notifier: &dyn Notifier,
    ) -> Result<PatternMatch, ConfigurationError> {
        if !pattern.has_criterion() {
            return Err(ConfigurationError::NoMatchType);
        }
        if self.values.is_empty() {
            return Ok(PatternMatch::from_bool(pattern.is_absent()));
        }
        for value in &self.values {
            let result = pattern.is_match_for(Some(value), notifier)?;
            if result.matched {
                return Ok(result);
            }
        }
        Ok(PatternMatch::not_matched())
    }
}

/// Header multi-map with case-insensitive lookup. Insertion keeps the
/// first spelling of each name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpHeaders(BTreeMap<String, Vec<String>>);

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let existing = self
            .0
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&name))
            .cloned();
        self.0
            .entry(existing.unwrap_or(name))
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, name: &str) -> HttpHeader {
        let values = self
            .0
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.iter().cloned())
            .collect();
        MultiValue::new(name, values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the matching engine needs from an inbound request.
pub trait Request {
    /// Path plus query string.
    fn url(&self) -> &str;
    fn method(&self) -> RequestMethod;
    fn header(&self, name: &str) -> HttpHeader;
    fn all_headers(&self) -> &HttpHeaders;
    fn parameter(&self, name: &str) -> HttpParameter;
    fn body(&self) -> &[u8];
    fn body_as_string(&self) -> &str;
}

/// Split the query string of `url` into decoded name/value pairs.
pub fn parse_query(url: &str) -> Vec<(String, String)> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((name, value)) => (decode_component(name), decode_component(value)),
            None => (decode_component(part), String::new()),
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

pub(crate) fn parameter_from(params: &[(String, String)], name: &str) -> HttpParameter {
    let values = params
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
        .collect();
    MultiValue::new(name, values)
}

/// Owned request value handed over by the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: RequestMethod,
    url: String,
    headers: HttpHeaders,
    body: Vec<u8>,
    body_text: OnceLock<String>,
    params: OnceLock<Vec<(String, String)>>,
}

impl HttpRequest {
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HttpHeaders::new(),
            body: Vec::new(),
            body_text: OnceLock::new(),
            params: OnceLock::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(RequestMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.body_text = OnceLock::new();
        self
    }
}

impl Request for HttpRequest {
    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> RequestMethod {
        self.method
    }

    fn header(&self, name: &str) -> HttpHeader {
        self.headers.get(name)
    }

    fn all_headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn parameter(&self, name: &str) -> HttpParameter {
        parameter_from(self.params.get_or_init(|| parse_query(&self.url)), name)
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn body_as_string(&self) -> &str {
        self.body_text
            .get_or_init(|| String::from_utf8_lossy(&self.body).into_owned())
    }
}
