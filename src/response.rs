//! Canned responses.
//!
//! A [`ResponseDefinition`] is handed back to the transport, which writes
//! it to the wire. The transport also owns delays, faults and reading
//! file-backed bodies.

use crate::error::ConfigurationError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deliberate connection misbehaviour instead of a normal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Fault {
    /// Close the connection without writing anything
    EmptyResponse,
    /// Send a valid status line, then garbage chunked data
    MalformedResponseChunk,
    /// Send random bytes, then close
    RandomDataThenClose,
}

/// Response body representation. At most one is set per response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseBody {
    #[default]
    None,
    Text(String),
    Binary(Vec<u8>),
    /// Path relative to the transport's file root
    File(String),
    /// Positional template filled from captured groups
    Template(String),
}

impl ResponseBody {
    pub fn is_none(&self) -> bool {
        matches!(self, ResponseBody::None)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ResponseBody::Binary(_))
    }

    /// Literal bytes, if the body is held in memory.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            ResponseBody::Text(text) => Some(text.as_bytes().to_vec()),
            ResponseBody::Binary(bytes) => Some(bytes.clone()),
            ResponseBody::None | ResponseBody::File(_) | ResponseBody::Template(_) => None,
        }
    }
}

/// Response to emit for a matched (or unmatched) request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResponseDefinitionFields", into = "ResponseDefinitionFields")]
pub struct ResponseDefinition {
    status: u16,
    body: ResponseBody,
    headers: BTreeMap<String, String>,
    fixed_delay_milliseconds: Option<u64>,
    fault: Option<Fault>,
    proxy_base_url: Option<String>,
    was_configured: bool,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self::new(200)
    }
}

impl ResponseDefinition {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: ResponseBody::None,
            headers: BTreeMap::new(),
            fixed_delay_milliseconds: None,
            fault: None,
            proxy_base_url: None,
            was_configured: true,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// Returned when no stub matched.
    pub fn not_configured() -> Self {
        Self {
            was_configured: false,
            ..Self::new(404)
        }
    }

    pub fn with_text(status: u16, body: impl Into<String>) -> Self {
        Self {
            body: ResponseBody::Text(body.into()),
            ..Self::new(status)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_fixed_delay(mut self, milliseconds: u64) -> Self {
        self.fixed_delay_milliseconds = Some(milliseconds);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_proxy_base_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_base_url = Some(url.into());
        self
    }

    /// Status code; an unset (zero) status reads as 200.
    pub fn status(&self) -> u16 {
        if self.status == 0 {
            200
        } else {
            self.status
        }
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    fn set_body_once(&mut self, body: ResponseBody) -> Result<(), ConfigurationError> {
        if !self.body.is_none() {
            return Err(ConfigurationError::BodyAlreadySet);
        }
        self.body = body;
        Ok(())
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set_body_once(ResponseBody::Text(body.into()))
    }

    pub fn set_binary_body(&mut self, body: Vec<u8>) -> Result<(), ConfigurationError> {
        self.set_body_once(ResponseBody::Binary(body))
    }

    pub fn set_base64_body(&mut self, encoded: &str) -> Result<(), ConfigurationError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ConfigurationError::InvalidBase64(e.to_string()))?;
        self.set_binary_body(bytes)
    }

    pub fn set_body_file_name(&mut self, file_name: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set_body_once(ResponseBody::File(file_name.into()))
    }

    pub fn set_body_template(&mut self, template: impl Into<String>) -> Result<(), ConfigurationError> {
        self.set_body_once(ResponseBody::Template(template.into()))
    }

    /// Same response with a different body. Used when resolving templates.
    pub(crate) fn with_resolved_body(&self, body: ResponseBody) -> Self {
        Self {
            body,
            ..self.clone()
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn fixed_delay_milliseconds(&self) -> Option<u64> {
        self.fixed_delay_milliseconds
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn proxy_base_url(&self) -> Option<&str> {
        self.proxy_base_url.as_deref()
    }

    pub fn was_configured(&self) -> bool {
        self.was_configured
    }
}

fn default_status() -> u16 {
    200
}

/// Wire form of a [`ResponseDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseDefinitionFields {
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base64_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body_template: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fixed_delay_milliseconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fault: Option<Fault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy_base_url: Option<String>,
}

impl TryFrom<ResponseDefinitionFields> for ResponseDefinition {
    type Error = ConfigurationError;

    fn try_from(fields: ResponseDefinitionFields) -> Result<Self, Self::Error> {
        let mut response = ResponseDefinition::new(fields.status);
        if let Some(body) = fields.body {
            response.set_body(body)?;
        }
        if let Some(encoded) = fields.base64_body {
            response.set_base64_body(&encoded)?;
        }
        if let Some(file_name) = fields.body_file_name {
            response.set_body_file_name(file_name)?;
        }
        if let Some(template) = fields.body_template {
            response.set_body_template(template)?;
        }
        response.headers = fields.headers;
        response.fixed_delay_milliseconds = fields.fixed_delay_milliseconds;
        response.fault = fields.fault;
        response.proxy_base_url = fields.proxy_base_url;
        Ok(response)
    }
}

impl From<ResponseDefinition> for ResponseDefinitionFields {
    fn from(response: ResponseDefinition) -> Self {
        let mut fields = ResponseDefinitionFields {
            status: response.status,
            body: None,
            base64_body: None,
            body_file_name: None,
            body_template: None,
            headers: response.headers,
            fixed_delay_milliseconds: response.fixed_delay_milliseconds,
            fault: response.fault,
            proxy_base_url: response.proxy_base_url,
        };
        match response.body {
            ResponseBody::None => {}
            ResponseBody::Text(text) => fields.body = Some(text),
            ResponseBody::Binary(bytes) => {
                fields.base64_body = Some(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ResponseBody::File(name) => fields.body_file_name = Some(name),
            ResponseBody::Template(template) => fields.body_template = Some(template),
        }
        fields
    }
}
