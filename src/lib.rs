//! Stubwire
//!
//! An HTTP stub engine: decides for every inbound request whether a stored
//! stub applies and which canned response to emit, while keeping a
//! journal of the requests it has seen. The HTTP transport itself lives
//! outside this crate; it hands requests over through the [`Request`]
//! trait and writes back the [`ResponseDefinition`] it receives.
//!
//! # Features
//!
//! - **Pattern Algebra**: equality, substring, full-match regex, JSON path,
//!   JSON and XML equality, combined with AND/OR/NOT
//! - **Request Matching**: URL, method, headers, query parameters, body
//! - **Scenarios**: per-workflow state machines gating which stubs apply
//! - **Response Templates**: captured groups bound into the body by position
//! - **Request Journal**: disabled, bounded or unbounded, resizable live
//!
//! # Example Configuration
//!
//! ```yaml
//! mappings:
//!   - request:
//!       method: GET
//!       urlPattern: /users/([0-9]+)
//!     response:
//!       status: 200
//!       bodyTemplate: '{"id": {1}}'
//! settings:
//!   journalCapacity: 100
//! ```

pub mod compare;
pub mod config;
pub mod error;
pub mod http;
pub mod journal;
pub mod matcher;
pub mod notifier;
pub mod pattern;
pub mod response;
pub mod server;
pub mod stubbing;
pub mod template;
pub mod value_pattern;

pub use config::{GlobalSettings, StubServerConfig};
pub use error::{ConfigurationError, JournalDisabledError};
pub use http::{HttpRequest, Request, RequestMethod};
pub use matcher::RequestPattern;
pub use response::ResponseDefinition;
pub use server::StubServer;
pub use stubbing::{StubMapping, StubRegistry};
pub use value_pattern::ValuePattern;
