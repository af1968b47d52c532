//! Contract Compliance
//!
//! Checks captured HTTP responses against a JSON Schema or against the
//! response schemas a Swagger 2.0 contract declares.
//!
//! # Example
//!
//! ```
//! use contract_compliance::{resolve, ContractDocument, HttpMethod, ResolvedSchema};
//! use serde_json::json;
//!
//! let contract = ContractDocument::from_value(json!({
//!     "swagger": "2.0",
//!     "paths": {
//!         "/pets/{id}": {
//!             "get": {
//!                 "responses": {
//!                     "200": { "schema": { "type": "object", "required": ["name"] } }
//!                 }
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let resolution = resolve(&contract, "/pets/42", HttpMethod::Get, 200).unwrap();
//! assert_eq!(resolution.template, "/pets/{id}");
//! assert!(matches!(resolution.schema, ResolvedSchema::Inline(_)));
//! ```
//!
//! # Resolution Rules
//!
//! | Step | Outcome when missing |
//! |------|----------------------|
//! | First route template matching the path | `RouteNotFound` |
//! | Operation for the request method on that route | `OperationNotFound` |
//! | Response for the status code, else `"default"` | `ResponseSpecNotFound` |
//! | Schema on the response | vacuous pass |
//!
//! Route templates match segment by segment: `{name}` matches anything,
//! literals compare case-insensitively, segment counts must agree.

mod cache;
mod compliance;
mod error;
mod loader;
mod matcher;
mod resolver;
mod types;
mod validator;

pub use cache::{ContractCache, ContractEntry, SchemaCache};
pub use compliance::{
    endpoint_path, ContractAssertion, Exchange, HasRequest, HasResponse, JsonSchemaAssertion,
    NoExpansion, PropertyExpander, CONTRACT_COMPLIANT, SCHEMA_COMPLIANT,
};
pub use error::{ComplianceError, LoadError, ValidationError};
pub use loader::{
    is_inline, is_url, load_document, load_document_auto, load_document_str, navigate_fragment,
    DefaultFetcher, DocumentFetcher,
};
pub use matcher::{is_placeholder, matches};
pub use resolver::{find_route, resolve, strip_base_path, ResolvedSchema, Resolution};
pub use types::{
    simple_ref, CompiledSchema, ContractDocument, HttpMethod, Operation, PathItem, ResponseSpec,
    SchemaRef, UnknownMethod, DEFAULT_RESPONSE,
};
pub use validator::{check, validate, validate_body};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
