//! Response compliance assertions.
//!
//! Two assertions share one shape: find the schema for an exchange, then
//! validate the response body against it.
//!
//! - [`JsonSchemaAssertion`] validates every response against one JSON Schema.
//! - [`ContractAssertion`] looks the exchange up in a Swagger 2.0 contract and
//!   validates against the schema declared for its route, method and status.
//!
//! Both are vacuous passes when no source is configured or the exchange has
//! no usable response.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::cache::{ContractCache, SchemaCache};
use crate::error::ComplianceError;
use crate::resolver::{resolve, ResolvedSchema};
use crate::types::HttpMethod;
use crate::validator::check;

/// Message returned when a response passes the JSON Schema assertion.
pub const SCHEMA_COMPLIANT: &str = "Response is compliant with JSON Schema";

/// Message returned when a response passes the contract assertion.
pub const CONTRACT_COMPLIANT: &str = "Response is compliant with Swagger definition";

/// Response side of a captured exchange.
pub trait HasResponse {
    /// Status code, `None` when no response was received.
    fn status_code(&self) -> Option<u16>;
    fn body(&self) -> Option<&str>;
}

/// Request side of a captured exchange.
pub trait HasRequest {
    /// Request path without query or fragment.
    fn path(&self) -> Option<&str>;
    fn method(&self) -> HttpMethod;
}

/// Host-side substitution applied to a configured source before use.
pub trait PropertyExpander {
    fn expand(&self, template: &str) -> String;
}

/// Uses configured sources verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpansion;

impl PropertyExpander for NoExpansion {
    fn expand(&self, template: &str) -> String {
        template.to_string()
    }
}

/// Replaces `${name}` with the value stored under `name`. Unknown
/// properties are left in place.
impl PropertyExpander for HashMap<String, String> {
    fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            let Some(len) = rest[start + 2..].find('}') else {
                break;
            };
            let name = &rest[start + 2..start + 2 + len];
            out.push_str(&rest[..start]);
            match self.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + 3 + len]),
            }
            rest = &rest[start + 3 + len..];
        }
        out.push_str(rest);
        out
    }
}

/// A captured request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub method: HttpMethod,
    pub path: Option<String>,
    pub status_code: Option<u16>,
    pub body: Option<String>,
}

impl Exchange {
    /// Exchange without a response yet.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: Some(path.into()),
            status_code: None,
            body: None,
        }
    }

    /// Exchange whose path is taken from a full endpoint URL.
    pub fn from_endpoint(method: HttpMethod, endpoint: &str) -> Self {
        Self::new(method, endpoint_path(endpoint))
    }

    pub fn with_response(mut self, status_code: u16, body: impl Into<String>) -> Self {
        self.status_code = Some(status_code);
        self.body = Some(body.into());
        self
    }
}

impl HasResponse for Exchange {
    fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl HasRequest for Exchange {
    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn method(&self) -> HttpMethod {
        self.method
    }
}

/// Path component of an endpoint URL: `http://host:8080/v1/pets?x=1` gives
/// `/v1/pets`, `http://host` gives the empty path.
pub fn endpoint_path(endpoint: &str) -> &str {
    let after_scheme = match endpoint.find("://") {
        Some(idx) => {
            let rest = &endpoint[idx + 3..];
            match rest.find(|c: char| c == '/' || c == '?' || c == '#') {
                Some(slash) if rest[slash..].starts_with('/') => &rest[slash..],
                _ => "",
            }
        }
        None => endpoint,
    };
    let end = after_scheme
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(after_scheme.len());
    &after_scheme[..end]
}

/// Status and body of a usable response, or `None` for a vacuous pass.
fn usable_response(exchange: &impl HasResponse) -> Option<(u16, &str)> {
    match (exchange.status_code(), exchange.body()) {
        (Some(status), Some(body)) if status != 0 => Some((status, body)),
        _ => None,
    }
}

/// Run an evaluation, turning a panic into `ComplianceError::Unexpected`
/// so the host always receives a typed result.
fn guarded<T>(evaluate: impl FnOnce() -> Result<T, ComplianceError>) -> Result<T, ComplianceError> {
    panic::catch_unwind(AssertUnwindSafe(evaluate)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ComplianceError::Unexpected { message })
    })
}

fn log_outcome<T>(result: &Result<T, ComplianceError>) {
    match result {
        Ok(_) => tracing::debug!("passed"),
        Err(e) if e.is_conformance() => tracing::debug!(errors = e.messages().len(), "failed"),
        Err(e) => tracing::debug!(error = %e, "errored"),
    }
}

/// Asserts that responses conform to a single JSON Schema.
#[derive(Debug, Default)]
pub struct JsonSchemaAssertion {
    schema_url: Option<String>,
    cache: SchemaCache,
}

impl JsonSchemaAssertion {
    pub fn new(schema_url: Option<String>) -> Self {
        Self::with_cache(schema_url, SchemaCache::new())
    }

    /// Use a pre-built cache (e.g. one with a custom fetcher).
    pub fn with_cache(schema_url: Option<String>, cache: SchemaCache) -> Self {
        Self { schema_url, cache }
    }

    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }

    /// Reconfigure the schema source; the memoized schema is dropped.
    pub fn set_schema_url(&mut self, schema_url: Option<String>) {
        self.schema_url = schema_url;
        self.cache.invalidate();
    }

    /// Validate the exchange's response body against the configured schema.
    ///
    /// # Errors
    ///
    /// `SchemaLoad` when the schema cannot be loaded, `ValidationFailure` when
    /// the body or schema cannot be processed, `Conformance` with every finding
    /// when the body does not conform.
    pub fn assert_response(
        &self,
        exchange: &impl HasResponse,
        expander: &impl PropertyExpander,
    ) -> Result<String, ComplianceError> {
        let Some(schema_url) = self.schema_url.as_deref() else {
            return Ok(SCHEMA_COMPLIANT.to_string());
        };
        let Some((_, body)) = usable_response(exchange) else {
            tracing::debug!("no response to validate");
            return Ok(SCHEMA_COMPLIANT.to_string());
        };

        let span = tracing::debug_span!("json_schema_assertion", source = schema_url);
        let _entered = span.enter();

        let result = guarded(|| {
            tracing::debug!("resolving schema");
            let schema = self.cache.get(&expander.expand(schema_url))?;
            tracing::debug!("validating");
            check(body, &schema)?;
            Ok(SCHEMA_COMPLIANT.to_string())
        });
        log_outcome(&result);
        result
    }
}

/// Asserts that responses conform to the schema a Swagger contract
/// declares for their route, method and status code.
#[derive(Debug, Default)]
pub struct ContractAssertion {
    contract_url: Option<String>,
    cache: ContractCache,
}

impl ContractAssertion {
    pub fn new(contract_url: Option<String>) -> Self {
        Self::with_cache(contract_url, ContractCache::new())
    }

    pub fn with_cache(contract_url: Option<String>, cache: ContractCache) -> Self {
        Self {
            contract_url,
            cache,
        }
    }

    pub fn contract_url(&self) -> Option<&str> {
        self.contract_url.as_deref()
    }

    /// Reconfigure the contract source; the contract and every schema
    /// derived from it are dropped.
    pub fn set_contract_url(&mut self, contract_url: Option<String>) {
        self.contract_url = contract_url;
        self.cache.invalidate();
    }

    /// Validate the exchange's response body against the contract.
    ///
    /// # Errors
    ///
    /// `RouteNotFound`, `OperationNotFound` and `ResponseSpecNotFound` when the
    /// contract does not declare the exchange; otherwise as for
    /// [`JsonSchemaAssertion::assert_response`].
    pub fn assert_response<E>(
        &self,
        exchange: &E,
        expander: &impl PropertyExpander,
    ) -> Result<String, ComplianceError>
    where
        E: HasRequest + HasResponse,
    {
        let Some(contract_url) = self.contract_url.as_deref() else {
            return Ok(CONTRACT_COMPLIANT.to_string());
        };
        let Some(path) = exchange.path() else {
            return Ok(CONTRACT_COMPLIANT.to_string());
        };
        let Some((status, body)) = usable_response(exchange) else {
            tracing::debug!("no response to validate");
            return Ok(CONTRACT_COMPLIANT.to_string());
        };
        let method = exchange.method();

        let span = tracing::debug_span!(
            "contract_assertion",
            source = contract_url,
            %method,
            path,
            status
        );
        let _entered = span.enter();

        let result = guarded(|| {
            tracing::debug!("resolving schema");
            let entry = self.cache.get(&expander.expand(contract_url))?;
            let resolution = resolve(entry.contract(), path, method, status)?;
            tracing::debug!(template = %resolution.template, "matched route");

            let schema = match resolution.schema {
                ResolvedSchema::None => return Ok(CONTRACT_COMPLIANT.to_string()),
                ResolvedSchema::UnknownModel(model) => {
                    tracing::warn!(%model, "response model not found in definitions; not validated");
                    return Ok(CONTRACT_COMPLIANT.to_string());
                }
                ResolvedSchema::WholeDocument { .. } => entry.whole_document_schema()?,
                ResolvedSchema::Inline(text) => entry.inline_schema(&text)?,
            };

            tracing::debug!("validating");
            check(body, &schema)?;
            Ok(CONTRACT_COMPLIANT.to_string())
        });
        log_outcome(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_path_extraction() {
        assert_eq!(endpoint_path("http://localhost:8080/v1/pets/42"), "/v1/pets/42");
        assert_eq!(endpoint_path("https://api.example.com/pets?limit=5"), "/pets");
        assert_eq!(endpoint_path("https://api.example.com/pets#top"), "/pets");
        assert_eq!(endpoint_path("https://api.example.com"), "");
        assert_eq!(endpoint_path("https://api.example.com?x=/y"), "");
        assert_eq!(endpoint_path("/pets/42?x=1"), "/pets/42");
    }

    #[test]
    fn map_expander_substitutes_known_properties() {
        let props: HashMap<String, String> = [("host".to_string(), "example.com".to_string())]
            .into_iter()
            .collect();
        assert_eq!(
            props.expand("https://${host}/swagger.json"),
            "https://example.com/swagger.json"
        );
        assert_eq!(props.expand("${missing}/x"), "${missing}/x");
        assert_eq!(props.expand("${host"), "${host");
        assert_eq!(props.expand("${host}${host}"), "example.comexample.com");
    }

    #[test]
    fn no_expansion_is_identity() {
        assert_eq!(NoExpansion.expand("${a}"), "${a}");
    }

    #[test]
    fn unconfigured_assertions_pass() {
        let exchange = Exchange::new(HttpMethod::Get, "/pets").with_response(200, "{}");
        assert_eq!(
            JsonSchemaAssertion::new(None).assert_response(&exchange, &NoExpansion).unwrap(),
            SCHEMA_COMPLIANT
        );
        assert_eq!(
            ContractAssertion::new(None).assert_response(&exchange, &NoExpansion).unwrap(),
            CONTRACT_COMPLIANT
        );
    }

    #[test]
    fn missing_response_passes() {
        let assertion = JsonSchemaAssertion::new(Some("does-not-exist.json".into()));
        let exchange = Exchange::new(HttpMethod::Get, "/pets");
        assert!(assertion.assert_response(&exchange, &NoExpansion).is_ok());

        let zero_status = Exchange::new(HttpMethod::Get, "/pets").with_response(0, "{}");
        assert!(assertion.assert_response(&zero_status, &NoExpansion).is_ok());
    }

    #[test]
    fn panics_become_unexpected_errors() {
        let result: Result<(), ComplianceError> = guarded(|| panic!("boom"));
        assert!(matches!(
            result,
            Err(ComplianceError::Unexpected { message }) if message == "boom"
        ));
    }
}
