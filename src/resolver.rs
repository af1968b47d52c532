//! Contract resolution - finds the response schema governing an exchange.

use serde_json::Value;

use crate::error::ComplianceError;
use crate::matcher::matches;
use crate::types::{ContractDocument, HttpMethod, PathItem, SchemaRef, DEFAULT_RESPONSE};

/// What a response must be validated against.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSchema {
    /// The response declares no schema; nothing to validate.
    None,
    /// Inline schema fragment, pretty-printed as JSON text.
    Inline(String),
    /// A named model present in `definitions`. Validation runs against the
    /// whole contract document compiled as a schema, not the model itself.
    WholeDocument { model: String },
    /// A named model missing from `definitions`; nothing is validated.
    UnknownModel(String),
}

/// Successful resolution: the matched route template and its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub template: String,
    /// Request path after stripping the contract's base path.
    pub path: String,
    pub schema: ResolvedSchema,
}

/// Strip the contract's `basePath` from `request_path` when it is a prefix.
pub fn strip_base_path<'a>(contract: &ContractDocument, request_path: &'a str) -> &'a str {
    match contract.base_path.as_deref() {
        Some(base) => request_path.strip_prefix(base).unwrap_or(request_path),
        None => request_path,
    }
}

/// First route template, in document order, matching `path`.
///
/// `path` must already have the base path stripped.
pub fn find_route<'c>(contract: &'c ContractDocument, path: &str) -> Option<(&'c str, &'c PathItem)> {
    contract.routes().find(|(template, _)| matches(path, template))
}

/// Resolve the schema for a response to `method request_path` with `status`.
///
/// Inline fragments that refer to `#/definitions/...` carry the contract's
/// `definitions` so those refs resolve when compiled on their own.
///
/// # Errors
///
/// Returns `RouteNotFound`, `OperationNotFound` or `ResponseSpecNotFound`
/// when the contract does not declare the exchange.
pub fn resolve(
    contract: &ContractDocument,
    request_path: &str,
    method: HttpMethod,
    status: u16,
) -> Result<Resolution, ComplianceError> {
    let path = strip_base_path(contract, request_path);

    let (template, item) = find_route(contract, path).ok_or_else(|| ComplianceError::RouteNotFound {
        path: path.to_string(),
    })?;

    // Only one template is expected to match; a later one is never tried.
    let operation = item
        .operation(method)
        .ok_or_else(|| ComplianceError::OperationNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })?;

    let status = status.to_string();
    let response = operation
        .response(&status)
        .or_else(|| operation.response(DEFAULT_RESPONSE))
        .ok_or_else(|| ComplianceError::ResponseSpecNotFound {
            status: status.clone(),
            method: method.to_string(),
            path: path.to_string(),
        })?;

    let schema = match &response.schema {
        None => ResolvedSchema::None,
        Some(SchemaRef::Reference(model)) => {
            if contract.definitions.contains_key(model) {
                ResolvedSchema::WholeDocument {
                    model: model.clone(),
                }
            } else {
                ResolvedSchema::UnknownModel(model.clone())
            }
        }
        Some(SchemaRef::Inline(fragment)) => {
            ResolvedSchema::Inline(inline_schema_text(contract, fragment)?)
        }
    };

    Ok(Resolution {
        template: template.to_string(),
        path: path.to_string(),
        schema,
    })
}

/// Pretty-print an inline fragment. Fragments that point into
/// `#/definitions/` get the contract's definitions attached so their
/// references resolve when the fragment is compiled on its own.
fn inline_schema_text(contract: &ContractDocument, fragment: &Value) -> Result<String, ComplianceError> {
    let needs_definitions =
        !contract.definitions.is_empty() && refers_to_definitions(fragment);
    let mut fragment = fragment.clone();
    if let Value::Object(map) = &mut fragment {
        if needs_definitions && !map.contains_key("definitions") {
            map.insert(
                "definitions".to_string(),
                Value::Object(contract.definitions.clone()),
            );
        }
    }

    serde_json::to_string_pretty(&fragment).map_err(|e| ComplianceError::Unexpected {
        message: e.to_string(),
    })
}

fn refers_to_definitions(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, child)| {
            (key == "$ref"
                && child
                    .as_str()
                    .is_some_and(|r| r.starts_with("#/definitions/")))
                || refers_to_definitions(child)
        }),
        Value::Array(items) => items.iter().any(refers_to_definitions),
        _ => false,
    }
}
