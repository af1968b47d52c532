//! Core types: HTTP methods, the parsed contract document and compiled schemas.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{ComplianceError, LoadError};

/// Key marking the catch-all response entry of an operation.
pub const DEFAULT_RESPONSE: &str = "default";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// HTTP methods a Swagger 2.0 path item can declare operations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
    ];

    /// Upper-case verb token as sent on the wire (e.g. `GET`).
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Lower-case key used for the operation inside a contract path item.
    pub fn contract_key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a verb token that is not one of the upper-case Swagger methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method \"{0}\"")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    /// Case-sensitive: only the upper-case token is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Schema bound to a response: inline fragment or a named model.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    Inline(Value),
    /// Simple model name, e.g. `Pet` for `#/definitions/Pet`.
    Reference(String),
}

impl SchemaRef {
    fn from_value(schema: &Value) -> Self {
        match schema.get("$ref").and_then(Value::as_str) {
            Some(reference) => SchemaRef::Reference(simple_ref(reference).to_string()),
            None => SchemaRef::Inline(schema.clone()),
        }
    }
}

/// Last segment of a `$ref`: `#/definitions/Pet` and `Pet` both give `Pet`.
pub fn simple_ref(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// One declared response of an operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseSpec {
    pub schema: Option<SchemaRef>,
}

/// One HTTP-method handler on a route.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operation {
    /// Status code string or `"default"`, in document order.
    responses: Vec<(String, ResponseSpec)>,
}

impl Operation {
    /// Look up the response declared for `key` (a status code or `"default"`).
    pub fn response(&self, key: &str) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .find(|(code, _)| code == key)
            .map(|(_, spec)| spec)
    }

    /// Declared response keys in document order.
    pub fn response_keys(&self) -> impl Iterator<Item = &str> {
        self.responses.iter().map(|(code, _)| code.as_str())
    }
}

/// Operations declared on one route template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathItem {
    operations: Vec<(HttpMethod, Operation)>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, op)| op)
    }

    pub fn methods(&self) -> impl Iterator<Item = HttpMethod> + '_ {
        self.operations.iter().map(|(m, _)| *m)
    }
}

/// Parsed Swagger 2.0 API description.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDocument {
    pub base_path: Option<String>,
    routes: Vec<(String, PathItem)>,
    pub definitions: Map<String, Value>,
    document: Value,
}

impl ContractDocument {
    /// Build a contract from an already-parsed JSON/YAML document.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidContract` if the document is not a Swagger
    /// description or one of its paths, operations or responses is malformed.
    pub fn from_value(document: Value) -> Result<Self, LoadError> {
        let root = document.as_object().ok_or_else(|| LoadError::InvalidContract {
            message: format!("expected object, got {}", json_type_name(&document)),
        })?;

        if !root.contains_key("swagger") && !root.contains_key("paths") {
            return Err(LoadError::InvalidContract {
                message: "not a Swagger definition: no \"swagger\" or \"paths\" member".into(),
            });
        }

        let base_path = root
            .get("basePath")
            .and_then(Value::as_str)
            .map(String::from);

        let shared_responses = root
            .get("responses")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let definitions = root
            .get("definitions")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut routes = Vec::new();
        match root.get("paths") {
            None | Some(Value::Null) => {}
            Some(Value::Object(paths)) => {
                for (template, item) in paths {
                    let item = parse_path_item(template, item, &shared_responses)?;
                    routes.push((template.clone(), item));
                }
            }
            Some(other) => {
                return Err(LoadError::InvalidContract {
                    message: format!("/paths: expected object, got {}", json_type_name(other)),
                })
            }
        }

        Ok(Self {
            base_path,
            routes,
            definitions,
            document,
        })
    }

    /// Route templates and their path items, in document order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &PathItem)> {
        self.routes.iter().map(|(t, item)| (t.as_str(), item))
    }

    /// The whole document as it was loaded.
    pub fn document(&self) -> &Value {
        &self.document
    }
}

fn parse_path_item(
    template: &str,
    item: &Value,
    shared_responses: &Map<String, Value>,
) -> Result<PathItem, LoadError> {
    let item = item.as_object().ok_or_else(|| LoadError::InvalidContract {
        message: format!(
            "/paths/{}: expected object, got {}",
            template,
            json_type_name(item)
        ),
    })?;

    let mut operations = Vec::new();
    for method in HttpMethod::ALL {
        let Some(op) = item.get(method.contract_key()) else {
            continue;
        };
        let pointer = format!("/paths/{}/{}", template, method.contract_key());
        operations.push((method, parse_operation(&pointer, op, shared_responses)?));
    }
    Ok(PathItem { operations })
}

fn parse_operation(
    pointer: &str,
    op: &Value,
    shared_responses: &Map<String, Value>,
) -> Result<Operation, LoadError> {
    let responses = match op.get("responses") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(LoadError::InvalidContract {
                message: format!(
                    "{}/responses: expected object, got {}",
                    pointer,
                    json_type_name(other)
                ),
            })
        }
    };

    let mut parsed = Vec::with_capacity(responses.len());
    for (code, response) in &responses {
        let response = follow_response_ref(pointer, code, response, shared_responses)?;
        let schema = response.get("schema").map(SchemaRef::from_value);
        parsed.push((code.clone(), ResponseSpec { schema }));
    }

    Ok(Operation { responses: parsed })
}

/// Responses may point at a shared entry under `#/responses/`.
fn follow_response_ref<'a>(
    pointer: &str,
    code: &str,
    response: &'a Value,
    shared_responses: &'a Map<String, Value>,
) -> Result<&'a Value, LoadError> {
    match response.get("$ref").and_then(Value::as_str) {
        None => Ok(response),
        Some(reference) => shared_responses
            .get(simple_ref(reference))
            .ok_or_else(|| LoadError::InvalidContract {
                message: format!(
                    "{}/responses/{}: unresolved response reference {}",
                    pointer, code, reference
                ),
            }),
    }
}

/// Validator-ready schema, compiled once and shared across validations.
pub struct CompiledSchema {
    source_ref: String,
    document: Value,
    validator: jsonschema::Validator,
}

impl CompiledSchema {
    /// Compile `document` as a JSON Schema.
    ///
    /// # Errors
    ///
    /// Returns `ComplianceError::ValidationFailure` if the schema itself is invalid.
    pub fn compile(source_ref: impl Into<String>, document: Value) -> Result<Self, ComplianceError> {
        let validator =
            jsonschema::validator_for(&document).map_err(|e| ComplianceError::ValidationFailure {
                message: format!("invalid schema: {}", e),
            })?;
        Ok(Self {
            source_ref: source_ref.into(),
            document,
            validator,
        })
    }

    /// Source reference this schema was built from.
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("source_ref", &self.source_ref)
            .finish_non_exhaustive()
    }
}
