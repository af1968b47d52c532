//! Response body validation against compiled schemas.

use serde_json::Value;

use crate::error::{ComplianceError, ValidationError};
use crate::types::CompiledSchema;

/// Validate an instance against a compiled schema.
///
/// Returns every error-level finding in the order the validator reports
/// them; an empty list means the instance conforms. Annotations are never
/// reported.
pub fn validate(instance: &Value, schema: &CompiledSchema) -> Vec<ValidationError> {
    schema
        .validator()
        .iter_errors(instance)
        .map(|e| ValidationError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect()
}

/// Parse a response body and validate it.
///
/// # Errors
///
/// Returns `ComplianceError::ValidationFailure` if the body is not JSON.
/// Non-conformance is reported in the `Ok` list, not as an error.
pub fn validate_body(body: &str, schema: &CompiledSchema) -> Result<Vec<ValidationError>, ComplianceError> {
    let instance: Value = serde_json::from_str(body).map_err(|e| ComplianceError::ValidationFailure {
        message: format!("response body is not valid JSON: {}", e),
    })?;
    Ok(validate(&instance, schema))
}

/// Validate a body and fold findings into a single result.
///
/// # Errors
///
/// `ValidationFailure` for an unparseable body, `Conformance` carrying all
/// findings when the body violates the schema.
pub fn check(body: &str, schema: &CompiledSchema) -> Result<(), ComplianceError> {
    let errors = validate_body(body, schema)?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ComplianceError::Conformance { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pet_schema() -> CompiledSchema {
        CompiledSchema::compile(
            "pet",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "age": { "type": "integer" }
                },
                "required": ["name"]
            }),
        )
        .unwrap()
    }

    #[test]
    fn conforming_instance_has_no_errors() {
        let errors = validate(&json!({ "name": "Rex", "age": 3 }), &pet_schema());
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_required_property_is_reported() {
        let errors = validate(&json!({}), &pet_schema());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("name"));
        assert_eq!(errors[0].path, "");
    }

    #[test]
    fn type_mismatch_is_reported_with_path() {
        let errors = validate(&json!({ "name": "Rex", "age": "three" }), &pet_schema());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "/age");
    }

    #[test]
    fn each_violated_rule_is_reported() {
        let errors = validate(&json!({ "age": "three" }), &pet_schema());
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.message.contains("required")));
        assert!(errors.iter().any(|e| e.path == "/age"));
    }

    #[test]
    fn malformed_body_is_validation_failure() {
        let result = validate_body("{ not json", &pet_schema());
        assert!(matches!(
            result,
            Err(ComplianceError::ValidationFailure { .. })
        ));
    }

    #[test]
    fn check_folds_findings_into_conformance() {
        assert!(check(r#"{"name": "Rex"}"#, &pet_schema()).is_ok());

        match check("{}", &pet_schema()) {
            Err(ComplianceError::Conformance { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("expected conformance error, got {:?}", other),
        }
    }
}
