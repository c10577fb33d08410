//! Per-record parameter resolution.
//!
//! Every parameter is configured once per batch as a [`ParameterValue`]: either
//! a literal JSON value or a reference to a field of the record being processed.
//! [`ParameterSet::resolve`] turns those loosely typed values into a typed
//! [`OperationRequest`] before anything is dispatched, so wrongly typed input
//! fails with `InvalidInput` here rather than deep inside an operation.

use crate::error::OperationError;
use crate::operations::{Operation, OperationRequest, DEFAULT_MAX_TOKENS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a parameter's value comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// `{"field": "text"}` reads `record["text"]`.
    Field { field: String },
    /// Any other JSON value is used as-is for every record.
    Literal(Value),
}

impl ParameterValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ParameterValue::Literal(value.into())
    }

    pub fn field(name: impl Into<String>) -> Self {
        ParameterValue::Field { field: name.into() }
    }

    /// `None` when a referenced field is missing from the record.
    fn lookup<'a>(&'a self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        match self {
            ParameterValue::Literal(value) => Some(value),
            ParameterValue::Field { field } => record.get(field),
        }
    }
}

/// The configured parameters of a batch. Unset parameters fall back to their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_string: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_key: Option<ParameterValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_token_limit: Option<ParameterValue>,
}

/// A request ready for dispatch, together with the key its result goes under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedParameters {
    pub request: OperationRequest,
    pub destination_key: String,
}

impl ParameterSet {
    /// Returns a set where every parameter present in `overrides` replaces ours.
    pub fn merge(self, overrides: ParameterSet) -> ParameterSet {
        ParameterSet {
            input_string: overrides.input_string.or(self.input_string),
            input_tokens: overrides.input_tokens.or(self.input_tokens),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            destination_key: overrides.destination_key.or(self.destination_key),
            error_token_limit: overrides.error_token_limit.or(self.error_token_limit),
        }
    }

    /// Resolves the parameters `operation` needs against one record.
    ///
    /// Parameters the operation does not use are never read, so a malformed
    /// `maxTokens` does not break an `encode` batch.
    pub fn resolve(
        &self,
        operation: Operation,
        record: &Map<String, Value>,
    ) -> Result<ResolvedParameters, OperationError> {
        let request = match operation {
            Operation::Encode => OperationRequest::Encode {
                text: self.input_string(record)?,
            },
            Operation::Decode => OperationRequest::Decode {
                tokens: self.input_tokens(record)?,
            },
            Operation::CountTokens => OperationRequest::CountTokens {
                text: self.input_string(record)?,
            },
            Operation::IsWithinTokenLimit => OperationRequest::IsWithinTokenLimit {
                text: self.input_string(record)?,
                max_tokens: self.max_tokens(record)?,
                error_on_exceed: self.error_token_limit(record)?,
            },
            Operation::SliceMatchingTokenLimit => OperationRequest::SliceMatchingTokenLimit {
                text: self.input_string(record)?,
                max_tokens: self.max_tokens(record)?,
            },
        };

        let destination_key = match self.destination_key(record)? {
            key if key.is_empty() => operation.default_destination_key().to_owned(),
            key => key,
        };

        Ok(ResolvedParameters {
            request,
            destination_key,
        })
    }

    fn input_string(&self, record: &Map<String, Value>) -> Result<String, OperationError> {
        match lookup(&self.input_string, record) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(OperationError::invalid("Input String is not a string")),
        }
    }

    fn input_tokens(&self, record: &Map<String, Value>) -> Result<Vec<u32>, OperationError> {
        let items = match lookup(&self.input_tokens, record) {
            Some(Value::Array(items)) => items,
            _ => return Err(OperationError::invalid("Input Tokens is not an array")),
        };
        items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|t| u32::try_from(t).ok())
                    .ok_or_else(|| {
                        OperationError::invalid(format!(
                            "Input Tokens must be non-negative integers, found {item}"
                        ))
                    })
            })
            .collect()
    }

    fn max_tokens(&self, record: &Map<String, Value>) -> Result<i64, OperationError> {
        match lookup(&self.max_tokens, record) {
            None => Ok(DEFAULT_MAX_TOKENS),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| OperationError::invalid("Max Tokens is not an integer")),
        }
    }

    fn destination_key(&self, record: &Map<String, Value>) -> Result<String, OperationError> {
        match lookup(&self.destination_key, record) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(OperationError::invalid("Destination Key is not a string")),
        }
    }

    fn error_token_limit(&self, record: &Map<String, Value>) -> Result<bool, OperationError> {
        match lookup(&self.error_token_limit, record) {
            None => Ok(false),
            Some(value) => value.as_bool().ok_or_else(|| {
                OperationError::invalid("Error When Exceeding Token Limit is not a boolean")
            }),
        }
    }
}

fn lookup<'a>(
    param: &'a Option<ParameterValue>,
    record: &'a Map<String, Value>,
) -> Option<&'a Value> {
    param.as_ref().and_then(|p| p.lookup(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_parameter_value_deserializes_field_reference() {
        let field: ParameterValue = serde_json::from_value(json!({"field": "text"})).unwrap();
        assert_eq!(field, ParameterValue::field("text"));

        let literal: ParameterValue = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(literal, ParameterValue::literal("hello"));
    }

    #[test]
    fn test_lookup_borrows_literal_or_record_field() {
        let rec = record(json!({"text": "hi"}));
        assert_eq!(
            ParameterValue::literal("fixed").lookup(&rec),
            Some(&json!("fixed"))
        );
        let text_field = ParameterValue::field("text");
        let found = text_field.lookup(&rec).unwrap();
        assert!(std::ptr::eq(found, &rec["text"]));
        assert_eq!(ParameterValue::field("missing").lookup(&rec), None);
    }

    #[test]
    fn test_resolve_encode_from_field() {
        let params = ParameterSet {
            input_string: Some(ParameterValue::field("text")),
            ..Default::default()
        };
        let resolved = params
            .resolve(Operation::Encode, &record(json!({"text": "hi there"})))
            .unwrap();
        assert_eq!(
            resolved.request,
            OperationRequest::Encode {
                text: "hi there".into()
            }
        );
        assert_eq!(resolved.destination_key, "tokens");
    }

    #[test]
    fn test_missing_input_string_defaults_to_empty() {
        let params = ParameterSet {
            input_string: Some(ParameterValue::field("text")),
            ..Default::default()
        };
        let resolved = params
            .resolve(Operation::CountTokens, &record(json!({})))
            .unwrap();
        assert_eq!(
            resolved.request,
            OperationRequest::CountTokens {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_non_string_input_is_invalid() {
        let params = ParameterSet {
            input_string: Some(ParameterValue::field("text")),
            ..Default::default()
        };
        let err = params
            .resolve(Operation::Encode, &record(json!({"text": 42})))
            .unwrap_err();
        assert_eq!(err, OperationError::invalid("Input String is not a string"));
    }

    #[test]
    fn test_input_tokens_must_be_an_array_of_ids() {
        let params = ParameterSet {
            input_tokens: Some(ParameterValue::field("ids")),
            ..Default::default()
        };
        let ok = params
            .resolve(Operation::Decode, &record(json!({"ids": [5661, 318, 1337]})))
            .unwrap();
        assert_eq!(
            ok.request,
            OperationRequest::Decode {
                tokens: vec![5661, 318, 1337]
            }
        );
        assert_eq!(ok.destination_key, "data");

        for bad in [json!({"ids": "[1,2]"}), json!({}), json!({"ids": null})] {
            assert_eq!(
                params.resolve(Operation::Decode, &record(bad)).unwrap_err(),
                OperationError::invalid("Input Tokens is not an array")
            );
        }
        for bad in [json!({"ids": [1, -2]}), json!({"ids": [1.5]}), json!({"ids": [5_000_000_000u64]})] {
            assert!(matches!(
                params.resolve(Operation::Decode, &record(bad)),
                Err(OperationError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_max_tokens_defaults_and_validation() {
        let mut params = ParameterSet {
            input_string: Some(ParameterValue::literal("abc")),
            ..Default::default()
        };
        let resolved = params
            .resolve(Operation::SliceMatchingTokenLimit, &record(json!({})))
            .unwrap();
        assert_eq!(
            resolved.request,
            OperationRequest::SliceMatchingTokenLimit {
                text: "abc".into(),
                max_tokens: 2048
            }
        );

        params.max_tokens = Some(ParameterValue::literal("100"));
        assert_eq!(
            params
                .resolve(Operation::IsWithinTokenLimit, &record(json!({})))
                .unwrap_err(),
            OperationError::invalid("Max Tokens is not an integer")
        );

        // Unused parameters are not validated.
        assert!(params.resolve(Operation::Encode, &record(json!({}))).is_ok());
    }

    #[test]
    fn test_explicit_destination_key_and_error_flag() {
        let params = ParameterSet {
            input_string: Some(ParameterValue::literal("abc")),
            max_tokens: Some(ParameterValue::field("budget")),
            destination_key: Some(ParameterValue::literal("fits")),
            error_token_limit: Some(ParameterValue::literal(true)),
            ..Default::default()
        };
        let resolved = params
            .resolve(Operation::IsWithinTokenLimit, &record(json!({"budget": 10})))
            .unwrap();
        assert_eq!(resolved.destination_key, "fits");
        assert_eq!(
            resolved.request,
            OperationRequest::IsWithinTokenLimit {
                text: "abc".into(),
                max_tokens: 10,
                error_on_exceed: true
            }
        );
    }

    #[test]
    fn test_empty_destination_key_uses_default() {
        let params = ParameterSet {
            input_string: Some(ParameterValue::literal("abc")),
            destination_key: Some(ParameterValue::literal("")),
            ..Default::default()
        };
        let resolved = params
            .resolve(Operation::CountTokens, &record(json!({})))
            .unwrap();
        assert_eq!(resolved.destination_key, "tokenCount");
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let base = ParameterSet {
            input_string: Some(ParameterValue::literal("from file")),
            max_tokens: Some(ParameterValue::literal(10)),
            ..Default::default()
        };
        let overrides = ParameterSet {
            input_string: Some(ParameterValue::field("text")),
            ..Default::default()
        };
        let merged = base.merge(overrides);
        assert_eq!(merged.input_string, Some(ParameterValue::field("text")));
        assert_eq!(merged.max_tokens, Some(ParameterValue::literal(10)));
    }
}
