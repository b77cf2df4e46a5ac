//! Request and response bodies carried on the queue

use crate::arguments::Arguments;
use crate::error::OperationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Legacy name of the `operation` key, still accepted on input.
const LEGACY_OPERATION_KEY: &str = "function_to_call";

/// A decoded request: the operation name plus its arguments.
///
/// On the wire the arguments are the remaining top-level keys of the
/// body. An explicit `arguments` object is also understood and its
/// entries take precedence over top-level keys of the same name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope {
    pub operation: String,
    #[serde(flatten)]
    pub arguments: Arguments,
}

impl RequestEnvelope {
    #[must_use]
    pub fn new(operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }

    /// Decode a message body.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Protocol`] if the body is not UTF-8
    /// JSON, not an object, or names no operation.
    pub fn from_slice(body: &[u8]) -> Result<Self, OperationError> {
        let text = std::str::from_utf8(body)
            .map_err(|e| OperationError::Protocol(format!("Request body is not UTF-8: {e}")))?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| OperationError::Protocol(format!("Malformed request body: {e}")))?;
        let Value::Object(mut map) = value else {
            return Err(OperationError::Protocol(
                "Request body must be a JSON object".into(),
            ));
        };

        let operation = take_operation(&mut map)?;
        if let Some(Value::Object(nested)) = map.remove("arguments") {
            map.extend(nested);
        }

        Ok(Self {
            operation,
            arguments: Arguments::from(map),
        })
    }

    /// # Errors
    ///
    /// Fails only if an argument value cannot be serialized.
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn take_operation(map: &mut Map<String, Value>) -> Result<String, OperationError> {
    let current = map.remove("operation");
    let legacy = map.remove(LEGACY_OPERATION_KEY);
    match current.or(legacy) {
        Some(Value::String(name)) if !name.is_empty() => Ok(name),
        Some(_) => Err(OperationError::Protocol(
            "\"operation\" must be a non-empty string".into(),
        )),
        None => Err(OperationError::Protocol(
            "Request is missing \"operation\"".into(),
        )),
    }
}

/// The reply body: `{success, data?, errors?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(error: &OperationError) -> Self {
        Self {
            success: false,
            data: None,
            errors: vec![error.to_string()],
        }
    }

    #[must_use]
    pub fn from_result(result: Result<Value, OperationError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(&e),
        }
    }

    /// # Errors
    ///
    /// Returns the JSON error if the body is not a response envelope.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Serialize the envelope; falls back to a fixed failure body if the
    /// payload itself cannot be encoded.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|e| {
            let fallback = Self::failure(&OperationError::Internal(format!(
                "response could not be encoded: {e}"
            )));
            serde_json::to_vec(&fallback).unwrap_or_default()
        })
    }
}
