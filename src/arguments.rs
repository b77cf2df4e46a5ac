//! Request arguments
//!
//! Every key of a request body other than the operation name ends up
//! here. Accessors treat JSON `null` as absent and report type
//! mismatches as [`OperationError::Validation`].

use crate::error::OperationError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operation arguments: a JSON object keyed by argument name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful for callers and tests.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a key, treating `null` the same as a missing key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Fail with one message naming every missing key.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Validation`] if any key is absent.
    pub fn require(&self, keys: &[&str]) -> Result<(), OperationError> {
        let missing: Vec<&str> = keys.iter().copied().filter(|k| !self.contains(k)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(OperationError::Validation(missing_message(&missing)))
        }
    }

    /// A string argument. Numbers are accepted and rendered as text.
    ///
    /// # Errors
    ///
    /// Returns a validation error for arrays, objects and booleans.
    pub fn string(&self, key: &str) -> Result<Option<String>, OperationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(type_error(key, "a string")),
        }
    }

    /// # Errors
    ///
    /// Returns a validation error if the value is present but not a string.
    pub fn string_or(&self, key: &str, default: &str) -> Result<String, OperationError> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// # Errors
    ///
    /// Returns a validation error if the key is missing or not a string.
    pub fn required_string(&self, key: &str) -> Result<String, OperationError> {
        self.string(key)?
            .ok_or_else(|| OperationError::Validation(missing_message(&[key])))
    }

    /// A non-negative integer that fits in `u32`; numeric strings are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns a validation error for anything else.
    pub fn u32(&self, key: &str) -> Result<Option<u32>, OperationError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| type_error(key, "a non-negative integer"))
    }

    /// # Errors
    ///
    /// Returns a validation error if the key is missing or not an integer.
    pub fn required_u32(&self, key: &str) -> Result<u32, OperationError> {
        self.u32(key)?
            .ok_or_else(|| OperationError::Validation(missing_message(&[key])))
    }

    /// # Errors
    ///
    /// Returns a validation error if the value is present but not a
    /// non-negative integer.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, OperationError> {
        Ok(self.u32(key)?.map_or(default, |v| v as usize))
    }

    /// A loose boolean: JSON booleans, `0`/`1` and the strings
    /// `true`/`false`/`1`/`0`/`yes`/`no`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for any other value.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, OperationError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                _ => Err(type_error(key, "a boolean")),
            },
            _ => Err(type_error(key, "a boolean")),
        }
    }

    /// A nested object argument such as `search_params` or `smtp_config`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value is present but not an
    /// object.
    pub fn object(&self, key: &str) -> Result<Option<Self>, OperationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Self(map.clone()))),
            Some(_) => Err(type_error(key, "an object")),
        }
    }

    /// One or more addresses given either as an array of strings or as
    /// a single comma-separated string.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-string entries.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, OperationError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(|s| s.trim().to_string())
                        .ok_or_else(|| type_error(key, "a list of strings"))
                })
                .collect(),
            Some(_) => Err(type_error(key, "a string or a list of strings")),
        }
    }

    /// A calendar date given as `YYYY-MM-DD` or an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value cannot be parsed.
    pub fn date(&self, key: &str) -> Result<Option<NaiveDate>, OperationError> {
        self.timestamp(key).map(|ts| ts.map(|t| t.date_naive()))
    }

    /// A point in time given as an RFC 3339 timestamp or a plain date
    /// (midnight UTC).
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value cannot be parsed.
    pub fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, OperationError> {
        let Some(raw) = self.string(key)? else {
            return Ok(None);
        };
        parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| type_error(key, "a date (YYYY-MM-DD) or an RFC 3339 timestamp"))
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Arguments> for Map<String, Value> {
    fn from(args: Arguments) -> Self {
        args.0
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// `"uid" is required.` / `"uid" and "target_folder" are required.`
fn missing_message(keys: &[&str]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("\"{k}\"")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => format!("{one} is required."),
        [init @ .., last] => format!("{} and {last} are required.", init.join(", ")),
    }
}

fn type_error(key: &str, expected: &str) -> OperationError {
    OperationError::Validation(format!("\"{key}\" must be {expected}."))
}
