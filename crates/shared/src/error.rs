use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field name to message. Only failing fields are present; empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Entries from `other` overwrite entries for the same field.
    pub fn merge(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for FieldErrors {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Normalized shape of any failed HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub status: Option<u16>,
    pub data: Option<serde_json::Value>,
    pub url: String,
    pub method: String,
}

impl ErrorEnvelope {
    pub fn new(method: impl Into<String>, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            data: None,
            url: url.into(),
            method: method.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Field errors carried in the body under `fieldErrors` or `errors`.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        let data = self.data.as_ref()?;
        let map = data
            .get("fieldErrors")
            .or_else(|| data.get("errors"))?
            .as_object()?;
        let errors: FieldErrors = map
            .iter()
            .map(|(field, message)| {
                let message = match message {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (field.clone(), message)
            })
            .collect();
        (!errors.is_empty()).then_some(errors)
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} {} failed ({status}): {}", self.method, self.url, self.message),
            None => write!(f, "{} {} failed: {}", self.method, self.url, self.message),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unknown partner type `{0}`")]
    UnknownPartnerType(String),
    #[error("invalid date of agreement `{0}`")]
    InvalidDate(String),
}
