//! Error types for schema registration, document encoding and dataset loading.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from registering or looking up schemas.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Configuration errors
    #[error("schema type key must not be empty")]
    EmptyType,

    #[error("a schema is already registered for type '{key}'")]
    AlreadyRegistered { key: String },

    #[error("schema registered for type '{key}' reports an empty wire type")]
    EmptyWireType { key: String },

    // Resolution errors
    #[error("no schema registered for type '{key}'")]
    UnknownType { key: String },

    #[error("no schema registered for wire type '{wire_type}'")]
    UnknownWireType { wire_type: String },
}

impl RegistryError {
    /// Returns true for errors caused by a bad registration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyType | Self::AlreadyRegistered { .. } | Self::EmptyWireType { .. }
        )
    }
}

/// Errors that abort an encode. No partial document is produced.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no schema for resource of type '{type_name}' at {}", display_path(.path))]
    NoSchema { type_name: String, path: String },

    #[error("include path '{path}' names a relationship that does not exist")]
    UnknownPath { path: String },

    #[error("resource of wire type '{wire_type}' at {} has no id", display_path(.path))]
    MissingId { wire_type: String, path: String },

    #[error("relationship data is {actual}, expected {expected}")]
    InvariantViolation {
        expected: &'static str,
        actual: &'static str,
    },
}

impl EncodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EncodeError::Registry(e) if e.is_configuration() => 2,
            _ => 1,
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(primary data)"
    } else {
        path
    }
}

/// Errors while loading a dataset file.
#[derive(Debug, Error)]
pub enum DatasetError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid dataset: {message}")]
    InvalidDataset { message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DatasetError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DatasetError::FileNotFound { .. } | DatasetError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// A JSON:API error object.
///
/// Absent members are skipped when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<ErrorLinks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Links of an error object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// Reference to the part of the request that caused an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSource {
    /// JSON Pointer (RFC 6901) into the request document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    /// Query parameter that caused the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl ErrorObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn about(mut self, href: impl Into<String>) -> Self {
        self.links.get_or_insert_with(ErrorLinks::default).about = Some(href.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn pointer(mut self, pointer: impl Into<String>) -> Self {
        self.source.get_or_insert_with(ErrorSource::default).pointer = Some(pointer.into());
        self
    }

    pub fn parameter(mut self, parameter: impl Into<String>) -> Self {
        self.source.get_or_insert_with(ErrorSource::default).parameter = Some(parameter.into());
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

fn insert_string(object: &mut Map<String, Value>, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        object.insert(name.to_string(), Value::String(value.clone()));
    }
}

impl ErrorObject {
    /// JSON value of this error, members in serialization order.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        insert_string(&mut object, "id", &self.id);
        if let Some(links) = &self.links {
            let mut value = Map::new();
            insert_string(&mut value, "about", &links.about);
            insert_string(&mut value, "type", &links.type_);
            object.insert("links".to_string(), Value::Object(value));
        }
        insert_string(&mut object, "status", &self.status);
        insert_string(&mut object, "code", &self.code);
        insert_string(&mut object, "title", &self.title);
        insert_string(&mut object, "detail", &self.detail);
        if let Some(source) = &self.source {
            let mut value = Map::new();
            insert_string(&mut value, "pointer", &source.pointer);
            insert_string(&mut value, "parameter", &source.parameter);
            insert_string(&mut value, "header", &source.header);
            object.insert("source".to_string(), Value::Object(value));
        }
        if let Some(meta) = &self.meta {
            object.insert("meta".to_string(), meta.clone());
        }
        Value::Object(object)
    }
}

impl From<EncodeError> for ErrorObject {
    fn from(err: EncodeError) -> Self {
        let code = match &err {
            EncodeError::Registry(_) => "registry",
            EncodeError::NoSchema { .. } => "no-schema",
            EncodeError::UnknownPath { .. } => "unknown-include-path",
            EncodeError::MissingId { .. } => "missing-id",
            EncodeError::InvariantViolation { .. } => "invariant-violation",
        };
        // HTTP status is left to the caller.
        let object = ErrorObject::new().code(code).detail(err.to_string());
        match err {
            EncodeError::UnknownPath { .. } => object
                .title("Invalid include path")
                .parameter("include"),
            _ => object.title("Encoding failed"),
        }
    }
}
