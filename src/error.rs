use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::{ExceptionInfo, SyntaxFailure, TypeKey};

/// Failures raised while turning a live value into its encoded document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SerializationError {
    /// Nothing in the registry handles this type and there is no fallback.
    #[error("No type serializer found for {type_name}")]
    NoEncoder { type_name: String },

    /// An encoder failed internally; carries the encoder and the offending value.
    #[error("Failed to serialize {value} using {encoder}: {reason}")]
    EncoderFailed {
        encoder: &'static str,
        value: String,
        reason: String,
    },

    /// Raised from inside an encoder. The dispatcher rewraps it as `EncoderFailed`.
    #[error("{0}")]
    Encoder(String),
}

impl SerializationError {
    pub fn encoder(reason: impl Into<String>) -> Self {
        Self::Encoder(reason.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("An encoder for `{type_key:?}` already exists")]
    Duplicate { type_key: TypeKey },

    #[error("Provide at least one type handled by the encoder")]
    NoTypes,
}

/// Failures reported by an execution source.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("SyntaxError: {0}")]
    Syntax(SyntaxFailure),

    /// An exception unwound past the top-level script frame.
    #[error("uncaught {}: {}", .0.type_name(), .0.message())]
    Uncaught(ExceptionInfo),

    #[error("execution source failure: {0}")]
    Internal(String),
}

impl SourceError {
    /// Exception type name used when this failure is reported as a SystemError.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Syntax(_) => "SyntaxError",
            Self::Uncaught(info) => info.type_name(),
            Self::Internal(_) => "InternalError",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Syntax(failure) => failure.message.clone(),
            Self::Uncaught(info) => info.message().to_string(),
            Self::Internal(message) => message.clone(),
        }
    }
}

/// Failures an event handler can hand back to the debugger.
#[derive(Error, Debug, Clone)]
pub enum TraceError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl TraceError {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Serialization(SerializationError::NoEncoder { .. }) => "NoSerializerFoundError",
            Self::Serialization(_) => "SerializationError",
            Self::Source(err) => err.type_name(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Serialization(err) => err.to_string(),
            Self::Source(err) => err.message(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}
