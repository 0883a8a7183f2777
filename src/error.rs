use thiserror::Error;

use crate::messages::MessageType;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("malformed event: {0}")]
    MalformedEvent(#[source] serde_json::Error),
    #[error("{message_type} message {message_id} carries no {field} field")]
    MissingContent {
        message_id: String,
        message_type: MessageType,
        field: &'static str,
    },
    #[error("failed to encode outbound event: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("{0} is set but {1} is not")]
    IncompleteTls(&'static str, &'static str),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no {kind} found in {path}")]
    MissingPem { kind: &'static str, path: String },
}
