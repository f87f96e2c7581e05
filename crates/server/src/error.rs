//! Errors as they cross the host transport.
//!
//! Core errors keep their stable code; the message is the display string
//! without the code prefix.

use roadcache_core::Error;
use serde::{Deserialize, Serialize};

/// Errors raised by the transport layer itself.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A line on stdin was not a valid inbound frame.
    #[error("INVALID_INPUT: undecodable frame: {0}")]
    InvalidFrame(String),
}

/// `{ code, message }` object sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

fn strip_code(code: &str, display: String) -> String {
    display
        .strip_prefix(code)
        .and_then(|rest| rest.strip_prefix(": "))
        .map(str::to_string)
        .unwrap_or(display)
}

impl From<&Error> for WireError {
    fn from(err: &Error) -> Self {
        let code = err.code();
        WireError { code: code.to_string(), message: strip_code(code, err.to_string()) }
    }
}

impl From<Error> for WireError {
    fn from(err: Error) -> Self {
        WireError::from(&err)
    }
}

impl From<ProtocolError> for WireError {
    fn from(err: ProtocolError) -> Self {
        let code = match &err {
            ProtocolError::InvalidFrame(_) => "INVALID_INPUT",
        };
        WireError { code: code.to_string(), message: strip_code(code, err.to_string()) }
    }
}
