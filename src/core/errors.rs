use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Classification for everything that can go wrong on the demand
/// side of an auction. Per bidder errors are recorded and carried,
/// never propagated as auction failures
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// Malformed field on our side of the wire, e.g. missing
    /// required bidder params on an imp
    BadInput,
    /// The partner returned something we could not accept
    BadServerResponse,
    Timeout,
    /// Network level failure, feeds the circuit breaker
    Transport,
    /// A bid failed semantic validation post parse
    Validation,
    Config,
    PrivacyDenied,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidderError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BidderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInput, message)
    }

    pub fn bad_server_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadServerResponse, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "bidder deadline exceeded")
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}

impl std::fmt::Display for BidderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BidderError {}
