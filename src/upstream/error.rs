//! Upstream transport failures and their gateway-facing classes.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::error::GatewayError;

/// How a transport failure is reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 502: the backend could not be reached at all.
    Unreachable,
    /// 504: the backend was too slow or dropped the connection mid-flight.
    Timeout,
    /// 502 with a generic message.
    Other,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Unreachable => "unreachable",
            FailureClass::Timeout => "timeout",
            FailureClass::Other => "other",
        }
    }
}

/// A failed round trip to a backend.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("name resolution failed: {0}")]
    Dns(String),

    #[error("connection reset: {0}")]
    Reset(String),

    #[error("timed out: {0}")]
    TimedOut(String),

    #[error("deadline of {}ms exceeded", .0.as_millis())]
    Deadline(Duration),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Transport(String),
}

impl UpstreamError {
    pub fn class(&self) -> FailureClass {
        match self {
            UpstreamError::Refused(_) | UpstreamError::Dns(_) => FailureClass::Unreachable,
            UpstreamError::Reset(_) | UpstreamError::TimedOut(_) | UpstreamError::Deadline(_) => {
                FailureClass::Timeout
            }
            UpstreamError::InvalidRequest(_) | UpstreamError::Transport(_) => FailureClass::Other,
        }
    }

    /// Classify any client error by walking its source chain.
    pub fn classify(error: &(dyn StdError + 'static)) -> Self {
        let description = describe(error);
        let mut current = Some(error);

        while let Some(err) = current {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => return UpstreamError::Refused(description),
                    io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof => return UpstreamError::Reset(description),
                    io::ErrorKind::TimedOut => return UpstreamError::TimedOut(description),
                    _ => {}
                }
            }
            if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
                if hyper_err.is_incomplete_message() {
                    return UpstreamError::Reset(description);
                }
                if hyper_err.is_timeout() {
                    return UpstreamError::TimedOut(description);
                }
            }
            // hyper-util's connector reports resolver failures as "dns error".
            if err.to_string().starts_with("dns error") {
                return UpstreamError::Dns(description);
            }
            current = err.source();
        }

        UpstreamError::Transport(description)
    }

    /// Map to the pipeline error for `service`.
    pub fn into_gateway_error(self, service: &str) -> GatewayError {
        let service = service.to_string();
        let cause = self.to_string();
        match self.class() {
            FailureClass::Unreachable => GatewayError::UpstreamUnreachable { service, cause },
            FailureClass::Timeout => GatewayError::UpstreamTimeout { service, cause },
            FailureClass::Other => GatewayError::UpstreamFailed { service, cause },
        }
    }
}

impl From<hyper_util::client::legacy::Error> for UpstreamError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        UpstreamError::classify(&err)
    }
}

fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        source = err.source();
    }
    parts.join(": ")
}
