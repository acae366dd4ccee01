use std::io;
use std::net::IpAddr;

use thiserror::Error;

/// Every way a measurement run can fail. All of them end the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid address format, expected <host>:<port>, got: {0}")]
    InvalidAddressFormat(String),

    #[error("failed to resolve host {host}: {source}")]
    ResolutionFailure {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("ping to {address} failed: {source}")]
    ProbeFailure {
        address: IpAddr,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("dial {target} failed: {source}")]
    ConnectFailure {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("write request failed: {0}")]
    WriteFailure(#[source] io::Error),

    #[error("read first byte failed: {0}")]
    ReadFailure(#[source] io::Error),

    #[error("read response failed: {0}")]
    DrainFailure(#[source] io::Error),
}

impl ProbeError {
    pub fn probe<E>(address: IpAddr, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ProbeFailure {
            address,
            source: source.into(),
        }
    }

    /// Short name of the stage that failed, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidAddressFormat(_) => "parse",
            Self::ResolutionFailure { .. } => "resolve",
            Self::ProbeFailure { .. } => "ping",
            Self::MalformedRequest(_) => "build",
            Self::ConnectFailure { .. } => "dial",
            Self::WriteFailure(_) => "write",
            Self::ReadFailure(_) => "first_byte",
            Self::DrainFailure(_) => "complete",
        }
    }
}
