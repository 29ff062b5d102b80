use std::fmt;

use duplexipc::calc::CalcError;
use duplexipc::endpoint::{EndpointError, ErrorKind};

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn endpoint_error(context: &str, err: EndpointError) -> CliError {
    let code = match err.kind() {
        ErrorKind::Connection | ErrorKind::Io => TRANSPORT_ERROR,
        ErrorKind::Protocol | ErrorKind::LimitExceeded => DATA_INVALID,
        ErrorKind::Closed | ErrorKind::State => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn calc_error(context: &str, err: CalcError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use duplexipc::transport::TransportError;

    use super::*;

    #[test]
    fn unreachable_server_maps_to_transport_code() {
        let err = EndpointError::Connection(TransportError::Connect {
            path: PathBuf::from("/tmp/calc.up"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(endpoint_error("ping failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn oversized_payload_maps_to_data_invalid() {
        let err = EndpointError::LimitExceeded {
            size: 12,
            limit: 4,
        };
        let cli = endpoint_error("call failed", err);
        assert_eq!(cli.code, DATA_INVALID);
        assert!(cli.message.starts_with("call failed: payload too large"));
    }

    #[test]
    fn closed_endpoint_maps_to_failure() {
        let err = EndpointError::State("endpoint closed".to_string());
        assert_eq!(endpoint_error("call failed", err).code, FAILURE);
    }
}
