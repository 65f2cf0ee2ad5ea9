// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;
use videograb::ErrorKind;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments or unknown device class
    InvalidArgs(String),
    /// Video device missing, busy or inaccessible
    DeviceNotFound(String),
    /// No decoder or converter for the negotiated formats
    CodecUnavailable(String),
    /// Device exposes no usable video stream
    StreamError(String),
    /// Any other failure, including errors while capturing
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::DeviceNotFound(msg) => write!(f, "Device unavailable: {}", msg),
            CliError::CodecUnavailable(msg) => write!(f, "Codec unavailable: {}", msg),
            CliError::StreamError(msg) => write!(f, "Stream error: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::DeviceNotFound(_) => 3,
            CliError::CodecUnavailable(_) => 4,
            CliError::StreamError(_) => 5,
            CliError::General(_) => 1,
        }
    }
}

/// Map videograb::Error to CliError by failure class
impl From<videograb::Error> for CliError {
    fn from(err: videograb::Error) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => CliError::InvalidArgs(msg),
            ErrorKind::Device => CliError::DeviceNotFound(msg),
            ErrorKind::Codec => CliError::CodecUnavailable(msg),
            ErrorKind::Protocol => CliError::StreamError(msg),
            ErrorKind::Resource | ErrorKind::Read => CliError::General(msg),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::General(format!("I/O error: {}", err))
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use videograb::{CodecId, Error};

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InvalidArgs("test".into()).code(), 2);
        assert_eq!(CliError::DeviceNotFound("test".into()).code(), 3);
        assert_eq!(CliError::CodecUnavailable("test".into()).code(), 4);
        assert_eq!(CliError::StreamError("test".into()).code(), 5);
        assert_eq!(CliError::General("test".into()).code(), 1);
    }

    #[test]
    fn test_library_error_mapping() {
        let not_found = || io::Error::from(io::ErrorKind::NotFound);

        let err = CliError::from(Error::InputFormatNotFound("dshow".into()));
        assert!(matches!(err, CliError::InvalidArgs(_)));

        let err = CliError::from(Error::DeviceOpen("/dev/video0".into(), not_found()));
        assert!(matches!(err, CliError::DeviceNotFound(ref msg) if msg.contains("/dev/video0")));

        let err = CliError::from(Error::DecoderNotFound(CodecId::Hevc));
        assert!(matches!(err, CliError::CodecUnavailable(_)));

        let err = CliError::from(Error::NoVideoStream);
        assert!(matches!(err, CliError::StreamError(_)));

        let err = CliError::from(Error::Read(not_found()));
        assert!(matches!(err, CliError::General(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CliError::DeviceNotFound("/dev/video0".to_string());
        assert_eq!(format!("{}", err), "Device unavailable: /dev/video0");
    }
}
