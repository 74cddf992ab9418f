//! CLI-specific error types and exit codes.

use speakline_core::{SettingsError, SynthesisError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or input error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (stdin unreadable, output path unusable).
    #[error("IO error: {0}")]
    Io(String),

    /// Settings could not be loaded or are invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The synthesis engine could not be reached.
    #[error("Engine unavailable: {0}")]
    Engine(String),

    /// One or more speech requests failed.
    #[error("{failed} of {total} speech request(s) failed")]
    Speech { failed: usize, total: usize },

    /// Interrupted by the user.
    #[error("Interrupted")]
    Interrupted,
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Speech { .. } => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Engine(_) => 69,   // EX_UNAVAILABLE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Interrupted => 130,
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SynthesisError> for CliError {
    fn from(err: SynthesisError) -> Self {
        Self::Engine(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Exit code for an error returned from a command.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_sysexits() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::Config("x".into()).exit_code(), 78);
        assert_eq!(CliError::Speech { failed: 1, total: 2 }.exit_code(), 1);
    }

    #[test]
    fn settings_errors_are_config_errors() {
        let err: CliError = SettingsError::InvalidConcurrency(0).into();
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn unknown_errors_exit_with_one() {
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), 1);
        assert_eq!(exit_code_for(&CliError::Interrupted.into()), 130);
    }
}
