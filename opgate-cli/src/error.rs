//! CLI-specific error types and exit code mapping

use opgate_core::error::{ConfigError, OpgateError};
use opgate_core::pass::RunError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to the documented exit statuses.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A pass failed or the selection was rejected.
    #[error("{0}")]
    Run(#[from] RunError),

    /// Domain error outside of a pass.
    #[error("{0}")]
    Core(#[from] OpgateError),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Tracing subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Core(OpgateError::Config(e))
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success                                   |
    /// | 1    | General / command error                   |
    /// | 2    | Configuration error                       |
    /// | 3    | Verification found non-conforming files   |
    /// | 4    | Build failed                              |
    /// | 5    | Missing capability                        |
    /// | 6    | Provisioning failed                       |
    /// | 7    | Authorization setup failed                |
    /// | 130  | Interrupted                               |
    /// | *    | Test runner's own status (1 if none)      |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Run(RunError::Selection(_)) => 2,
            Self::Run(RunError::PassFailed { source, .. }) => exit_code_for(source),
            Self::Core(e) => exit_code_for(e),
            Self::Command(_) | Self::JsonSerialize(_) | Self::Io(_) | Self::Logging(_) => 1,
        }
    }

    /// The pass that failed, if any.
    pub fn failed_pass(&self) -> Option<&str> {
        match self {
            Self::Run(RunError::PassFailed { pass, .. }) => Some(pass),
            _ => None,
        }
    }
}

/// Exit code for a domain error class.
pub fn exit_code_for(err: &OpgateError) -> i32 {
    match err {
        OpgateError::Config(_) => 2,
        OpgateError::Verification { .. } => 3,
        OpgateError::Build { .. } => 4,
        OpgateError::MissingCapability { .. } => 5,
        OpgateError::Provision(_) => 6,
        OpgateError::Setup(_) => 7,
        OpgateError::Interrupted { .. } => 130,
        OpgateError::Test { status, .. } => status.filter(|s| *s != 0).unwrap_or(1),
        OpgateError::Io(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_failed(source: OpgateError) -> CliError {
        CliError::Run(RunError::PassFailed {
            pass: "unit".to_owned(),
            source,
        })
    }

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_unknown_pass_is_config() {
        let err = CliError::Run(RunError::Selection(ConfigError::UnknownPass {
            name: "lint".to_owned(),
            known: vec!["build".to_owned()],
        }));
        assert_eq!(err.exit_code(), 2);
        assert!(err.failed_pass().is_none());
    }

    #[test]
    fn test_exit_code_per_error_class() {
        let cases = [
            (
                OpgateError::Verification {
                    step: "gofmt".to_owned(),
                    findings: vec!["pkg/a.go".to_owned()],
                },
                3,
            ),
            (
                OpgateError::Build {
                    step: "operator".to_owned(),
                    reason: "exit 2".to_owned(),
                },
                4,
            ),
            (
                OpgateError::MissingCapability {
                    capability: "go".to_owned(),
                    reason: "not found".to_owned(),
                },
                5,
            ),
            (OpgateError::Provision("pull failed".to_owned()), 6),
            (OpgateError::Setup("binding forbidden".to_owned()), 7),
            (
                OpgateError::Interrupted {
                    signal: "SIGINT".to_owned(),
                },
                130,
            ),
            (
                OpgateError::Config(ConfigError::MissingValue {
                    field: "operator.image".to_owned(),
                    env: "OPGATE_OPERATOR_IMAGE".to_owned(),
                }),
                2,
            ),
        ];
        for (source, expected) in cases {
            let err = pass_failed(source);
            assert_eq!(err.exit_code(), expected, "wrong exit code for {err}");
            assert_eq!(err.failed_pass(), Some("unit"));
        }
    }

    #[test]
    fn test_exit_code_test_failure_uses_runner_status() {
        let err = pass_failed(OpgateError::Test {
            step: "e2e-fast".to_owned(),
            status: Some(42),
        });
        assert_eq!(err.exit_code(), 42);

        let err = pass_failed(OpgateError::Test {
            step: "e2e-fast".to_owned(),
            status: None,
        });
        assert_eq!(err.exit_code(), 1, "signal-killed runner maps to 1");
    }

    #[test]
    fn test_exit_code_command_and_io() {
        assert_eq!(CliError::Command("x".to_owned()).exit_code(), 1);
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert_eq!(CliError::Io(io_err).exit_code(), 1);
    }

    #[test]
    fn test_from_config_error() {
        let err: CliError = ConfigError::EmptySelection.into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_error_display_pass_failed() {
        let err = pass_failed(OpgateError::Provision("pull failed".to_owned()));
        let display = err.to_string();
        assert!(display.contains("unit"), "should name the failing pass: {display}");
    }
}
