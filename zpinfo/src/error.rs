//! Errors and the exit reporter.

use std::process::ExitCode;
use zp_client::ZpError;

/// Everything that can end a zpinfo run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad command line; also carries help and version requests
    #[error(transparent)]
    Usage(#[from] clap::Error),

    /// Malformed `ZPINFO_*` environment setting
    #[error("configuration: {0}")]
    Config(String),

    /// The device did not answer in time
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    /// The device answered, but not with what was expected
    #[error("{0}")]
    Protocol(String),

    /// The event listener failed to start
    #[error("listener: {0}")]
    Listener(String),

    /// Releasing the subscription failed during shutdown
    #[error("close failed: {0}")]
    Close(String),

    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("cannot format JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this error.
    ///
    /// Help and version requests exit 0, usage errors 2, everything else 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(e) => u8::try_from(e.exit_code()).unwrap_or(2),
            _ => 1,
        }
    }
}

impl From<ZpError> for Error {
    fn from(error: ZpError) -> Self {
        match error {
            ZpError::Unreachable { .. } => Error::DeviceUnreachable(error.to_string()),
            ZpError::Listener(_) | ZpError::NotListening => Error::Listener(error.to_string()),
            ZpError::Unsubscribe { .. } => Error::Close(error.to_string()),
            _ => Error::Protocol(error.to_string()),
        }
    }
}

/// Report a fatal error and turn it into the process exit status.
///
/// Usage errors print clap's own text (help and version go to stdout,
/// usage problems to stderr). Everything else is logged, never printed on
/// stdout.
pub fn report(error: Error) -> ExitCode {
    let code = error.exit_code();
    match error {
        Error::Usage(e) => {
            let _ = e.print();
        }
        other => tracing::error!("{other}"),
    }
    ExitCode::from(code)
}
