//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `3`: Nothing found (empty search, empty index)
//! - `6`: Configuration error
//! - `9`: A refresh was already running
//! - `126-255`: Reserved by shell

use crate::error::StartupError;
use crate::refresh::RefreshOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Command ran but found nothing (code 3)
    NotFound = 3,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Refresh requested while another was running (code 9)
    RefreshInProgress = 9,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// `Success` if anything was returned, `NotFound` if empty.
    pub fn from_results<T>(results: &[T]) -> Self {
        if results.is_empty() {
            ExitCode::NotFound
        } else {
            ExitCode::Success
        }
    }

    pub fn from_refresh(outcome: &RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Succeeded { .. } => ExitCode::Success,
            RefreshOutcome::AlreadyRunning => ExitCode::RefreshInProgress,
            RefreshOutcome::Failed { .. } => ExitCode::GeneralError,
        }
    }

    pub fn from_startup_error(error: &StartupError) -> Self {
        match error {
            StartupError::Config(_) | StartupError::Vector(_) => ExitCode::ConfigError,
            StartupError::Encoder(_) | StartupError::Catalog(_) => ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::NotFound => "Not found",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::RefreshInProgress => "Refresh already in progress",
        }
    }
}
