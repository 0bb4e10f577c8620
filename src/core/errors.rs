//! Configuration error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Fatal error during configuration.
///
/// User errors come from the command line or the host environment and abort
/// the run. Internal errors are defects in the check catalogue (or in code
/// driving the engine) and are presented differently.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ConfigureError {
    #[error("option `--{option}` does not take a value")]
    #[diagnostic(code(autoprobe::option::unexpected_value))]
    OptionTakesNoValue { option: String },

    #[error("option `--{option}` requires a value")]
    #[diagnostic(code(autoprobe::option::missing_value))]
    OptionRequiresValue { option: String },

    #[error("option `--{option}` requires 'yes', 'no', 'auto', or 'default'")]
    #[diagnostic(code(autoprobe::option::invalid_value))]
    InvalidWithValue { option: String, value: String },

    #[error("unknown option: {arg}")]
    #[diagnostic(code(autoprobe::option::unknown))]
    UnknownOption { arg: String },

    #[error("this feature is required: {check}")]
    #[diagnostic(code(autoprobe::check::required))]
    RequiredFeature {
        check: String,
        outcome: String,
        message: Option<String>,
    },

    #[error("unknown feature was force-enabled")]
    #[diagnostic(code(autoprobe::option::unknown_feature))]
    UnknownFeatureForced { features: Vec<String> },

    #[error("`{command}` produced output that is not valid UTF-8")]
    #[diagnostic(code(autoprobe::probe::decode))]
    Decode { command: String },

    #[error("unknown dependency `{name}`")]
    #[diagnostic(code(autoprobe::internal::unknown_dependency))]
    UnknownDependency { name: String },

    #[error("check `{name}` is registered more than once")]
    #[diagnostic(code(autoprobe::internal::duplicate_check))]
    DuplicateCheck { name: String },

    #[error("unknown program `{name}`")]
    #[diagnostic(code(autoprobe::internal::unknown_program))]
    UnknownProgram { name: String },

    #[error("program `{name}` used without a successful check")]
    #[diagnostic(code(autoprobe::internal::program_not_resolved))]
    ProgramNotResolved { name: String },

    #[error("source `{path}` starts with an unknown variable")]
    #[diagnostic(code(autoprobe::internal::source_path))]
    InvalidSourcePath { path: String },

    #[error("flag transaction popped without a matching push")]
    #[diagnostic(code(autoprobe::internal::unbalanced_transaction))]
    UnbalancedTransaction,

    #[error("`{operation}` is not available in help mode")]
    #[diagnostic(code(autoprobe::internal::help_mode))]
    NotRunning { operation: &'static str },
}

impl ConfigureError {
    /// Whether this error is a defect in the check catalogue rather than a
    /// problem with the user's configuration.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ConfigureError::UnknownDependency { .. }
                | ConfigureError::DuplicateCheck { .. }
                | ConfigureError::UnknownProgram { .. }
                | ConfigureError::ProgramNotResolved { .. }
                | ConfigureError::InvalidSourcePath { .. }
                | ConfigureError::UnbalancedTransaction
                | ConfigureError::NotRunning { .. }
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = if self.is_internal() {
            Diagnostic::bug(self.to_string()).with_suggestion(suggestions::FIX_CATALOGUE)
        } else {
            Diagnostic::error(self.to_string())
        };

        if let Some(code) = MietteDiagnostic::code(self) {
            diag = diag.with_code(code.to_string());
        }

        match self {
            ConfigureError::OptionTakesNoValue { .. }
            | ConfigureError::OptionRequiresValue { .. }
            | ConfigureError::UnknownOption { .. } => {
                diag.with_suggestion(suggestions::SEE_HELP)
            }

            ConfigureError::InvalidWithValue { value, .. } => diag
                .with_context(format!("got '{}'", value))
                .with_suggestion(suggestions::SEE_HELP),

            ConfigureError::RequiredFeature {
                outcome, message, ..
            } => {
                diag = diag.with_context(format!("outcome: {}", outcome));
                if let Some(message) = message {
                    diag = diag.with_suggestion(message.clone());
                }
                diag.with_suggestion(suggestions::SEE_LOG)
            }

            ConfigureError::UnknownFeatureForced { features } => diag
                .with_context(format!("unknown features: {}", features.join(", ")))
                .with_suggestion(suggestions::SEE_HELP),

            ConfigureError::Decode { .. } => diag.with_suggestion(suggestions::SEE_LOG),

            _ => diag,
        }
    }
}
