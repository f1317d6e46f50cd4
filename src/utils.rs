use std::io;
use thiserror::Error;

use crate::interpreter::InterpretError;
use crate::parser::SyntaxError;
use crate::validator::Diagnostic;

/// Error type shared by the crate
#[derive(Error, Debug)]
pub enum AdlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Interpretation failed: {0}")]
    Interpret(#[from] InterpretError),

    #[error("Architecture has {} semantic error(s)", .0.len())]
    Invalid(Vec<Diagnostic>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown non-terminal: {0}")]
    UnknownNonTerminal(String),

    #[error("Empty production for: {0}")]
    EmptyProduction(String),
}

/// Result type for crate operations
pub type Result<T> = std::result::Result<T, AdlError>;

/// Trait extension for Option<T> to convert to AdlError
pub trait OptionExt<T> {
    fn ok_or_unknown<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| AdlError::UnknownNonTerminal(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::DiagnosticKind;

    #[test]
    fn test_invalid_counts_diagnostics() {
        let err = AdlError::Invalid(vec![Diagnostic {
            kind: DiagnosticKind::Value,
            message: "bad".to_string(),
            line: 1,
            column: 2,
        }]);
        assert_eq!(err.to_string(), "Architecture has 1 semantic error(s)");
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<u8> = None;
        let err = missing.ok_or_unknown(|| "ann".to_string()).unwrap_err();
        assert!(matches!(err, AdlError::UnknownNonTerminal(ref s) if s == "ann"));
    }
}
