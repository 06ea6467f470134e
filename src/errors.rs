//! Unified error taxonomy for the harness.
//!
//! Parse failures (`SpecSyntax`, `SpecStructure`) are scoped to one spec
//! document: callers log them and continue with the remaining documents.
//! Engine and comparison failures are captured into the owning assertion's
//! `RunResult` and never abort sibling assertions. Only `Environment`
//! failures are fatal, and only before any execution has started.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    /// A malformed directive line. Aborts the whole document.
    #[error("{file}:{line}: {reason}")]
    #[diagnostic(code(sigtest::spec::syntax))]
    SpecSyntax {
        file: String,
        line: usize,
        reason: String,
    },

    /// A test case that parsed but violates the structural invariants.
    /// Aborts the whole document.
    #[error("test case '{case}' in {file}: {reason}")]
    #[diagnostic(code(sigtest::spec::structure))]
    SpecStructure {
        file: String,
        case: String,
        reason: String,
    },

    /// The decode engine could not be spawned or reported a failure.
    #[error("decode engine: {0}")]
    #[diagnostic(code(sigtest::engine))]
    EngineInvocation(String),

    /// Captured output could not be compared against its fixture.
    #[error("comparison: {0}")]
    #[diagnostic(code(sigtest::compare))]
    Comparison(String),

    /// A required directory or module is missing. Fatal before execution.
    #[error("{0}")]
    #[diagnostic(code(sigtest::environment))]
    Environment(String),

    #[error(transparent)]
    #[diagnostic(code(sigtest::io))]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn syntax(file: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::SpecSyntax {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn structure(
        file: impl Into<String>,
        case: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SpecStructure {
            file: file.into(),
            case: case.into(),
            reason: reason.into(),
        }
    }

}

/// Renders an error with full miette diagnostics to stderr.
pub fn print_error(error: HarnessError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
