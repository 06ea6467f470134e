//! Harness configuration.
//!
//! One immutable [`Config`] is built from the command line and threaded
//! explicitly through every entry point. Nothing reads ambient process
//! state after startup.

use std::path::PathBuf;

/// Configuration for one harness invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Decode engine executable.
    pub engine: PathBuf,
    /// Root directory of per-module test definition documents.
    pub tests_dir: PathBuf,
    /// Directory containing recorded capture files.
    pub dumps_dir: PathBuf,
    /// Destination for report artifacts; stdout when unset.
    pub report_dir: Option<PathBuf>,
    /// Overwrite fixtures with captured output on mismatch.
    pub fix: bool,
    /// Collect and fold per-module coverage statistics.
    pub coverage: bool,
    /// Pass the debug flag to the engine and echo its invocations.
    pub debug: bool,
    /// Print extra progress information.
    pub verbose: bool,
    /// Colorize console output.
    pub use_colors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: PathBuf::from("sigrok-cli"),
            tests_dir: PathBuf::from("decoders"),
            dumps_dir: PathBuf::from("dumps"),
            report_dir: None,
            fix: false,
            coverage: false,
            debug: false,
            verbose: false,
            use_colors: atty::is(atty::Stream::Stderr),
        }
    }
}
