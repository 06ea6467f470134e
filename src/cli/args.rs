//! Command-line argument surface, declared with `clap` derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sigtest",
    version,
    about = "Regression-test harness for protocol decoders."
)]
pub struct SigtestArgs {
    /// Print extra progress information.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pass the debug flag to the decode engine and echo its invocations.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Decode engine executable to invoke.
    #[arg(long, default_value = "sigrok-cli", global = true)]
    pub engine: PathBuf,

    /// Root directory of per-module test definition documents.
    #[arg(short = 'T', long, default_value = "decoders", global = true)]
    pub tests_dir: PathBuf,

    /// Directory containing recorded capture files.
    #[arg(short = 'D', long, default_value = "dumps", global = true)]
    pub dumps_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the test cases matched by the selectors.
    List {
        /// Selectors of the form module[/case[/type[/class]]]; all
        /// modules when omitted.
        selectors: Vec<String>,
    },
    /// Print the parsed form of the matched test cases.
    Show {
        /// Selectors of the form module[/case[/type[/class]]].
        selectors: Vec<String>,
    },
    /// Run the matched test cases against the decode engine.
    Run {
        /// Selectors of the form module[/case[/type[/class]]].
        selectors: Vec<String>,

        /// Run every discovered test case.
        #[arg(short, long)]
        all: bool,

        /// Overwrite fixtures with the captured output on mismatch.
        #[arg(short, long)]
        fix: bool,

        /// Collect and fold per-module coverage statistics.
        #[arg(short, long)]
        coverage: bool,

        /// Write one report artifact per test case into this directory.
        #[arg(short = 'R', long)]
        report_dir: Option<PathBuf>,
    },
}
