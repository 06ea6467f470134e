//! Invokes the external decode engine for each (case, assertion) pair.
//!
//! One [`ModuleSession`] covers all cases of a single module: it owns the
//! shared coverage temp file and collects every assertion's [`RunResult`].
//! Each assertion gets a fresh temp output file; both temp files are
//! removed on every exit path through `tempfile`'s drop guards, including
//! failures inside the comparator.
//!
//! Execution is strictly sequential with no timeout: a non-terminating
//! engine blocks the run. Known limitation.

use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::compare::{self, Comparison};
use crate::config::Config;
use crate::coverage::{self, CoverageRecord, ModuleCoverageSummary};
use crate::errors::{HarnessError, Result};
use crate::spec::{OutputAssertion, OutputKind, TestCase};

const FLAG_DECODER: &str = "--decoder";
const FLAG_CHANNEL: &str = "--channel";
const FLAG_OPTION: &str = "--option";
const FLAG_INITIAL_PIN: &str = "--initial-pin";
const FLAG_INPUT: &str = "--input";
const FLAG_INPUT_FORMAT: &str = "--input-format";
const FLAG_FORMAT_OPTION: &str = "--format-option";
const FLAG_OUTPUT: &str = "--output";
const FLAG_OUTPUT_FILE: &str = "--output-file";
const FLAG_COVERAGE_FILE: &str = "--coverage-file";
const FLAG_DEBUG: &str = "--debug";

/// Engine-level failure line on stderr. The decoder name and message are
/// captured and compared literally against the assertion, never compiled
/// into a pattern, so metacharacters in match text are inert.
static ENGINE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^error from decoder `([^`]+)`: (.*)$").unwrap());

/// Outcome of one assertion run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Qualified `module/case` name.
    pub case: String,
    /// Assertion label, `decoder/kind[/class]`.
    pub assertion: String,
    pub error: Option<String>,
    /// Changed lines for text kinds, or a single summary line for binary.
    pub diff: Vec<String>,
    /// Coverage records parsed from this run's stdout.
    pub coverage: Vec<CoverageRecord>,
}

impl RunResult {
    fn new(case: &TestCase, assertion: &OutputAssertion) -> Self {
        Self {
            case: case.qualified_name(),
            assertion: assertion.label(),
            error: None,
            diff: Vec::new(),
            coverage: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none() && self.diff.is_empty()
    }
}

/// Runs every assertion of one module's test cases against the engine.
pub struct ModuleSession<'a> {
    config: &'a Config,
    module: String,
    /// Directory of the module's spec document; fixtures resolve here.
    doc_dir: PathBuf,
    /// Shared across all assertions of the session, deleted on drop.
    coverage_file: Option<NamedTempFile>,
    results: Vec<RunResult>,
}

impl<'a> ModuleSession<'a> {
    pub fn new(config: &'a Config, module: &str, doc_dir: &Path) -> Result<Self> {
        let coverage_file = if config.coverage {
            Some(NamedTempFile::new()?)
        } else {
            None
        };
        Ok(Self {
            config,
            module: module.to_string(),
            doc_dir: doc_dir.to_path_buf(),
            coverage_file,
            results: Vec::new(),
        })
    }

    /// Runs all assertions of `case` in declaration order.
    pub fn run_case(&mut self, case: &TestCase) {
        for assertion in &case.outputs {
            let result = match self.run_assertion(case, assertion) {
                Ok(result) => result,
                Err(err) => {
                    // Environment and I/O faults become a per-assertion
                    // failure; siblings still run.
                    let mut result = RunResult::new(case, assertion);
                    result.error = Some(err.to_string());
                    result
                }
            };
            self.results.push(result);
        }
    }

    /// Consumes the session: folds coverage and releases the temp file.
    pub fn finish(self) -> (Vec<RunResult>, Option<ModuleCoverageSummary>) {
        let summary = if self.config.coverage {
            let records: Vec<CoverageRecord> = self
                .results
                .iter()
                .flat_map(|r| r.coverage.iter().cloned())
                .collect();
            ModuleCoverageSummary::fold(&self.module, &records)
        } else {
            None
        };
        (self.results, summary)
    }

    fn run_assertion(&self, case: &TestCase, assertion: &OutputAssertion) -> Result<RunResult> {
        let out_file = NamedTempFile::new()?;
        let args = build_args(
            self.config,
            case,
            assertion,
            out_file.path(),
            self.coverage_file.as_ref().map(NamedTempFile::path),
        );
        if self.config.debug || self.config.verbose {
            eprintln!(
                "engine: {} {}",
                self.config.engine.display(),
                args.join(" ")
            );
        }

        let output = Command::new(&self.config.engine)
            .args(&args)
            .output()
            .map_err(|e| {
                HarnessError::EngineInvocation(format!(
                    "failed to spawn '{}': {e}",
                    self.config.engine.display()
                ))
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = RunResult::new(case, assertion);
        result.coverage = coverage::coverage_records(&stdout);

        if !stderr.trim().is_empty() {
            if assertion.kind == OutputKind::Exception
                && is_expected_exception(&stderr, assertion)
            {
                // Expected engine failure; not counted against the run.
                return Ok(result);
            }
            result.error = Some(stderr.trim_end().to_string());
            return Ok(result);
        }
        if !output.status.success() {
            result.error = Some(format!(
                "unknown error, exit code {}",
                output.status.code().unwrap_or(-1)
            ));
            return Ok(result);
        }
        if assertion.kind == OutputKind::Exception {
            result.error = Some(format!(
                "expected error from decoder `{}` did not occur",
                assertion.decoder
            ));
            return Ok(result);
        }

        let Some(fixture_rel) = &assertion.fixture else {
            // No match target: the run itself (and its coverage) is all
            // this assertion contributes.
            return Ok(result);
        };
        let fixture = self.doc_dir.join(fixture_rel);
        match compare::compare(assertion.kind, &fixture, out_file.path()) {
            Ok(Comparison::Match) => {}
            Ok(Comparison::TextDiff(diff)) => {
                result.diff = diff;
                self.maybe_fix(&fixture, out_file.path())?;
            }
            Ok(Comparison::BinaryMismatch) => {
                result.diff = vec![format!(
                    "binary output does not match {}",
                    fixture.display()
                )];
                self.maybe_fix(&fixture, out_file.path())?;
            }
            Err(err) => {
                result.error = Some(err.to_string());
                self.maybe_fix(&fixture, out_file.path())?;
            }
        }
        Ok(result)
    }

    fn maybe_fix(&self, fixture: &Path, capture: &Path) -> Result<()> {
        if self.config.fix {
            compare::fix_fixture(fixture, capture)?;
        }
        Ok(())
    }
}

/// Assembles the engine argument vector for one (case, assertion) pair,
/// in stack order.
fn build_args(
    config: &Config,
    case: &TestCase,
    assertion: &OutputAssertion,
    out_path: &Path,
    coverage_path: Option<&Path>,
) -> Vec<String> {
    let mut args = Vec::new();
    for decoder in &case.decoders {
        args.push(FLAG_DECODER.into());
        args.push(decoder.id.clone());
        for (label, index) in &decoder.channels {
            args.push(FLAG_CHANNEL.into());
            args.push(format!("{label}={index}"));
        }
        for (name, value) in &decoder.options {
            args.push(FLAG_OPTION.into());
            args.push(format!("{name}={value}"));
        }
        for (label, value) in &decoder.initial_pins {
            args.push(FLAG_INITIAL_PIN.into());
            args.push(format!("{label}={value}"));
        }
    }
    args.push(FLAG_INPUT.into());
    args.push(config.dumps_dir.join(&case.input.file).display().to_string());
    if let Some(format) = &case.input.format {
        args.push(FLAG_INPUT_FORMAT.into());
        args.push(format.clone());
        for option in &case.input.format_options {
            args.push(FLAG_FORMAT_OPTION.into());
            args.push(option.clone());
        }
    }
    let mut output = format!("{}:{}", assertion.decoder, assertion.kind);
    if let Some(class) = &assertion.class {
        output.push(':');
        output.push_str(class);
    }
    args.push(FLAG_OUTPUT.into());
    args.push(output);
    args.push(FLAG_OUTPUT_FILE.into());
    args.push(out_path.display().to_string());
    if let Some(coverage) = coverage_path {
        args.push(FLAG_COVERAGE_FILE.into());
        args.push(coverage.display().to_string());
    }
    if config.debug {
        args.push(FLAG_DEBUG.into());
    }
    args
}

/// True when `stderr` carries exactly the engine failure the assertion
/// expects: the anchored failure line naming the assertion's decoder,
/// with a message equal to the assertion's match text.
fn is_expected_exception(stderr: &str, assertion: &OutputAssertion) -> bool {
    let Some(expected) = assertion.fixture.as_deref() else {
        return false;
    };
    let Some(caps) = ENGINE_ERROR.captures(stderr.trim_end()) else {
        return false;
    };
    &caps[1] == assertion.decoder && &caps[2] == expected
}
