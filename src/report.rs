//! Renders run results and coverage summaries.
//!
//! Report artifacts are plain text: an error block, a diff block, and a
//! coverage block per result, blank-line separated. A clean result with
//! no coverage produces nothing. Artifacts go to one file per test case
//! (path separators replaced by underscores) under the report directory,
//! or to stdout when none is configured. The console summary is separate
//! and always printed in run mode.

use std::fs;
use std::io::Write as _;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::Config;
use crate::coverage::ModuleCoverageSummary;
use crate::errors::Result;
use crate::runner::RunResult;

pub struct Reporter<'a> {
    config: &'a Config,
}

impl<'a> Reporter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Emits the artifact for one test case, covering all its assertion
    /// results. Nothing is written when every result is clean and no
    /// coverage was collected.
    pub fn emit_case(&self, case: &str, results: &[RunResult]) -> Result<()> {
        let blocks: Vec<String> = results
            .iter()
            .filter(|r| r.case == case)
            .filter_map(render_result)
            .collect();
        if blocks.is_empty() {
            return Ok(());
        }
        self.emit(&sanitize(case), &blocks.join("\n"))
    }

    /// Emits the per-module coverage summary artifact.
    pub fn emit_coverage(&self, summary: &ModuleCoverageSummary) -> Result<()> {
        let name = format!("{}_coverage", sanitize(&summary.module));
        self.emit(&name, &summary.render())
    }

    fn emit(&self, artifact: &str, text: &str) -> Result<()> {
        match &self.config.report_dir {
            Some(dir) => {
                fs::write(dir.join(artifact), text)?;
            }
            None => print!("{text}"),
        }
        Ok(())
    }

    /// Colored console summary over all results of the run.
    pub fn summary(&self, results: &[RunResult]) {
        let choice = if self.config.use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        let mut stderr = StandardStream::stderr(choice);
        let failed: Vec<&RunResult> = results.iter().filter(|r| !r.passed()).collect();
        for result in &failed {
            let tag = if result.error.is_some() { "ERROR" } else { "DIFF" };
            let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
            let _ = write!(stderr, "{tag}");
            let _ = stderr.reset();
            let _ = writeln!(stderr, ": {} ({})", result.case, result.assertion);
        }
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
        let _ = write!(stderr, "{} passed", results.len() - failed.len());
        let _ = stderr.reset();
        let _ = writeln!(stderr, ", {} failed, {} total", failed.len(), results.len());
    }
}

/// Renders one result into its report blocks, or `None` when there is
/// nothing to report.
fn render_result(result: &RunResult) -> Option<String> {
    let mut blocks = Vec::new();
    if let Some(error) = &result.error {
        blocks.push(format!(
            "error in {} ({}):\n{}\n",
            result.case, result.assertion, error
        ));
    }
    if !result.diff.is_empty() {
        blocks.push(format!(
            "diff for {} ({}):\n{}\n",
            result.case,
            result.assertion,
            result.diff.join("\n")
        ));
    }
    if !result.coverage.is_empty() {
        let lines: Vec<String> = result
            .coverage
            .iter()
            .map(|c| {
                format!(
                    "coverage {}: {} of {} lines missed",
                    c.scope, c.missed, c.lines
                )
            })
            .collect();
        blocks.push(format!("coverage for {}:\n{}\n", result.case, lines.join("\n")));
    }
    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n"))
    }
}

/// Qualified case names become file names: path separators turn into
/// underscores.
fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageRecord;

    fn result(case: &str, error: Option<&str>, diff: &[&str]) -> RunResult {
        RunResult {
            case: case.to_string(),
            assertion: "uart/annotation".to_string(),
            error: error.map(str::to_string),
            diff: diff.iter().map(|s| s.to_string()).collect(),
            coverage: Vec::new(),
        }
    }

    #[test]
    fn clean_result_renders_nothing() {
        assert!(render_result(&result("uart/hello", None, &[])).is_none());
    }

    #[test]
    fn blocks_are_blank_line_separated() {
        let mut r = result("uart/hello", Some("boom"), &["-a", "+b"]);
        r.coverage.push(CoverageRecord {
            scope: "uart".to_string(),
            lines: 10,
            missed: 2,
            missed_lines: vec![],
        });
        let text = render_result(&r).unwrap();
        assert!(text.contains("error in uart/hello"));
        assert!(text.contains("\n\ndiff for uart/hello"));
        assert!(text.contains("\n\ncoverage for uart/hello"));
        assert!(text.contains("-a\n+b"));
    }

    #[test]
    fn artifact_names_replace_path_separators() {
        assert_eq!(sanitize("uart/hello"), "uart_hello");
    }

    #[test]
    fn report_dir_gets_one_file_per_case() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            report_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let reporter = Reporter::new(&config);
        let results = vec![
            result("uart/hello", None, &["-x", "+y"]),
            result("uart/other", None, &[]),
        ];
        reporter.emit_case("uart/hello", &results).unwrap();
        reporter.emit_case("uart/other", &results).unwrap();

        let written = std::fs::read_to_string(dir.path().join("uart_hello")).unwrap();
        assert!(written.contains("+y"));
        assert!(!dir.path().join("uart_other").exists());
    }
}
