//! Coverage record parsing and per-module aggregation.
//!
//! The engine reports statistics on stdout as `tag: key=value ...` lines.
//! The `coverage` series carries one record per decoding scope and run:
//! total line count, missed count, and optionally the missed `file:line`
//! tokens as a comma list. Records for companion decoders (present only
//! to complete the pipeline) are excluded from a module's fold.
//!
//! A line is "permanently missed" only when every folded run missed it;
//! a line covered by any single run counts as covered overall.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

/// Series tag carrying coverage records.
pub const COVERAGE_TAG: &str = "coverage";

static SERIES_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):\s+(.+)$").unwrap());

/// Groups `tag: key=value ...` stdout lines into named series. Lines that
/// do not match the shape are ignored; tokens without `=` are skipped.
pub fn parse_series(stdout: &str) -> BTreeMap<String, Vec<BTreeMap<String, String>>> {
    let mut series: BTreeMap<String, Vec<BTreeMap<String, String>>> = BTreeMap::new();
    for line in stdout.lines() {
        let Some(caps) = SERIES_LINE.captures(line.trim_end()) else {
            continue;
        };
        let fields = caps[2]
            .split_whitespace()
            .filter_map(|tok| tok.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        series.entry(caps[1].to_string()).or_default().push(fields);
    }
    series
}

/// One run's coverage for one decoding scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageRecord {
    pub scope: String,
    pub lines: u64,
    pub missed: u64,
    /// `file:line` tokens missed in this run.
    pub missed_lines: Vec<String>,
}

/// Extracts coverage records from engine stdout. Records without a scope
/// or an unparsable line count are dropped.
pub fn coverage_records(stdout: &str) -> Vec<CoverageRecord> {
    let mut series = parse_series(stdout);
    series
        .remove(COVERAGE_TAG)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|fields| {
            let scope = fields.get("scope")?.clone();
            let lines = fields.get("lines")?.parse().ok()?;
            let missed = fields
                .get("missed")
                .and_then(|m| m.parse().ok())
                .unwrap_or(0);
            let missed_lines = fields
                .get("missed_lines")
                .map(|raw| {
                    raw.split(',')
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some(CoverageRecord {
                scope,
                lines,
                missed,
                missed_lines,
            })
        })
        .collect()
}

/// Coverage for one module, folded over every run of its test session.
#[derive(Debug, Clone)]
pub struct ModuleCoverageSummary {
    pub module: String,
    pub total_lines: u64,
    /// Number of records folded in.
    pub runs: usize,
    /// Per-token miss frequency across the folded records.
    freq: BTreeMap<String, usize>,
}

impl ModuleCoverageSummary {
    /// Folds the records whose scope equals `module`. Returns `None` when
    /// no run reported coverage for the module.
    pub fn fold(module: &str, records: &[CoverageRecord]) -> Option<Self> {
        let filtered: Vec<&CoverageRecord> =
            records.iter().filter(|r| r.scope == module).collect();
        let first = filtered.first()?;
        // All records of one module agree on the total; any one will do.
        let total_lines = first.lines;
        let mut freq: BTreeMap<String, usize> = BTreeMap::new();
        for record in &filtered {
            for token in &record.missed_lines {
                *freq.entry(token.clone()).or_insert(0) += 1;
            }
        }
        Some(Self {
            module: module.to_string(),
            total_lines,
            runs: filtered.len(),
            freq,
        })
    }

    /// Tokens missed in every folded run.
    pub fn permanently_missed(&self) -> Vec<&str> {
        self.freq
            .iter()
            .filter(|(_, &count)| count == self.runs)
            .map(|(token, _)| token.as_str())
            .collect()
    }

    pub fn percent(&self) -> f64 {
        if self.total_lines == 0 {
            return 100.0;
        }
        100.0 * (1.0 - self.permanently_missed().len() as f64 / self.total_lines as f64)
    }

    /// Renders the per-module summary artifact: headline, then the
    /// permanently missed lines grouped by file, line numbers ascending.
    pub fn render(&self) -> String {
        let missed = self.permanently_missed();
        let mut text = format!(
            "coverage for {}: {:.1}% ({} of {} lines missed in all {} runs)\n",
            self.module,
            self.percent(),
            missed.len(),
            self.total_lines,
            self.runs,
        );
        let mut by_file: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
        for token in missed {
            let (file, line) = token.rsplit_once(':').unwrap_or((token, "0"));
            let line: u64 = line.parse().unwrap_or(0);
            by_file.entry(file).or_default().push(line);
        }
        for (file, mut lines) in by_file {
            lines.sort_unstable();
            let rendered: Vec<String> = lines.iter().map(u64::to_string).collect();
            let _ = writeln!(text, "  {}: {}", file, rendered.join(", "));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(scope: &str, lines: u64, missed: &[&str]) -> CoverageRecord {
        CoverageRecord {
            scope: scope.to_string(),
            lines,
            missed: missed.len() as u64,
            missed_lines: missed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn series_lines_group_by_tag() {
        let stdout = "decoding uart/hello.sr\n\
                      coverage: scope=uart lines=62 missed=5 missed_lines=pd.py:10,pd.py:11\n\
                      timing: phase=decode millis=12\n\
                      coverage: scope=spi lines=40 missed=0\n";
        let series = parse_series(stdout);
        assert_eq!(series["coverage"].len(), 2);
        assert_eq!(series["timing"].len(), 1);
        assert_eq!(series["coverage"][0]["scope"], "uart");
    }

    #[test]
    fn records_for_other_scopes_are_excluded_from_fold() {
        let records = vec![
            record("uart", 62, &["pd.py:10"]),
            record("spi", 40, &["pd.py:1"]),
        ];
        let summary = ModuleCoverageSummary::fold("uart", &records).unwrap();
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.total_lines, 62);
        assert_eq!(summary.permanently_missed(), vec!["pd.py:10"]);
    }

    #[test]
    fn identical_runs_keep_the_full_missed_set() {
        let missed = ["pd.py:10", "pd.py:40"];
        let records = vec![
            record("uart", 62, &missed),
            record("uart", 62, &missed),
            record("uart", 62, &missed),
        ];
        let summary = ModuleCoverageSummary::fold("uart", &records).unwrap();
        assert_eq!(summary.permanently_missed(), vec!["pd.py:10", "pd.py:40"]);
    }

    #[test]
    fn a_line_covered_by_any_run_is_covered_overall() {
        let records = vec![
            record("uart", 62, &["pd.py:10", "pd.py:40"]),
            record("uart", 62, &["pd.py:40"]),
        ];
        let summary = ModuleCoverageSummary::fold("uart", &records).unwrap();
        assert_eq!(summary.permanently_missed(), vec!["pd.py:40"]);
    }

    #[test]
    fn percent_counts_only_permanent_misses() {
        let records = vec![
            record("uart", 10, &["pd.py:1", "pd.py:2"]),
            record("uart", 10, &["pd.py:2"]),
        ];
        let summary = ModuleCoverageSummary::fold("uart", &records).unwrap();
        assert!((summary.percent() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_matching_records_folds_to_none() {
        let records = vec![record("spi", 40, &[])];
        assert!(ModuleCoverageSummary::fold("uart", &records).is_none());
    }

    #[test]
    fn render_groups_by_file_and_sorts_numerically() {
        let records = vec![record(
            "uart",
            100,
            &["pd.py:40", "pd.py:9", "lists.py:2"],
        )];
        let summary = ModuleCoverageSummary::fold("uart", &records).unwrap();
        let rendered = summary.render();
        assert!(rendered.contains("lists.py: 2\n"));
        // 9 sorts before 40 numerically, not lexically.
        assert!(rendered.contains("pd.py: 9, 40\n"));
    }
}
