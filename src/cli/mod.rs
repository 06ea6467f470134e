//! Command-line entry point and dispatch.
//!
//! Exit codes: 0 clean, 1 one or more engine or comparison errors,
//! 2 no errors but at least one output mismatch.

use std::process;

use clap::Parser;

use crate::cli::args::{Command, SigtestArgs};
use crate::config::Config;
use crate::discovery::{self, SpecDocument};
use crate::errors::{print_error, HarnessError, Result};
use crate::parser;
use crate::report::Reporter;
use crate::runner::{ModuleSession, RunResult};
use crate::selector::Selector;
use crate::spec::TestCase;

pub mod args;

pub fn run() {
    let args = SigtestArgs::parse();
    match dispatch(args) {
        Ok(code) => process::exit(code),
        Err(err) => {
            print_error(err);
            process::exit(1);
        }
    }
}

fn dispatch(args: SigtestArgs) -> Result<i32> {
    let mut config = Config {
        engine: args.engine,
        tests_dir: args.tests_dir,
        dumps_dir: args.dumps_dir,
        debug: args.debug,
        verbose: args.verbose,
        ..Config::default()
    };

    match args.command {
        Command::List { selectors } => {
            for (_, cases) in load_selected(&config, &selectors)? {
                for case in cases {
                    println!("{}", case.qualified_name());
                }
            }
            Ok(0)
        }
        Command::Show { selectors } => {
            for (_, cases) in load_selected(&config, &selectors)? {
                for case in cases {
                    print!("{case}");
                }
            }
            Ok(0)
        }
        Command::Run {
            selectors,
            all,
            fix,
            coverage,
            report_dir,
        } => {
            config.fix = fix;
            config.coverage = coverage;
            config.report_dir = report_dir;
            let selectors = if all { Vec::new() } else { selectors };
            run_tests(&config, &selectors)
        }
    }
}

/// Discovers documents, resolves selectors against them, parses and
/// narrows. A selector naming an unknown module is fatal; a document
/// that fails to parse is logged and contributes zero cases.
fn load_selected(
    config: &Config,
    selectors: &[String],
) -> Result<Vec<(SpecDocument, Vec<TestCase>)>> {
    let docs = discovery::discover_documents(&config.tests_dir)?;

    let wanted: Vec<(SpecDocument, Selector)> = if selectors.is_empty() {
        docs.iter()
            .map(|doc| (doc.clone(), Selector::module(&doc.module)))
            .collect()
    } else {
        let mut wanted = Vec::with_capacity(selectors.len());
        for raw in selectors {
            let selector: Selector = raw.parse()?;
            let Some(doc) = docs.iter().find(|d| d.module == selector.module) else {
                return Err(HarnessError::Environment(format!(
                    "no such module '{}'",
                    selector.module
                )));
            };
            wanted.push((doc.clone(), selector));
        }
        wanted
    };

    let mut selected = Vec::with_capacity(wanted.len());
    for (doc, selector) in wanted {
        let cases = match parser::parse_document(&doc.path, &doc.module) {
            Ok(cases) => cases,
            Err(err) => {
                print_error(err);
                Vec::new()
            }
        };
        selected.push((doc, selector.narrow(cases)));
    }
    Ok(selected)
}

fn run_tests(config: &Config, selectors: &[String]) -> Result<i32> {
    if !config.dumps_dir.is_dir() {
        return Err(HarnessError::Environment(format!(
            "dumps directory '{}' not found",
            config.dumps_dir.display()
        )));
    }
    if let Some(dir) = &config.report_dir {
        if !dir.is_dir() {
            return Err(HarnessError::Environment(format!(
                "report directory '{}' not found",
                dir.display()
            )));
        }
    }

    let selected = load_selected(config, selectors)?;
    let reporter = Reporter::new(config);
    let mut all_results: Vec<RunResult> = Vec::new();

    for (doc, cases) in &selected {
        if cases.is_empty() {
            continue;
        }
        let mut session = ModuleSession::new(config, &doc.module, doc.dir())?;
        for case in cases {
            if config.verbose {
                eprintln!("running {}", case.qualified_name());
            }
            session.run_case(case);
        }
        let (results, summary) = session.finish();
        for case in cases {
            reporter.emit_case(&case.qualified_name(), &results)?;
        }
        if let Some(summary) = summary {
            reporter.emit_coverage(&summary)?;
        }
        all_results.extend(results);
    }

    reporter.summary(&all_results);

    let errors = all_results.iter().filter(|r| r.error.is_some()).count();
    let mismatches = all_results.iter().filter(|r| !r.diff.is_empty()).count();
    Ok(if errors > 0 {
        1
    } else if mismatches > 0 {
        2
    } else {
        0
    })
}
