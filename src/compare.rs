//! Compares captured engine output against golden fixtures.
//!
//! Text kinds (annotation, python) use a line-based structural diff and
//! report only the changed lines. The binary kind compares whole-file
//! SHA-256 digests and reports a single non-detailed mismatch. Fix mode
//! is applied by the caller after the comparison decision.

use std::fs;
use std::path::Path;

use difference::{Changeset, Difference};
use sha2::{Digest, Sha256};

use crate::errors::{HarnessError, Result};
use crate::spec::OutputKind;

/// Outcome of one fixture comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Match,
    /// Changed lines only, `-` for fixture side, `+` for capture side.
    TextDiff(Vec<String>),
    BinaryMismatch,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compares `capture` against `fixture` using the strategy for `kind`.
pub fn compare(kind: OutputKind, fixture: &Path, capture: &Path) -> Result<Comparison> {
    match kind {
        OutputKind::Annotation | OutputKind::Python => {
            let expected = read_text(fixture)?;
            let actual = read_text(capture)?;
            let diff = diff_text(&expected, &actual);
            if diff.is_empty() {
                Ok(Comparison::Match)
            } else {
                Ok(Comparison::TextDiff(diff))
            }
        }
        OutputKind::Binary => {
            if file_digest(fixture)? == file_digest(capture)? {
                Ok(Comparison::Match)
            } else {
                Ok(Comparison::BinaryMismatch)
            }
        }
        other => Err(HarnessError::Comparison(format!(
            "unsupported output type '{other}'"
        ))),
    }
}

/// Line diff of `expected` vs `actual`: changed lines only, right-trimmed,
/// prefixed `-` (expected side) or `+` (actual side). Empty means match.
pub fn diff_text(expected: &str, actual: &str) -> Vec<String> {
    let changeset = Changeset::new(expected, actual, "\n");
    let mut lines = Vec::new();
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(_) => {}
            Difference::Rem(chunk) => {
                for line in chunk.split('\n') {
                    lines.push(format!("-{}", line.trim_end()));
                }
            }
            Difference::Add(chunk) => {
                for line in chunk.split('\n') {
                    lines.push(format!("+{}", line.trim_end()));
                }
            }
        }
    }
    lines
}

/// Overwrites the fixture with the captured bytes. Operator-directed
/// baseline update; the new baseline is not verified.
pub fn fix_fixture(fixture: &Path, capture: &Path) -> Result<()> {
    fs::copy(capture, fixture)?;
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        HarnessError::Comparison(format!("cannot read '{}': {e}", path.display()))
    })
}

fn file_digest(path: &Path) -> Result<[u8; 32]> {
    let bytes = fs::read(path)
        .map_err(|e| HarnessError::Comparison(format!("cannot read '{}': {e}", path.display())))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().into())
}
