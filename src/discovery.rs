//! Locates spec documents on disk.
//!
//! Each decoder module keeps its test definitions in a `test.conf` file
//! inside a directory named after the module; fixtures live next to it.
//! The scan is recursive and the result is sorted by module name so that
//! execution (and coverage folding) order is deterministic.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{HarnessError, Result};

/// File name of a module's test definition document.
pub const SPEC_FILE: &str = "test.conf";

/// One discovered spec document and the module it belongs to.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    pub module: String,
    pub path: PathBuf,
}

impl SpecDocument {
    /// Directory the document lives in; fixtures are resolved against it.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// Recursively scans `root` for spec documents.
pub fn discover_documents(root: &Path) -> Result<Vec<SpecDocument>> {
    if !root.is_dir() {
        return Err(HarnessError::Environment(format!(
            "test definition directory '{}' not found",
            root.display()
        )));
    }
    let mut docs = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            HarnessError::Environment(format!("failed to walk '{}': {e}", root.display()))
        })?;
        if !entry.file_type().is_file() || entry.file_name() != SPEC_FILE {
            continue;
        }
        let Some(module) = entry
            .path()
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
        else {
            continue;
        };
        docs.push(SpecDocument {
            module,
            path: entry.path().to_path_buf(),
        });
    }
    docs.sort_by(|a, b| a.module.cmp(&b.module));
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_documents_sorted_by_module() {
        let root = tempfile::tempdir().unwrap();
        for module in ["uart", "i2c", "spi"] {
            let dir = root.path().join(module);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(SPEC_FILE), "").unwrap();
        }
        fs::write(root.path().join("README"), "not a spec").unwrap();

        let docs = discover_documents(root.path()).unwrap();
        let modules: Vec<&str> = docs.iter().map(|d| d.module.as_str()).collect();
        assert_eq!(modules, vec!["i2c", "spi", "uart"]);
        assert_eq!(docs[0].dir(), root.path().join("i2c"));
    }

    #[test]
    fn missing_root_is_an_environment_error() {
        let err = discover_documents(Path::new("/no/such/dir")).unwrap_err();
        assert!(matches!(err, HarnessError::Environment(_)));
    }
}
