pub use crate::errors::{HarnessError, Result};

pub mod cli;
pub mod compare;
pub mod config;
pub mod coverage;
pub mod discovery;
pub mod errors;
pub mod parser;
pub mod report;
pub mod runner;
pub mod selector;
pub mod spec;
