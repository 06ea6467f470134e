//! Resolves user-supplied selectors against parsed test cases.
//!
//! A selector has the form `module[/case[/type[/class]]]` and is applied
//! strictly after parsing: the case segment filters cases by name, the
//! type and class segments narrow each surviving case's assertion list.
//! A selector that matches nothing narrows to an empty set; only an
//! unknown *module* is treated as an error, by the caller.

use std::str::FromStr;

use crate::errors::{HarnessError, Result};
use crate::spec::{OutputKind, TestCase};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub module: String,
    pub case: Option<String>,
    pub kind: Option<OutputKind>,
    pub class: Option<String>,
}

impl Selector {
    /// Selects every case of a module.
    pub fn module(name: impl Into<String>) -> Self {
        Self {
            module: name.into(),
            ..Self::default()
        }
    }

    /// Narrows `cases` to the requested subset. Cases whose assertion
    /// list narrows to empty are dropped entirely.
    pub fn narrow(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        cases
            .into_iter()
            .filter(|case| match &self.case {
                Some(name) => case.name == *name,
                None => true,
            })
            .filter_map(|mut case| {
                case.outputs.retain(|out| {
                    self.kind.map_or(true, |k| out.kind == k)
                        && self
                            .class
                            .as_deref()
                            .map_or(true, |c| out.class.as_deref() == Some(c))
                });
                (!case.outputs.is_empty()).then_some(case)
            })
            .collect()
    }
}

impl FromStr for Selector {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self> {
        let mut segments = raw.split('/');
        let module = match segments.next() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => {
                return Err(HarnessError::Environment(format!(
                    "invalid selector '{raw}': empty module name"
                )));
            }
        };
        let case = segments.next().map(str::to_string);
        let kind = segments
            .next()
            .map(|k| {
                k.parse::<OutputKind>().map_err(|reason| {
                    HarnessError::Environment(format!("invalid selector '{raw}': {reason}"))
                })
            })
            .transpose()?;
        let class = segments.next().map(str::to_string);
        if segments.next().is_some() {
            return Err(HarnessError::Environment(format!(
                "invalid selector '{raw}': too many segments"
            )));
        }
        Ok(Self {
            module,
            case,
            kind,
            class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn sample_cases() -> Vec<TestCase> {
        parse_source(
            "test hello\n\
             protocol-decoder uart\n\
             input uart/hello.sr\n\
             output uart annotation class rx-data match ann_rx\n\
             output uart annotation class tx-data match ann_tx\n\
             output uart python match py\n\
             test goodbye\n\
             protocol-decoder uart\n\
             input uart/goodbye.sr\n\
             output uart binary match bin\n",
            "test.conf",
            "uart",
        )
        .unwrap()
    }

    #[test]
    fn parses_all_segments() {
        let sel: Selector = "uart/hello/annotation/rx-data".parse().unwrap();
        assert_eq!(sel.module, "uart");
        assert_eq!(sel.case.as_deref(), Some("hello"));
        assert_eq!(sel.kind, Some(OutputKind::Annotation));
        assert_eq!(sel.class.as_deref(), Some("rx-data"));
    }

    #[test]
    fn rejects_unknown_output_type() {
        assert!("uart/hello/bogus".parse::<Selector>().is_err());
        assert!("uart/a/annotation/b/c".parse::<Selector>().is_err());
    }

    #[test]
    fn narrowing_is_progressive() {
        let all = Selector::module("uart").narrow(sample_cases());
        assert_eq!(all.len(), 2);

        let by_case: Selector = "uart/hello".parse().unwrap();
        let cases = by_case.narrow(sample_cases());
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].outputs.len(), 3);

        let by_kind: Selector = "uart/hello/annotation".parse().unwrap();
        let cases = by_kind.narrow(sample_cases());
        assert_eq!(cases[0].outputs.len(), 2);

        let by_class: Selector = "uart/hello/annotation/rx-data".parse().unwrap();
        let cases = by_class.narrow(sample_cases());
        assert_eq!(cases[0].outputs.len(), 1);
        assert_eq!(cases[0].outputs[0].fixture.as_deref(), Some("ann_rx"));
    }

    #[test]
    fn nonexistent_case_narrows_to_empty_without_error() {
        let sel: Selector = "uart/no_such_case".parse().unwrap();
        assert!(sel.narrow(sample_cases()).is_empty());
    }

    #[test]
    fn unmatched_class_drops_the_case() {
        let sel: Selector = "uart/goodbye/binary/rx-data".parse().unwrap();
        assert!(sel.narrow(sample_cases()).is_empty());
    }
}
