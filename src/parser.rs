//! Parser for the line-oriented test definition format.
//!
//! A document declares one or more test cases:
//!
//! ```text
//! test uart_hello
//! protocol-decoder uart channel rx=0 option baudrate=115200
//! input uart/hello.sr
//! output uart annotation match annotation_rx
//! ```
//!
//! Blank lines and `#` comments are skipped. Parsing is fail-fast per
//! document: any unrecognized keyword, wrong token count, missing `=`, or
//! non-integer index aborts the whole document. After the line pass each
//! accumulated case is checked against the structural invariants; a
//! violation likewise rejects the whole document. Failures never affect
//! other documents.

use std::fs;
use std::path::Path;

use crate::errors::{HarnessError, Result};
use crate::spec::{DecoderSpec, InputSpec, OutputAssertion, OutputKind, TestCase};

const COMMENT_MARKER: char = '#';

/// Parses one spec document from disk. `module` names the decoder module
/// the document belongs to (its parent directory, by convention).
pub fn parse_document(path: &Path, module: &str) -> Result<Vec<TestCase>> {
    let source = fs::read_to_string(path)?;
    parse_source(&source, &path.display().to_string(), module)
}

/// Parses spec source text. `file` is used for diagnostics only.
pub fn parse_source(source: &str, file: &str, module: &str) -> Result<Vec<TestCase>> {
    let mut cases: Vec<CaseBuilder> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let keyword = tokens[0];

        if keyword == "test" {
            if tokens.len() != 2 {
                return Err(HarnessError::syntax(
                    file,
                    line_no,
                    "'test' takes exactly one name",
                ));
            }
            cases.push(CaseBuilder::new(tokens[1]));
            continue;
        }

        let Some(current) = cases.last_mut() else {
            return Err(HarnessError::syntax(
                file,
                line_no,
                format!("'{keyword}' before any 'test' directive"),
            ));
        };

        match keyword {
            "protocol-decoder" => parse_decoder(current, &tokens, file, line_no)?,
            "stack" => parse_stack(current, &tokens, file, line_no)?,
            "input" => parse_input(current, &tokens, file, line_no)?,
            "output" => parse_output(current, &tokens, file, line_no)?,
            other => {
                return Err(HarnessError::syntax(
                    file,
                    line_no,
                    format!("unrecognized directive '{other}'"),
                ));
            }
        }
    }

    cases
        .into_iter()
        .map(|builder| builder.finish(file, module))
        .collect()
}

/// `protocol-decoder <id> [channel <l>=<i>]* [option <n>=<v>]* [initial_pin <l>=<v>]*`
fn parse_decoder(case: &mut CaseBuilder, tokens: &[&str], file: &str, line: usize) -> Result<()> {
    if tokens.len() < 2 {
        return Err(HarnessError::syntax(
            file,
            line,
            "'protocol-decoder' needs a decoder id",
        ));
    }
    let mut decoder = DecoderSpec::new(tokens[1]);
    let mut rest = tokens[2..].chunks_exact(2);
    for pair in rest.by_ref() {
        let (key, value) = key_value(pair[1], file, line)?;
        match pair[0] {
            "channel" => {
                let index: i64 = value.parse().map_err(|_| {
                    HarnessError::syntax(
                        file,
                        line,
                        format!("channel index '{value}' is not an integer"),
                    )
                })?;
                decoder.channels.push((key, index));
            }
            "option" => decoder.options.push((key, value)),
            "initial_pin" => decoder.initial_pins.push((key, value)),
            other => {
                return Err(HarnessError::syntax(
                    file,
                    line,
                    format!("unknown decoder attribute '{other}'"),
                ));
            }
        }
    }
    if !rest.remainder().is_empty() {
        return Err(HarnessError::syntax(
            file,
            line,
            "dangling decoder attribute without a value",
        ));
    }
    case.decoders.push(decoder);
    Ok(())
}

/// `stack <id> <id>...` — reorders previously declared decoders into
/// pipeline order. Every declared decoder must appear exactly once.
fn parse_stack(case: &mut CaseBuilder, tokens: &[&str], file: &str, line: usize) -> Result<()> {
    if tokens.len() < 2 {
        return Err(HarnessError::syntax(
            file,
            line,
            "'stack' needs at least one decoder id",
        ));
    }
    let mut stacked = Vec::with_capacity(tokens.len() - 1);
    for id in &tokens[1..] {
        let Some(pos) = case.decoders.iter().position(|d| d.id == *id) else {
            return Err(HarnessError::syntax(
                file,
                line,
                format!("'stack' names undeclared decoder '{id}'"),
            ));
        };
        stacked.push(case.decoders.remove(pos));
    }
    if let Some(leftover) = case.decoders.first() {
        return Err(HarnessError::syntax(
            file,
            line,
            format!("'stack' omits declared decoder '{}'", leftover.id),
        ));
    }
    case.decoders = stacked;
    Ok(())
}

/// `input <file> [format <id> [option <value>]*]`
fn parse_input(case: &mut CaseBuilder, tokens: &[&str], file: &str, line: usize) -> Result<()> {
    if case.input.is_some() {
        return Err(HarnessError::syntax(
            file,
            line,
            "duplicate 'input' directive",
        ));
    }
    if tokens.len() < 2 {
        return Err(HarnessError::syntax(file, line, "'input' needs a file"));
    }
    let mut input = InputSpec {
        file: tokens[1].to_string(),
        format: None,
        format_options: Vec::new(),
    };
    if tokens.len() > 2 {
        if tokens[2] != "format" || tokens.len() < 4 {
            return Err(HarnessError::syntax(
                file,
                line,
                "'input' only accepts 'format <id> [option <value>]*'",
            ));
        }
        input.format = Some(tokens[3].to_string());
        let mut rest = tokens[4..].chunks_exact(2);
        for pair in rest.by_ref() {
            if pair[0] != "option" {
                return Err(HarnessError::syntax(
                    file,
                    line,
                    format!("unknown input attribute '{}'", pair[0]),
                ));
            }
            input.format_options.push(pair[1].to_string());
        }
        if !rest.remainder().is_empty() {
            return Err(HarnessError::syntax(
                file,
                line,
                "dangling input attribute without a value",
            ));
        }
    }
    case.input = Some(input);
    Ok(())
}

/// `output <decoder-id> <kind> [class <name>] [match <fixture>]`
fn parse_output(case: &mut CaseBuilder, tokens: &[&str], file: &str, line: usize) -> Result<()> {
    if tokens.len() < 3 {
        return Err(HarnessError::syntax(
            file,
            line,
            "'output' needs a decoder id and an output type",
        ));
    }
    let kind: OutputKind = tokens[2]
        .parse()
        .map_err(|reason| HarnessError::syntax(file, line, reason))?;
    let mut assertion = OutputAssertion {
        decoder: tokens[1].to_string(),
        kind,
        class: None,
        fixture: None,
    };
    let mut rest = tokens[3..].chunks_exact(2);
    for pair in rest.by_ref() {
        match pair[0] {
            "class" => assertion.class = Some(pair[1].to_string()),
            "match" => assertion.fixture = Some(pair[1].to_string()),
            other => {
                return Err(HarnessError::syntax(
                    file,
                    line,
                    format!("unknown output attribute '{other}'"),
                ));
            }
        }
    }
    if !rest.remainder().is_empty() {
        return Err(HarnessError::syntax(
            file,
            line,
            "dangling output attribute without a value",
        ));
    }
    case.outputs.push(assertion);
    Ok(())
}

fn key_value(token: &str, file: &str, line: usize) -> Result<(String, String)> {
    match token.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(HarnessError::syntax(
            file,
            line,
            format!("'{token}' is not a key=value pair"),
        )),
    }
}

/// Accumulates one case during the line pass; turned into a validated
/// [`TestCase`] afterwards.
struct CaseBuilder {
    name: String,
    decoders: Vec<DecoderSpec>,
    input: Option<InputSpec>,
    outputs: Vec<OutputAssertion>,
}

impl CaseBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            decoders: Vec::new(),
            input: None,
            outputs: Vec::new(),
        }
    }

    fn finish(self, file: &str, module: &str) -> Result<TestCase> {
        if self.decoders.is_empty() {
            return Err(HarnessError::structure(
                file,
                &self.name,
                "no protocol-decoder declared",
            ));
        }
        let Some(input) = self.input else {
            return Err(HarnessError::structure(file, &self.name, "no input declared"));
        };
        if !self.outputs.iter().any(|o| {
            o.fixture.as_deref().is_some_and(|f| !f.is_empty())
        }) {
            return Err(HarnessError::structure(
                file,
                &self.name,
                "no output with a match target declared",
            ));
        }
        Ok(TestCase {
            module: module.to_string(),
            name: self.name,
            decoders: self.decoders,
            input,
            outputs: self.outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Vec<TestCase>> {
        parse_source(source, "test.conf", "uart")
    }

    #[test]
    fn minimal_document_yields_one_case() {
        let cases = parse(
            "# comment\n\
             test hello\n\
             protocol-decoder uart channel rx=0 option baudrate=115200\n\
             input uart/hello.sr\n\
             output uart annotation class rx-data match annotation_rx\n",
        )
        .unwrap();
        assert_eq!(cases.len(), 1);
        let case = &cases[0];
        assert_eq!(case.qualified_name(), "uart/hello");
        assert_eq!(case.decoders.len(), 1);
        assert_eq!(case.decoders[0].channels, vec![("rx".into(), 0)]);
        assert_eq!(
            case.decoders[0].options,
            vec![("baudrate".into(), "115200".into())]
        );
        assert_eq!(case.input.file, "uart/hello.sr");
        assert_eq!(case.outputs[0].kind, OutputKind::Annotation);
        assert_eq!(case.outputs[0].class.as_deref(), Some("rx-data"));
        assert_eq!(case.outputs[0].fixture.as_deref(), Some("annotation_rx"));
    }

    #[test]
    fn unrecognized_keyword_rejects_whole_document() {
        let err = parse(
            "test hello\n\
             protocol-decoder uart\n\
             bogus directive\n\
             input uart/hello.sr\n\
             output uart annotation match annotation_rx\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecSyntax { line: 3, .. }));
    }

    #[test]
    fn directive_before_test_is_rejected() {
        let err = parse("input uart/hello.sr\n").unwrap_err();
        assert!(matches!(err, HarnessError::SpecSyntax { line: 1, .. }));
    }

    #[test]
    fn non_integer_channel_index_is_rejected() {
        let err = parse(
            "test hello\n\
             protocol-decoder uart channel rx=zero\n\
             input uart/hello.sr\n\
             output uart annotation match annotation_rx\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecSyntax { line: 2, .. }));
    }

    #[test]
    fn dangling_attribute_is_rejected() {
        let err = parse(
            "test hello\n\
             protocol-decoder uart channel\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecSyntax { .. }));
    }

    #[test]
    fn input_format_and_sub_options() {
        let cases = parse(
            "test hello\n\
             protocol-decoder uart\n\
             input hello.bin format binary option numchannels=2 option samplerate=1000000\n\
             output uart annotation match annotation_rx\n",
        )
        .unwrap();
        let input = &cases[0].input;
        assert_eq!(input.format.as_deref(), Some("binary"));
        assert_eq!(
            input.format_options,
            vec!["numchannels=2".to_string(), "samplerate=1000000".to_string()]
        );
    }

    #[test]
    fn stack_reorders_declared_decoders() {
        let cases = parse(
            "test spi_flash\n\
             protocol-decoder spiflash\n\
             protocol-decoder spi channel clk=0 channel mosi=1\n\
             stack spi spiflash\n\
             input spi/flash.sr\n\
             output spiflash annotation match annotation\n",
        )
        .unwrap();
        let ids: Vec<&str> = cases[0].decoders.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["spi", "spiflash"]);
        // Channel mappings travel with the reordered decoder.
        assert_eq!(cases[0].decoders[0].channels.len(), 2);
    }

    #[test]
    fn stack_with_undeclared_decoder_is_rejected() {
        let err = parse(
            "test spi_flash\n\
             protocol-decoder spi\n\
             stack spi spiflash\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecSyntax { line: 3, .. }));
    }

    #[test]
    fn duplicate_input_is_rejected() {
        let err = parse(
            "test hello\n\
             protocol-decoder uart\n\
             input a.sr\n\
             input b.sr\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecSyntax { line: 4, .. }));
    }

    #[test]
    fn case_without_matched_output_is_rejected() {
        let err = parse(
            "test hello\n\
             protocol-decoder uart\n\
             input uart/hello.sr\n\
             output uart annotation\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecStructure { .. }));
    }

    #[test]
    fn case_without_input_is_rejected() {
        let err = parse(
            "test hello\n\
             protocol-decoder uart\n\
             output uart annotation match annotation_rx\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecStructure { .. }));
    }

    #[test]
    fn structural_failure_rejects_sibling_cases_too() {
        // The second case is fine on its own, but the document fails as
        // a unit.
        let err = parse(
            "test broken\n\
             protocol-decoder uart\n\
             input uart/hello.sr\n\
             output uart annotation\n\
             test fine\n\
             protocol-decoder uart\n\
             input uart/hello.sr\n\
             output uart annotation match annotation_rx\n",
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::SpecStructure { .. }));
    }
}
