//! In-memory model of parsed test definitions.
//!
//! These records are produced once by the spec parser and validated there;
//! downstream code relies on the invariants (at least one decoder, exactly
//! one input, at least one matched output assertion) without re-checking.

use std::fmt;
use std::str::FromStr;

/// The kind of engine output an assertion checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Textual, human-readable decode output.
    Annotation,
    /// Serialized structured decode output.
    Python,
    /// Raw byte-exact decode output, compared by digest.
    Binary,
    /// An expected engine-level decode error.
    Exception,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annotation => "annotation",
            Self::Python => "python",
            Self::Binary => "binary",
            Self::Exception => "exception",
        }
    }

    /// Text kinds are compared line by line; binary by digest.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Annotation | Self::Python)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotation" => Ok(Self::Annotation),
            "python" => Ok(Self::Python),
            "binary" => Ok(Self::Binary),
            "exception" => Ok(Self::Exception),
            other => Err(format!("unknown output type '{other}'")),
        }
    }
}

/// One decoding stage of the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoderSpec {
    pub id: String,
    /// Channel label to capture-channel index, in declaration order.
    pub channels: Vec<(String, i64)>,
    /// Decoder options, in declaration order.
    pub options: Vec<(String, String)>,
    /// Initial logic values for otherwise-unmapped pins.
    pub initial_pins: Vec<(String, String)>,
}

impl DecoderSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// The capture fed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    /// Capture file, relative to the dumps directory.
    pub file: String,
    pub format: Option<String>,
    pub format_options: Vec<String>,
}

/// One expected output of a test case.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputAssertion {
    /// Decoder whose output is checked.
    pub decoder: String,
    pub kind: OutputKind,
    /// Annotation class filter, when the kind supports one.
    pub class: Option<String>,
    /// Fixture to match, relative to the spec document's directory.
    /// For exception assertions this is the expected error text.
    /// Assertions without a match target run but are not compared.
    pub fixture: Option<String>,
}

impl OutputAssertion {
    /// Short label used in run results and reports.
    pub fn label(&self) -> String {
        match &self.class {
            Some(class) => format!("{}/{}/{}", self.decoder, self.kind, class),
            None => format!("{}/{}", self.decoder, self.kind),
        }
    }
}

/// One declared test case, owned by a module's spec document.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Module the owning document belongs to.
    pub module: String,
    pub name: String,
    /// Decode pipeline, in stack order.
    pub decoders: Vec<DecoderSpec>,
    pub input: InputSpec,
    pub outputs: Vec<OutputAssertion>,
}

impl TestCase {
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.module, self.name)
    }
}

impl fmt::Display for TestCase {
    /// Renders the case back into directive form, for `show`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "test {}", self.qualified_name())?;
        for dec in &self.decoders {
            write!(f, "  protocol-decoder {}", dec.id)?;
            for (label, index) in &dec.channels {
                write!(f, " channel {label}={index}")?;
            }
            for (name, value) in &dec.options {
                write!(f, " option {name}={value}")?;
            }
            for (label, value) in &dec.initial_pins {
                write!(f, " initial_pin {label}={value}")?;
            }
            writeln!(f)?;
        }
        write!(f, "  input {}", self.input.file)?;
        if let Some(format) = &self.input.format {
            write!(f, " format {format}")?;
            for opt in &self.input.format_options {
                write!(f, " option {opt}")?;
            }
        }
        writeln!(f)?;
        for out in &self.outputs {
            write!(f, "  output {} {}", out.decoder, out.kind)?;
            if let Some(class) = &out.class {
                write!(f, " class {class}")?;
            }
            if let Some(fixture) = &out.fixture {
                write!(f, " match {fixture}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
