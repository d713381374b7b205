use arch::Opcode;
use color_print::cformat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Two labels for the same instruction: `{0}`, `{1}`")]
    TwoLabels(String, String),

    #[error("Two macro descriptions for the same instruction: `{0}`, `{1}`")]
    TwoMacroDescriptions(String, String),

    #[error("Instruction is already labeled: `{0}`")]
    LabelAlreadySet(String),

    #[error("Instruction already has a macro description: `{0}`")]
    MacroDescriptionAlreadySet(String),

    #[error("Re-defined label: `{0}`")]
    RedefinedLabel(String),

    #[error("Undefined label: `{0}`")]
    UndefinedLabel(String),

    #[error("Cannot rebind `{0}`: not defined")]
    UnboundIdentifier(String),

    #[error("Invalid operands for `{0}`")]
    InvalidOperands(Opcode),

    #[error("Invalid RAM size for `{0}`: {1}")]
    InvalidRamSize(String, i64),

    #[error("Arithmetic overflow in `{0}`")]
    Overflow(String),

    #[error("Label is not followed by an instruction: `{0}`")]
    DanglingLabel(String),

    #[error("Macro description is not followed by an instruction: `{0}`")]
    DanglingMacroDescription(String),

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Anchors the error at a source line; already anchored errors are kept as is.
    pub fn at_line(self, line: Option<usize>) -> Self {
        match (self, line) {
            (err @ Error::AtLine { .. }, _) => err,
            (err, Some(line)) => Error::AtLine {
                line,
                source: Box::new(err),
            },
            (err, None) => err,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            Error::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The error without its line annotation.
    pub fn cause(&self) -> &Error {
        match self {
            Error::AtLine { source, .. } => source.cause(),
            err => err,
        }
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, file: &str, lines: &[String]) {
        print!("{}", self.diag(file, lines));
    }

    fn diag(&self, file: &str, lines: &[String]) -> String {
        let mut out = cformat!("<red,bold>error</>: {}\n", self.cause());

        let Some(line_num) = self.line() else {
            out += &cformat!("     <blue>--></> <underline>{}</>\n", file);
            return out;
        };

        // line numbers are 1-based
        let line_content = line_num
            .checked_sub(1)
            .and_then(|idx| lines.get(idx))
            .map(|s| s.as_str())
            .unwrap_or("");

        out += &cformat!("     <blue>--></> <underline>{}:{}</>\n", file, line_num);
        out += &cformat!("      <blue>|</>\n");
        out += &cformat!(" <blue>{:>4} |</> {}\n", line_num, line_content);
        out += &cformat!("      <blue>|</>\n");
        out
    }
}
