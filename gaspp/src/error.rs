use thiserror::Error;

/// The error taxonomy produced by the preprocessor passes.
///
/// All variants are fatal: a broken macro definition or unbalanced
/// conditional can corrupt every subsequent line, so there is no partial
/// recovery. Each non-downstream variant carries the 1-based line number
/// of whichever pass's *input* triggered it; this is not a mapping back to
/// original source position (macro expansion makes that ambiguous by
/// design, and spec'd as a non-goal).
#[derive(Debug, Error)]
pub enum GaspError {
    /// A construct this preprocessor does not implement: an unrecognized
    /// `.if` variant, a non-Mach-O `.section` name, nested `.rept`/`.irp`,
    /// or `.previous` without two prior section directives.
    #[error("line {line}: unsupported construct: {detail}")]
    UnsupportedConstruct { line: usize, detail: String },

    /// Input that violates the directive grammar itself: `.endm`
    /// underflow, nested `.macro` without an outer definition, too many
    /// positional arguments to a non-vararg macro, a malformed `.ifc`
    /// operand list.
    #[error("line {line}: malformed input: {detail}")]
    MalformedInput { line: usize, detail: String },

    /// A failure reported by the outer collaborator driving the core —
    /// typically a broken pipe to the downstream assembler.
    #[error("downstream failure: {detail}")]
    DownstreamFailure { detail: String },
}

impl GaspError {
    pub fn unsupported(line: usize, detail: impl Into<String>) -> Self {
        GaspError::UnsupportedConstruct {
            line,
            detail: detail.into(),
        }
    }

    pub fn malformed(line: usize, detail: impl Into<String>) -> Self {
        GaspError::MalformedInput {
            line,
            detail: detail.into(),
        }
    }

    pub fn downstream(detail: impl Into<String>) -> Self {
        GaspError::DownstreamFailure {
            detail: detail.into(),
        }
    }
}

pub type GaspResult<T> = Result<T, GaspError>;
