use std::fmt;

use crate::render::error::BufferError;
use crate::render::program::ProgramStage;

/// Pipeline construction failure.
///
/// Construction is all-or-nothing: any of these aborts creation of the
/// pipeline and, through the renderer, the whole initialization path.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// No program registered under this name.
    UnknownProgram { name: String },
    /// Program refers to a module that was never registered.
    UnknownModule { program: String, module: String },
    /// Program was requested for the wrong stage.
    StageMismatch {
        program: String,
        expected: ProgramStage,
        found: ProgramStage,
    },
    /// Program source failed to parse or validate.
    Compile { program: String, message: String },
    /// Module has no entry point with the program's name and stage.
    MissingEntryPoint { program: String, entry_point: String },
    /// Pipeline needs more than the device offers.
    Capability { what: &'static str, requested: u64, limit: u64 },
    /// Static data uploaded at construction did not fit its buffer.
    Upload(BufferError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::UnknownProgram { name } => write!(f, "unknown program `{name}`"),
            PipelineError::UnknownModule { program, module } => {
                write!(f, "program `{program}` refers to unknown module `{module}`")
            }
            PipelineError::StageMismatch { program, expected, found } => write!(
                f,
                "program `{program}` is a {found:?} program, expected {expected:?}"
            ),
            PipelineError::Compile { program, message } => {
                write!(f, "program `{program}` failed to compile:\n{message}")
            }
            PipelineError::MissingEntryPoint { program, entry_point } => write!(
                f,
                "program `{program}` has no entry point `{entry_point}` for its stage"
            ),
            PipelineError::Capability { what, requested, limit } => write!(
                f,
                "pipeline needs {requested} {what}, device supports {limit}"
            ),
            PipelineError::Upload(e) => write!(f, "static upload failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Upload(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BufferError> for PipelineError {
    fn from(e: BufferError) -> Self {
        PipelineError::Upload(e)
    }
}
