use thiserror::Error;

/// Errors raised by the compiler, the VM, and the bytecode loader.
///
/// Errors are fatal to the running program; there is no in-language way to
/// catch them. The VM wraps whatever a handler raises in [`Error::At`] so
/// the host can see which instruction failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("arity mismatch: {callee} takes {expected} argument(s), {got} given")]
    ArityMismatch {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: expected {expected}, got {got}")]
    Type { expected: String, got: String },

    #[error("cannot set unbound symbol '{0}'")]
    UnboundSet(String),

    #[error("malformed bytecode: {0}")]
    MalformedBytecode(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("instruction limit exceeded ({0})")]
    InstructionLimitExceeded(u64),

    /// An error annotated with the index of the instruction that raised it.
    #[error("{source} (at instruction {pc})")]
    At {
        pc: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach an instruction index to this error. Already-annotated errors
    /// keep their original location.
    pub fn at(self, pc: usize) -> Error {
        match self {
            Error::At { .. } => self,
            other => Error::At {
                pc,
                source: Box::new(other),
            },
        }
    }

    /// Strip the location annotation, if any, to get at the underlying kind.
    pub fn root(&self) -> &Error {
        match self {
            Error::At { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
