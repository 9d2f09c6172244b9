use thiserror::Error;

/// Errors surfaced at the setup / device / file boundary.
///
/// The command interpreter itself never returns a `Result`: a command
/// handler returns an `Outcome` (see `interp.rs`), printing its own
/// diagnostic before doing so. `DiagError` exists one layer below that,
/// for things that happen before there is a line to run at all (opening a
/// device, loading an init file) or that a handler wants to propagate with
/// `?` internally before translating to `Outcome::Error`.
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("physical drive not set")]
    NoDrive,

    #[error("could not open drive: {0}")]
    OpenFailed(#[source] std::io::Error),

    #[error("could not read: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("could not write: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("drive {0} invalid")]
    InvalidDrive(i64),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("variable \"{0}\" invalid")]
    UnknownName(String),

    #[error("invalid value")]
    InvalidValue,

    #[error("divide by zero")]
    DivideByZero,

    #[error("expected \")\"")]
    MissingParen,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unterminated string")]
    UnterminatedString,

    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("label \"{0}\" invalid")]
    UnknownLabel(String),

    #[error("nothing to return to")]
    EmptyFrameStack,

    #[error("no matching control frame")]
    NoControlFrame,

    #[error("line {0} does not exist")]
    NoSuchLine(usize),

    #[error("program exhausted while scanning for \"{0}\"")]
    ScanExhausted(String),

    #[error("invalid command termination")]
    BadTermination,

    #[error("cannot allocate space")]
    AllocFailed,

    #[error("bad pattern name: {0}")]
    UnknownPattern(String),

    #[error("invalid sector count, must be <= {0}")]
    SectorCountTooLarge(usize),

    #[error("drive not selected")]
    DriveNotSelected,

    #[error("write protected")]
    WriteProtected,
}

pub type DiagResult<T> = Result<T, DiagError>;
