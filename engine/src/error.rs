//! Error kinds surfaced by the engine (spec §7). Kept protocol-agnostic:
//! `server` maps each variant onto a RESP `-ERR ...` line.

pub type CResult<T> = Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("wrong number of arguments")]
    WrongArity,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    InvalidInteger,

    #[error("value is not a valid float")]
    InvalidFloat,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("index out of range")]
    IndexOutOfRange,

    #[error("no such key")]
    NoSuchKey,

    #[error("EXECABORT Transaction discarded because a watched key was modified")]
    WatchConflict,

    #[error("EXECABORT Transaction discarded because of a previous error")]
    TransactionAborted,

    #[error("MULTI calls cannot be nested")]
    NestedMulti,

    #[error("EXEC without MULTI")]
    ExecWithoutMulti,

    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,

    #[error("WATCH inside MULTI is not allowed")]
    WatchInsideMulti,

    #[error("instance is not configured to use slave mode")]
    NotConfiguredAsSlave,

    #[error("no master is configured for this replica")]
    NoMasterConfigured,

    #[error("not connected to master")]
    NotConnectedToMaster,

    #[error("Background save already in progress")]
    BackgroundSaveInProgress,

    #[error("NOAUTH Authentication required")]
    NotAuthenticated,

    #[error("error writing to the append only file: {0}")]
    AofIoError(String),

    #[error("error reading/writing the RDB snapshot: {0}")]
    RdbIoError(String),

    #[error("empty command")]
    EmptyCommand,

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Value(String),
}

impl Error {
    /// Short machine-stable name, used by tests and by `server`'s RESP error
    /// prefix selection (`-WRONGTYPE ...` vs a bare `-ERR ...`).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::WrongArity => "WrongArity",
            Error::UnknownCommand(_) => "UnknownCommand",
            Error::WrongType => "WrongType",
            Error::InvalidInteger => "InvalidInteger",
            Error::InvalidFloat => "InvalidFloat",
            Error::Overflow => "Overflow",
            Error::IndexOutOfRange => "IndexOutOfRange",
            Error::NoSuchKey => "NoSuchKey",
            Error::WatchConflict => "WatchConflict",
            Error::TransactionAborted => "TransactionAborted",
            Error::NestedMulti => "NestedMulti",
            Error::ExecWithoutMulti => "ExecWithoutMulti",
            Error::DiscardWithoutMulti => "DiscardWithoutMulti",
            Error::WatchInsideMulti => "WatchInsideMulti",
            Error::NotConfiguredAsSlave => "NotConfiguredAsSlave",
            Error::NoMasterConfigured => "NoMasterConfigured",
            Error::NotConnectedToMaster => "NotConnectedToMaster",
            Error::BackgroundSaveInProgress => "BackgroundSaveInProgress",
            Error::NotAuthenticated => "NotAuthenticated",
            Error::AofIoError(_) => "AofIoError",
            Error::RdbIoError(_) => "RdbIoError",
            Error::EmptyCommand => "EmptyCommand",
            Error::Lock(_) => "Lock",
            Error::Io(_) => "Io",
            Error::Internal(_) => "Internal",
            Error::Parse(_) => "Parse",
            Error::Value(_) => "Value",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::Lock(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(Error::WrongArity.kind(), "WrongArity");
        assert_eq!(Error::WrongType.kind(), "WrongType");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), "Io");
    }
}
