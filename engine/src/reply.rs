//! A protocol-agnostic reply shape. `server::resp` is the only place that
//! turns this into RESP1 bytes; the engine never needs to know the wire
//! format to decide what kind of answer a command produced.

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+OK` and friends.
    Ok,
    Simple(String),
    Integer(i64),
    /// `None` is a RESP nil bulk string.
    Bulk(Option<Vec<u8>>),
    /// `None` is a RESP nil array.
    Array(Option<Vec<Reply>>),
    Error(String),
    /// The `MULTI`-queueing sentinel.
    Queued,
}

impl Reply {
    pub fn bulk(bytes: Vec<u8>) -> Self {
        Reply::Bulk(Some(bytes))
    }

    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    pub fn array(items: Vec<Reply>) -> Self {
        Reply::Array(Some(items))
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    pub fn from_bool(b: bool) -> Self {
        Reply::Integer(if b { 1 } else { 0 })
    }
}

impl From<crate::error::Error> for Reply {
    fn from(e: crate::error::Error) -> Self {
        Reply::Error(e.to_string())
    }
}
