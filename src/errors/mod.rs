use std::fmt::{Display, Formatter};

use std::error::Error as StdError;
use std::io::Error as IoError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(IoError),

    // The source or the current chunk window ran out before a required
    // field could be read.
    UnexpectedEnd,

    // A self-delimiting integer ran past its 9-byte maximum, or a header
    // field violated a declared invariant of the encoding.
    HeaderError,

    // A validation check failed; the payload names the offending structure.
    Malformed(&'static str),
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Error::UnexpectedEnd;
        }

        Error::Io(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Error::Io(ref inner) => inner.fmt(f),
            Error::UnexpectedEnd => f.write_str("unexpected end of data"),
            Error::HeaderError => f.write_str("malformed header field"),
            Error::Malformed(msg) => write!(f, "malformed archive: {}", msg),
        }
    }
}

impl StdError for Error {
    fn cause(&self) -> Option<&dyn StdError> {
        match *self {
            Error::Io(ref inner) => Some(inner),
            _ => None,
        }
    }
}
