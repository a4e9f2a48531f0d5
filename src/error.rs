use std::fmt;

use failure::Backtrace;
use failure::Context;
use failure::Fail;

/// Error information returned by this crate's public API.
#[derive(Debug)]
pub struct Error(Context<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.get_context()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error(inner)
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.0.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.0.backtrace()
    }

    fn name(&self) -> Option<&str> {
        self.kind().kind_name()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Exhaustive list of errors this crate can return.
///
/// The public, behaviour-significant kinds (retriable or not, per the
/// caller-facing error handling contract) are `NotFound`, `ClientError`,
/// `InternalError`, `ParseError`, `MinReplicationError`, `InvalidArgument`
/// and `Transport`. The remaining kinds wrap coordination-backend and
/// encode/decode failures that never cross the retrier's classification.
#[derive(Debug, Fail)]
pub enum ErrorKind {
    /// No matching document, shard or route was found.
    ///
    /// Terminal: the retrier short-circuits on this kind instead of retrying.
    #[fail(display = "not found")]
    NotFound,

    /// The server rejected the request (4xx other than 404) or returned a
    /// non-zero response status.
    #[fail(display = "client error, status: {} message: {}", _0, _1)]
    ClientError(u16, String),

    /// The server failed to service the request (5xx).
    #[fail(display = "internal server error, status: {}", _0)]
    InternalError(u16),

    /// The response body could not be decoded.
    #[fail(display = "failed to parse response body: {}", _0)]
    ParseError(String),

    /// The server acknowledged fewer replicas than the configured floor.
    #[fail(display = "replication factor {} is below minimum {}", _0, _1)]
    MinReplicationError(u32, u32),

    /// The caller supplied invalid input (empty candidate list, malformed key, ...).
    #[fail(display = "invalid argument: {}", _0)]
    InvalidArgument(String),

    /// A transport-level failure (socket error, timeout, ...).
    #[fail(display = "transport error")]
    Transport,

    /// The coordination backend (ZooKeeper) returned an error performing `{}`.
    #[fail(display = "coordination backend error during {}", _0)]
    Backend(&'static str),

    /// Could not establish or re-establish a coordination session.
    #[fail(display = "failed to connect to the coordination service")]
    BackendConnect,

    /// Failed to encode a value for the wire.
    #[fail(display = "failed to encode {}", _0)]
    Encode(&'static str),

    /// Failed to decode a value read off the wire.
    #[fail(display = "failed to decode {}", _0)]
    Decode(&'static str),

    /// Could not spawn a background thread.
    #[fail(display = "unable to spawn thread for '{}'", _0)]
    SpawnThread(&'static str),
}

impl ErrorKind {
    fn kind_name(&self) -> Option<&str> {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ClientError(_, _) => "ClientError",
            ErrorKind::InternalError(_) => "InternalError",
            ErrorKind::ParseError(_) => "ParseError",
            ErrorKind::MinReplicationError(_, _) => "MinReplicationError",
            ErrorKind::InvalidArgument(_) => "InvalidArgument",
            ErrorKind::Transport => "Transport",
            ErrorKind::Backend(_) => "Backend",
            ErrorKind::BackendConnect => "BackendConnect",
            ErrorKind::Encode(_) => "Encode",
            ErrorKind::Decode(_) => "Decode",
            ErrorKind::SpawnThread(_) => "SpawnThread",
        };
        Some(name)
    }

    /// True when the retrier should keep retrying on this error instead of
    /// short-circuiting. `NotFound` is the only terminal kind.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, ErrorKind::NotFound)
    }
}

/// Short form alias for functions returning this crate's `Error`.
pub type Result<T> = ::std::result::Result<T, Error>;
