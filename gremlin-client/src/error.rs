/// The top-level error type surfaced to callers of this crate.
///
/// Follows the teacher's flat-enum `thiserror` shape: wrapped library
/// errors are `#[error(transparent)]`, owned messages get their own
/// `#[error("...")]` text. See spec.md §7 for the propagation rules each
/// variant participates in.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Codec(#[from] graphbinary::CodecError),

    #[error("server returned status {code}: {message}")]
    Server { code: i32, message: String },

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Wraps a terminal error observed by more than one waiter on the same
    /// [`crate::result_set::ResultSet`] (the underlying transport/codec
    /// errors aren't `Clone`, so the second and later observers see this
    /// indirection rather than losing the error entirely).
    #[error("{0}")]
    Shared(std::sync::Arc<Error>),
}

impl Error {
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Error::Server {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to dial {url}: {source}")]
    Dial {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("read failed: {0}")]
    Read(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("write failed: {0}")]
    Write(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed unexpectedly (unexpected EOF)")]
    UnexpectedEof,

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("write deadline of {0:?} exceeded")]
    WriteTimeout(std::time::Duration),

    #[error("transport is already closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown response status code {0}")]
    UnknownStatusCode(i32),

    #[error("response referenced unknown request id {0}")]
    UnknownRequestId(uuid::Uuid),

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(&'static str),

    #[error("authentication was requested but no AuthInfo was configured")]
    AuthenticationNotConfigured,
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("submit called on a closed connection or pool")]
    Closed,

    #[error("a session cannot begin a transaction twice")]
    DoubleBegin,

    #[error("create_session called on a handle that is already a session")]
    AlreadySession,

    #[error("multiple session ids were supplied; exactly one is required")]
    MultipleSessionIds,
}

pub type Result<T> = std::result::Result<T, Error>;
