//! Defines the error taxonomy shared by every other module.
//!
//! The split mirrors a codec/connection boundary: [`CodecError`] is raised by
//! the pure encode/decode/discard functions in [`crate::codec`], which never
//! see a host or port; [`Connection`](crate::Connection) decorates those
//! failures with that context on the way into the outer [`RedisError`].

use std::io;
use std::str::Utf8Error;

/// The common ancestor of every error this crate can produce.
#[derive(Debug, thiserror::Error)]
pub enum RedisError {
    /// A transport-level fault: connect failure, write failure, or a read
    /// that left the stream mis-framed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// A call was made that requires the connection to be alive (or, for
    /// `disconnect`, already alive), but it wasn't.
    #[error(transparent)]
    State(#[from] StateError),
    /// The server reported a Simple- or Blob-Error for the current response.
    #[error(transparent)]
    Response(#[from] ResponseError),
    /// The decoder encountered a Push or Attribute frame, which this crate
    /// does not support decoding.
    #[error("{0} is not supported by this decoder")]
    NotImplemented(UnsupportedTag),
    /// A `redis://` URL was malformed.
    #[error("invalid redis url: {0}")]
    Url(String),
    /// The post-connect `HELLO 3` handshake did not complete successfully.
    #[error("HELLO handshake failed: {0}")]
    Handshake(String),
}

/// A transport-level fault.
///
/// Every variant reflects a connection that has already been closed by the
/// time this error is observed: there is no `ConnectionError` that leaves the
/// connection alive.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Failed to open the TCP transport to `host:port`.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// The host that was being connected to.
        host: String,
        /// The port that was being connected to.
        port: u16,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Writing a command to `host:port` failed.
    #[error("writing to {host}:{port} failed: {source}")]
    Write {
        /// The host the write was addressed to.
        host: String,
        /// The port the write was addressed to.
        port: u16,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Reading a response from `host:port` failed, or the stream was left
    /// incompletely framed (EOF mid-frame, a short read, or a missing CRLF
    /// terminator).
    #[error("reading from {host}:{port} failed: {source}")]
    Read {
        /// The host the read was addressed to.
        host: String,
        /// The port the read was addressed to.
        port: u16,
        /// The underlying I/O error, or a synthesized one describing the
        /// framing violation.
        #[source]
        source: io::Error,
    },
}

/// A call was made against a [`Connection`](crate::Connection) in the wrong
/// state: `write_command`, `read_response`, and `discard_response` all
/// require the connection to be alive, and `disconnect` requires it too
/// (calling `disconnect` twice in a row is an error, not a no-op).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection is not alive; call connect() first")]
pub struct StateError;

/// The server reported an error for the current response, via either the
/// Simple-Error (`-`) or Blob-Error (`!`) tag.
///
/// Decoding of any aggregate this error was nested inside is aborted; the
/// partial array, set, or map is discarded along with it. The connection
/// itself is left alive, since the error tag is a complete, correctly framed
/// response on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ResponseError {
    /// The error code, e.g. `ERR` or `WRONGTYPE`.
    pub code: String,
    /// The human-readable error message.
    pub message: String,
}

impl ResponseError {
    /// Splits a `"CODE message"` payload (as carried by `-` and `!` frames)
    /// into a `ResponseError`. If there's no space, the whole payload becomes
    /// the code and the message is empty.
    pub(crate) fn from_payload(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        match text.split_once(' ') {
            Some((code, message)) => ResponseError {
                code: code.to_owned(),
                message: message.to_owned(),
            },
            None => ResponseError {
                code: text.into_owned(),
                message: String::new(),
            },
        }
    }
}

/// Which unsupported RESP3 frame type was encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnsupportedTag {
    /// A Push (`>`) frame: a server-initiated, out-of-band message.
    #[error("push message")]
    Push,
    /// An Attribute (`|`) frame: out-of-band metadata attached to a response.
    #[error("attribute")]
    Attribute,
}

/// A failure raised by the pure codec functions in [`crate::codec`].
///
/// This type carries no host/port context — that's added by
/// [`Connection`](crate::Connection) when a codec call is driven by a real
/// transport. Tests that exercise the codec directly over an in-memory buffer
/// see `CodecError` values without ever going through `RedisError`.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O fault, or the stream was left incompletely framed: EOF before a
    /// header's CRLF, a short read of a blob body, a missing CRLF terminator,
    /// or a length/count field that didn't parse as the decimal form the
    /// protocol requires. All of these mean the stream can no longer be
    /// trusted to be correctly framed.
    #[error("{0}")]
    Io(#[from] io::Error),
    /// The server reported an error for this response (see [`ResponseError`]),
    /// or the decoder saw a boolean payload other than `t`/`f`, or an
    /// unrecognized top-level tag.
    #[error(transparent)]
    Response(#[from] ResponseError),
    /// A Push or Attribute frame was encountered.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedTag),
}

impl From<Utf8Error> for CodecError {
    fn from(e: Utf8Error) -> Self {
        CodecError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
