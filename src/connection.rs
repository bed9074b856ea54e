//! The connection state machine: TCP transport, the mandatory `HELLO 3`
//! handshake, and the write/read turn that drives one [`Command`].

use std::io::{BufReader, Write};
use std::net::TcpStream;

use crate::codec;
use crate::command::Command;
use crate::error::{ConnectionError, StateError};
use crate::url;
use crate::value::Value;
use crate::RedisError;

/// Header lines longer than this make a response malformed rather than
/// buffered indefinitely. Matches the default the reference implementation
/// uses for its stream's read buffer.
const DEFAULT_LINE_LIMIT: usize = 6000;

type PostConnectHook = Box<dyn FnMut(&mut Connection) -> Result<(), RedisError> + Send>;

struct Transport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// A single connection to a Redis-compatible server speaking RESP3.
///
/// `Connection` is a state machine with exactly two observable states: alive
/// (holding an open socket) and not alive (fresh, or closed after
/// [`disconnect`](Connection::disconnect) or a fault). There's no distinct
/// "connecting" or "closing" state to observe, since [`connect`](Connection::connect)
/// and [`disconnect`](Connection::disconnect) are synchronous calls that
/// either complete or fail outright.
///
/// `write_command`, `read_response`, and `discard_response` all require the
/// connection to be alive; calling any of them, or `disconnect`, while not
/// alive raises [`StateError`](crate::StateError).
pub struct Connection {
    host: String,
    port: u16,
    line_limit: usize,
    post_connect_hooks: Vec<(&'static str, PostConnectHook)>,
    transport: Option<Transport>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Connection {
    /// Builds a connection to `host:port`, not yet connected.
    ///
    /// Registers the mandatory `HELLO 3` handshake as a post-connect hook;
    /// every connection built this way runs it on every successful
    /// [`connect`](Connection::connect), with no way to opt out.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let mut connection = Connection {
            host: host.into(),
            port,
            line_limit: DEFAULT_LINE_LIMIT,
            post_connect_hooks: Vec::new(),
            transport: None,
        };
        connection.post_connect_hooks.push(("HELLO", Box::new(hello_hook)));
        connection
    }

    /// Alias for [`new`](Connection::new), matching the reference
    /// implementation's `Connection.from_host_port` constructor name.
    pub fn from_host_port(host: impl Into<String>, port: u16) -> Self {
        Connection::new(host, port)
    }

    /// Overrides the transport buffer limit (default 6000 bytes) that
    /// bounds the length of a single response header line.
    ///
    /// Mirrors the reference implementation's `buffer_limit` field, which a
    /// caller sets by passing it to the `Connection` constructor; here it's
    /// a consuming builder method instead, applied before
    /// [`connect`](Connection::connect) since it has no effect on an
    /// already-open transport.
    pub fn with_buffer_limit(mut self, buffer_limit: usize) -> Self {
        self.line_limit = buffer_limit;
        self
    }

    /// The transport buffer limit currently in effect.
    pub fn buffer_limit(&self) -> usize {
        self.line_limit
    }

    /// Builds a connection from a `redis://host:port` URL and connects it
    /// immediately, running the `HELLO` handshake as part of `connect`.
    ///
    /// Mirrors the reference implementation's `from_url`, which is the only
    /// constructor that connects eagerly; [`new`](Connection::new) instead
    /// leaves connecting to a separate call.
    pub fn from_url(raw: &str) -> Result<Self, RedisError> {
        let parsed = url::parse(raw)?;
        let mut connection = Connection::new(parsed.host, parsed.port);
        connection.connect()?;
        Ok(connection)
    }

    /// The host this connection talks, or would talk, to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port this connection talks, or would talk, to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `true` if the socket is open.
    pub fn is_alive(&self) -> bool {
        self.transport.is_some()
    }

    /// Registers an additional hook to run, in registration order after
    /// `HELLO`, on every successful [`connect`](Connection::connect).
    ///
    /// `name` replaces any previously registered hook of the same name,
    /// matching the reference implementation's map-keyed-by-name hook
    /// registry; registering a hook named `"HELLO"` would be a logic error,
    /// since it shadows the mandatory handshake, so this method is not the
    /// place to do that — it always runs `HELLO` first regardless.
    pub fn add_post_connect_hook(
        &mut self,
        name: &'static str,
        hook: impl FnMut(&mut Connection) -> Result<(), RedisError> + Send + 'static,
    ) {
        self.post_connect_hooks.retain(|(existing, _)| *existing != name);
        self.post_connect_hooks.push((name, Box::new(hook)));
    }

    /// Opens the TCP transport and runs every registered post-connect hook,
    /// `HELLO` first.
    ///
    /// If a hook fails, the connection is torn back down before the error is
    /// returned — a failed handshake never leaves a half-initialized,
    /// "alive" connection behind.
    pub fn connect(&mut self) -> Result<(), RedisError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).map_err(|source| {
            ConnectionError::Connect {
                host: self.host.clone(),
                port: self.port,
                source,
            }
        })?;
        stream.set_nodelay(true).map_err(|source| ConnectionError::Connect {
            host: self.host.clone(),
            port: self.port,
            source,
        })?;

        log::info!("connected to {}:{}", self.host, self.port);

        let writer = stream.try_clone().map_err(|source| ConnectionError::Connect {
            host: self.host.clone(),
            port: self.port,
            source,
        })?;
        self.transport = Some(Transport {
            reader: BufReader::new(stream),
            writer,
        });

        // Hooks take `&mut Connection`, so they can't be iterated while
        // borrowed out of `self`; take the list out and put it back after,
        // the same shape the reference implementation gets from an
        // (inherently re-entrant-safe) iteration over a weak-valued map.
        let mut hooks = std::mem::take(&mut self.post_connect_hooks);
        let mut failure = None;
        for (name, hook) in hooks.iter_mut() {
            log::debug!("running post-connect hook {name:?}");
            if let Err(e) = hook(self) {
                failure = Some(e);
                break;
            }
        }
        self.post_connect_hooks = hooks;

        if let Some(e) = failure {
            log::warn!("post-connect hook failed, closing connection: {e}");
            self.transport = None;
            return Err(e);
        }

        Ok(())
    }

    /// Closes the socket. Requires the connection to be alive: calling this
    /// twice in a row is a [`StateError`], not a no-op.
    pub fn disconnect(&mut self) -> Result<(), RedisError> {
        if self.transport.take().is_none() {
            return Err(StateError.into());
        }
        log::info!("disconnected from {}:{}", self.host, self.port);
        Ok(())
    }

    /// Writes `cmd` to the socket.
    ///
    /// A write fault always closes the connection — there's no
    /// `disconnect_on_error` knob here, since a partially written command
    /// leaves the stream unrecoverably mis-framed regardless of what the
    /// caller wanted to do with the (nonexistent) response.
    pub fn write_command(&mut self, cmd: &Command) -> Result<(), RedisError> {
        let transport = self.transport.as_mut().ok_or(StateError)?;
        log::trace!("-> {cmd}");

        let result = codec::encode_command(&mut transport.writer, cmd)
            .and_then(|()| transport.writer.flush());

        if let Err(source) = result {
            self.transport = None;
            return Err(ConnectionError::Write {
                host: self.host.clone(),
                port: self.port,
                source,
            }
            .into());
        }

        Ok(())
    }

    /// Reads and decodes one response.
    ///
    /// If `disconnect_on_error` is `true`, any fault (I/O, framing, an
    /// unsupported Push/Attribute frame) closes the connection before the
    /// error is returned. A [`ResponseError`](crate::ResponseError) — the
    /// server replying with its own error tag — is not treated as a fault
    /// here regardless of the flag, since the response was still completely
    /// and correctly framed.
    pub fn read_response(&mut self, disconnect_on_error: bool) -> Result<Value, RedisError> {
        let transport = self.transport.as_mut().ok_or(StateError)?;
        let result = codec::decode_response(&mut transport.reader, self.line_limit);
        self.finish_read(result, disconnect_on_error)
    }

    /// Reads and discards one response, the same way [`read_response`](Connection::read_response)
    /// does, but without materializing a [`Value`].
    pub fn discard_response(&mut self, disconnect_on_error: bool) -> Result<(), RedisError> {
        let transport = self.transport.as_mut().ok_or(StateError)?;
        let result = codec::discard_response(&mut transport.reader, self.line_limit);
        self.finish_read(result, disconnect_on_error)
    }

    fn finish_read<T>(
        &mut self,
        result: Result<T, crate::CodecError>,
        disconnect_on_error: bool,
    ) -> Result<T, RedisError> {
        match result {
            Ok(value) => Ok(value),
            Err(crate::CodecError::Response(e)) => Err(e.into()),
            Err(crate::CodecError::Unsupported(tag)) => {
                if disconnect_on_error {
                    self.transport = None;
                }
                Err(RedisError::NotImplemented(tag))
            }
            Err(crate::CodecError::Io(source)) => {
                if disconnect_on_error {
                    self.transport = None;
                }
                Err(ConnectionError::Read {
                    host: self.host.clone(),
                    port: self.port,
                    source,
                }
                .into())
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.transport.is_some() {
            log::debug!("dropping connection to {}:{} while still alive", self.host, self.port);
        }
    }
}

fn hello_hook(connection: &mut Connection) -> Result<(), RedisError> {
    connection.write_command(&Command::new("HELLO").arg("3"))?;
    let hello = connection.read_response(true)?;

    let proto_is_three = match &hello {
        Value::Map(pairs) => pairs.iter().any(|(k, v)| {
            k.as_bytes() == Some(&b"proto"[..]) && matches!(v, Value::Integer(3))
        }),
        _ => false,
    };

    if !proto_is_three {
        return Err(RedisError::Handshake(
            "server did not acknowledge protocol version 3".to_owned(),
        ));
    }

    Ok(())
}
