//! The command builder: an ordered, append-only list of byte-string
//! arguments plus two per-command flags.

use std::fmt;

use crate::connection::Connection;
use crate::value::Value;
use crate::RedisError;

/// Types that can be normalized into a single RESP3 command argument.
///
/// Implemented for the handful of shapes a caller realistically hands to
/// [`Command::new`]/[`Command::arg`]: raw bytes, text, and numbers. Raw bytes
/// pass through unchanged; text is UTF-8 encoded; numbers are rendered in
/// their canonical decimal textual form. There's no blanket `ToString` impl,
/// since that would silently accept types whose `Display` output isn't a
/// sensible wire argument.
pub trait IntoArg {
    /// Normalizes `self` into the bytes that will be written as one `$`-framed
    /// argument.
    fn into_arg(self) -> Vec<u8>;
}

impl IntoArg for Vec<u8> {
    fn into_arg(self) -> Vec<u8> {
        self
    }
}

impl IntoArg for &[u8] {
    fn into_arg(self) -> Vec<u8> {
        self.to_vec()
    }
}

impl<const N: usize> IntoArg for &[u8; N] {
    fn into_arg(self) -> Vec<u8> {
        self.to_vec()
    }
}

impl IntoArg for String {
    fn into_arg(self) -> Vec<u8> {
        self.into_bytes()
    }
}

impl IntoArg for &str {
    fn into_arg(self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

macro_rules! impl_into_arg_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoArg for $ty {
                fn into_arg(self) -> Vec<u8> {
                    self.to_string().into_bytes()
                }
            }
        )*
    };
}

impl_into_arg_display!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// A single RESP3 request: a verb followed by zero or more arguments, plus
/// two flags that control how [`execute`](Command::execute) drains the
/// response.
///
/// `Command` is append-only and owned by its caller; the codec only ever
/// borrows it to encode. Construction and argument appending are consuming
/// builder methods, so a command is typically assembled in one expression:
///
/// ```
/// use resp3_proto::Command;
///
/// let cmd = Command::new("SET").arg("key").arg("value");
/// assert_eq!(cmd.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    arguments: Vec<Vec<u8>>,
    discard_response: bool,
    disconnect_on_error: bool,
}

impl Command {
    /// Starts a new command with the given verb (e.g. `"SET"`, `"HELLO"`).
    ///
    /// `discard_response` starts `false` and `disconnect_on_error` starts
    /// `true`, matching the defaults a caller almost always wants: read the
    /// reply, and treat a read fault as fatal to the connection.
    pub fn new(verb: impl IntoArg) -> Self {
        Command {
            arguments: vec![verb.into_arg()],
            discard_response: false,
            disconnect_on_error: true,
        }
    }

    /// Appends one argument, normalized per [`IntoArg`].
    ///
    /// A zero-length argument is valid and is encoded with a literal `$0`
    /// length; it is never dropped or treated as absent.
    pub fn arg(mut self, value: impl IntoArg) -> Self {
        self.arguments.push(value.into_arg());
        self
    }

    /// Sets whether [`execute`](Command::execute) discards the response
    /// instead of materializing it.
    pub fn set_discard_response(mut self, discard_response: bool) -> Self {
        self.discard_response = discard_response;
        self
    }

    /// Sets whether a read fault during [`execute`](Command::execute) tears
    /// down the connection.
    pub fn set_disconnect_on_error(mut self, disconnect_on_error: bool) -> Self {
        self.disconnect_on_error = disconnect_on_error;
        self
    }

    /// Returns `true` if [`execute`](Command::execute) will discard the
    /// response rather than return it.
    pub fn discard_response(&self) -> bool {
        self.discard_response
    }

    /// Returns `true` if a read fault during [`execute`](Command::execute)
    /// will tear down the connection.
    pub fn disconnect_on_error(&self) -> bool {
        self.disconnect_on_error
    }

    /// The number of arguments, including the verb.
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// `true` if the command somehow has no arguments at all — never the
    /// case for a `Command` built via `new`, which always seeds the verb.
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Iterates over the arguments (verb included) in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.arguments.iter().map(Vec::as_slice)
    }

    /// Writes the command, then reads or discards its response according to
    /// `discard_response`, propagating `disconnect_on_error` to whichever of
    /// [`Connection::read_response`] or [`Connection::discard_response`] runs.
    ///
    /// On return (success or failure) the connection is either alive and
    /// drained of this response, or it has been closed — closed only if
    /// `disconnect_on_error` was set and a fault occurred.
    pub fn execute(&self, connection: &mut Connection) -> Result<Value, RedisError> {
        connection.write_command(self)?;

        if self.discard_response {
            connection.discard_response(self.disconnect_on_error)?;
            Ok(Value::Null)
        } else {
            connection.read_response(self.disconnect_on_error)
        }
    }
}

impl fmt::Display for Command {
    /// A UTF-8-lossy, space-joined rendering of the arguments, for logging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args = self.arguments.iter();
        if let Some(first) = args.next() {
            write!(f, "{}", String::from_utf8_lossy(first))?;
        }
        for arg in args {
            write!(f, " {}", String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}
