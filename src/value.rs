//! The decoded response value: a recursive sum over RESP3's type alphabet.

/// A fully decoded RESP3 response.
///
/// `Set` and `Map` are kept as `Vec`s rather than `HashSet`/`HashMap`: the
/// protocol forbids aggregate-valued keys in practice but this type doesn't
/// need to enforce that, since the decoder never constructs one, and a `Vec`
/// sidesteps requiring `Value` to implement `Hash`/`Eq` (which recursive
/// `Double`s make awkward) entirely. Per the protocol, `Set` members are not
/// de-duplicated by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The `_` frame: no payload.
    Null,
    /// The `#` frame: `t` or `f`.
    Boolean(bool),
    /// The `:` frame: a signed decimal integer.
    Integer(i64),
    /// The `(` frame: an arbitrary-precision integer, kept as the raw ASCII
    /// digit bytes (with an optional leading `-`) rather than a fixed-width
    /// type, since the protocol places no bound on its magnitude.
    BigNumber(Vec<u8>),
    /// The `,` frame: an IEEE-754 double, including `inf`/`-inf`/`nan`.
    Double(f64),
    /// The `+` frame: a short inline byte-string guaranteed not to contain a
    /// CRLF.
    SimpleString(Vec<u8>),
    /// The `$` frame: a length-prefixed byte-string that may contain any
    /// bytes.
    BlobString(Vec<u8>),
    /// The `=` frame: like `BlobString`, but the first three bytes of the
    /// wire payload name a format and the fourth is a separating colon. Both
    /// are preserved here rather than discarded.
    VerbatimString {
        /// The three-byte format tag, e.g. `txt` or `mkd`.
        format: [u8; 3],
        /// The payload after the format tag and its separating colon.
        payload: Vec<u8>,
    },
    /// The `*` frame: an ordered sequence of values.
    Array(Vec<Value>),
    /// The `~` frame: an unordered collection of values, kept in wire order
    /// and not de-duplicated.
    Set(Vec<Value>),
    /// The `%` frame: an ordered sequence of key/value pairs.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Returns the byte-string payload of a `SimpleString` or `BlobString`,
    /// or `None` for any other variant.
    ///
    /// A convenience accessor for the common case of reading back a plain
    /// string reply (e.g. `+OK\r\n`) without matching on the full enum.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::SimpleString(b) | Value::BlobString(b) => Some(b),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}
