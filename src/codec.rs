//! Pure encode/decode/discard functions over a buffered reader and a writer.
//!
//! None of these functions know about a particular connection — they take a
//! generic `BufRead`/`Write` and report failures as [`CodecError`], which
//! carries no host/port context. [`crate::connection::Connection`] is the
//! only thing that adds that context, turning a `CodecError` into a
//! [`crate::ConnectionError`].

use std::io::{self, BufRead, Read, Write};

use crate::command::Command;
use crate::error::{CodecError, ResponseError, UnsupportedTag};
use crate::value::Value;

/// Writes `cmd` as a RESP3 request: `*<N>\r\n` followed by one `$<len>\r\n<bytes>\r\n`
/// block per argument. Does not flush — the caller drives that, so several
/// writes can be coalesced into one flush if ever needed.
pub fn encode_command<W: Write>(w: &mut W, cmd: &Command) -> io::Result<()> {
    write!(w, "*{}\r\n", cmd.len())?;
    for arg in cmd.iter() {
        write!(w, "${}\r\n", arg.len())?;
        w.write_all(arg)?;
        w.write_all(b"\r\n")?;
    }
    Ok(())
}

/// Decodes exactly one response from `r`.
///
/// `line_limit` bounds the length of a single header line (the one place an
/// unterminated or adversarial stream could otherwise force unbounded
/// buffering); it does not bound the size of a blob body, which is read in
/// one `read_exact` once its announced length is known.
pub fn decode_response<R: BufRead>(r: &mut R, line_limit: usize) -> Result<Value, CodecError> {
    let header = read_header_line(r, line_limit)?;
    let (tag, payload) = split_header(&header)?;

    match tag {
        b'+' => Ok(Value::SimpleString(payload.to_vec())),
        b'-' => Err(ResponseError::from_payload(payload).into()),
        b':' => Ok(Value::Integer(parse_i64(payload)?)),
        b'(' => {
            validate_big_number(payload)?;
            Ok(Value::BigNumber(payload.to_vec()))
        }
        b',' => Ok(Value::Double(parse_f64(payload)?)),
        b'#' => parse_boolean(payload).map(Value::Boolean),
        b'_' => Ok(Value::Null),
        b'$' => Ok(Value::BlobString(read_blob_body(r, payload)?)),
        b'!' => Err(ResponseError::from_payload(&read_blob_body(r, payload)?).into()),
        b'=' => read_verbatim_body(r, payload),
        b'*' => {
            let count = parse_usize(payload)?;
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(decode_response(r, line_limit)?);
            }
            Ok(Value::Array(items))
        }
        b'~' => {
            let count = parse_usize(payload)?;
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(decode_response(r, line_limit)?);
            }
            Ok(Value::Set(items))
        }
        b'%' => {
            let count = parse_usize(payload)?;
            let mut items = Vec::new();
            for _ in 0..count {
                let key = decode_response(r, line_limit)?;
                let value = decode_response(r, line_limit)?;
                items.push((key, value));
            }
            Ok(Value::Map(items))
        }
        b'>' => Err(UnsupportedTag::Push.into()),
        b'|' => Err(UnsupportedTag::Attribute.into()),
        other => Err(unknown_tag_error(other).into()),
    }
}

/// Consumes exactly one response from `r` without materializing it.
///
/// Aggregate tags recurse `<count>` (`2×<count>` for maps) times, matching
/// `decode_response` exactly — a shallower, single-level recursion would
/// leave the stream mis-framed for anything but the simplest aggregates.
/// Unknown tags are consumed silently (after their header line) rather than
/// raising, since discarding already signals the caller doesn't care what the
/// response was.
pub fn discard_response<R: BufRead>(r: &mut R, line_limit: usize) -> Result<(), CodecError> {
    let header = read_header_line(r, line_limit)?;
    let (tag, payload) = split_header(&header)?;

    match tag {
        b'+' | b'-' | b':' | b'(' | b',' | b'#' | b'_' => Ok(()),
        b'$' | b'!' | b'=' => discard_blob_body(r, payload),
        b'*' | b'~' => {
            let count = parse_usize(payload)?;
            for _ in 0..count {
                discard_response(r, line_limit)?;
            }
            Ok(())
        }
        b'%' => {
            let count = parse_usize(payload)?;
            for _ in 0..count.saturating_mul(2) {
                discard_response(r, line_limit)?;
            }
            Ok(())
        }
        b'>' => Err(UnsupportedTag::Push.into()),
        b'|' => Err(UnsupportedTag::Attribute.into()),
        _ => Ok(()),
    }
}

/// Reads one header line (everything up to and including the terminating
/// CRLF), bounded by `line_limit`, and returns it with the CRLF stripped.
///
/// A bare CRLF with no tag byte is not a frame at all — it's silently
/// skipped and the next header line is read in its place, rather than
/// surfaced as a malformed-stream error.
fn read_header_line<R: BufRead>(r: &mut R, line_limit: usize) -> Result<Vec<u8>, CodecError> {
    loop {
        let mut line = Vec::new();
        let read = r.by_ref().take(line_limit as u64 + 2).read_until(b'\n', &mut line)?;

        if read == 0 {
            return Err(incomplete("connection closed while reading a response header").into());
        }
        if !line.ends_with(b"\r\n") {
            return Err(incomplete(
                "response header exceeded the configured buffer limit, or is missing its CRLF terminator",
            )
            .into());
        }

        line.truncate(line.len() - 2);
        if line.is_empty() {
            continue;
        }
        return Ok(line);
    }
}

fn split_header(line: &[u8]) -> Result<(u8, &[u8]), CodecError> {
    match line.split_first() {
        Some((tag, payload)) => Ok((*tag, payload)),
        // Unreachable in practice: `read_header_line` never returns an empty
        // line, looping past a bare CRLF instead.
        None => Err(incomplete("response header was empty").into()),
    }
}

fn read_blob_body<R: Read>(r: &mut R, len_payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = parse_usize(len_payload)?;
    let mut buf = vec![0u8; len + 2];
    r.read_exact(&mut buf)?;
    if &buf[len..] != b"\r\n" {
        return Err(incomplete("blob body was missing its CRLF terminator").into());
    }
    buf.truncate(len);
    Ok(buf)
}

fn discard_blob_body<R: Read>(r: &mut R, len_payload: &[u8]) -> Result<(), CodecError> {
    let len = parse_usize(len_payload)?;
    let mut buf = vec![0u8; len + 2];
    r.read_exact(&mut buf)?;
    if &buf[len..] != b"\r\n" {
        return Err(incomplete("blob body was missing its CRLF terminator").into());
    }
    Ok(())
}

fn read_verbatim_body<R: Read>(r: &mut R, len_payload: &[u8]) -> Result<Value, CodecError> {
    let body = read_blob_body(r, len_payload)?;
    if body.len() < 4 || body[3] != b':' {
        return Err(incomplete("verbatim string was missing its format prefix").into());
    }

    let mut format = [0u8; 3];
    format.copy_from_slice(&body[..3]);
    Ok(Value::VerbatimString {
        format,
        payload: body[4..].to_vec(),
    })
}

fn parse_boolean(payload: &[u8]) -> Result<bool, CodecError> {
    match payload {
        b"t" => Ok(true),
        b"f" => Ok(false),
        _ => Err(ResponseError {
            code: "ERR".to_owned(),
            message: format!(
                "invalid boolean payload {:?}",
                String::from_utf8_lossy(payload)
            ),
        }
        .into()),
    }
}

fn parse_usize(payload: &[u8]) -> Result<usize, CodecError> {
    let text = std::str::from_utf8(payload)?;
    text.parse()
        .map_err(|e| malformed(format!("invalid length or count {text:?}: {e}")))
}

fn parse_i64(payload: &[u8]) -> Result<i64, CodecError> {
    let text = std::str::from_utf8(payload)?;
    text.parse()
        .map_err(|e| malformed(format!("invalid integer {text:?}: {e}")))
}

fn parse_f64(payload: &[u8]) -> Result<f64, CodecError> {
    let text = std::str::from_utf8(payload)?;
    text.parse()
        .map_err(|e| malformed(format!("invalid double {text:?}: {e}")))
}

fn validate_big_number(payload: &[u8]) -> Result<(), CodecError> {
    let text = std::str::from_utf8(payload)?;
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("invalid big number {text:?}")));
    }
    Ok(())
}

fn unknown_tag_error(tag: u8) -> ResponseError {
    ResponseError {
        code: (tag as char).to_string(),
        message: format!("{:?} is not a valid response type", tag as char),
    }
}

/// A header or length field that failed to parse leaves the stream
/// untrustworthy in the same way a truncated read does, so both are
/// represented as [`CodecError::Io`] rather than [`CodecError::Response`],
/// which is reserved for the cases the protocol spells out explicitly.
fn malformed(message: String) -> CodecError {
    incomplete(message).into()
}

fn incomplete(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::command::Command;

    const LIMIT: usize = 6000;

    fn decode(input: &[u8]) -> Result<Value, CodecError> {
        let mut cursor = Cursor::new(input);
        decode_response(&mut cursor, LIMIT)
    }

    #[test]
    fn encodes_set_command() {
        let cmd = Command::new("SET").arg("k").arg("v");
        let mut buf = Vec::new();
        encode_command(&mut buf, &cmd).unwrap();
        assert_eq!(buf, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[test]
    fn encodes_zero_length_argument() {
        let cmd = Command::new("SET").arg("k").arg("");
        let mut buf = Vec::new();
        encode_command(&mut buf, &cmd).unwrap();
        assert_eq!(buf, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    }

    #[test]
    fn decodes_simple_string() {
        assert_eq!(
            decode(b"+OK\r\n").unwrap(),
            Value::SimpleString(b"OK".to_vec())
        );
    }

    #[test]
    fn decodes_blob_string() {
        assert_eq!(
            decode(b"$11\r\nhello world\r\n").unwrap(),
            Value::BlobString(b"hello world".to_vec())
        );
    }

    #[test]
    fn decodes_zero_length_blob_string() {
        assert_eq!(decode(b"$0\r\n\r\n").unwrap(), Value::BlobString(vec![]));
    }

    #[test]
    fn decodes_null() {
        assert_eq!(decode(b"_\r\n").unwrap(), Value::Null);
    }

    #[test]
    fn decodes_empty_array_and_map() {
        assert_eq!(decode(b"*0\r\n").unwrap(), Value::Array(vec![]));
        assert_eq!(decode(b"%0\r\n").unwrap(), Value::Map(vec![]));
    }

    #[test]
    fn decodes_nested_aggregate() {
        let value = decode(b"*2\r\n*1\r\n:1\r\n*0\r\n").unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Array(vec![Value::Integer(1)]), Value::Array(vec![])])
        );
    }

    #[test]
    fn decodes_map_pairing_keys_and_values() {
        let value = decode(b"%2\r\n$5\r\nproto\r\n:3\r\n$2\r\nid\r\n:42\r\n").unwrap();
        assert_eq!(
            value,
            Value::Map(vec![
                (Value::BlobString(b"proto".to_vec()), Value::Integer(3)),
                (Value::BlobString(b"id".to_vec()), Value::Integer(42)),
            ])
        );
    }

    #[test]
    fn decodes_set_without_deduplicating() {
        let value = decode(b"~3\r\n:1\r\n:1\r\n:2\r\n").unwrap();
        assert_eq!(
            value,
            Value::Set(vec![Value::Integer(1), Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn decodes_big_number() {
        assert_eq!(
            decode(b"(3492890328409238509324850943850943825024385\r\n").unwrap(),
            Value::BigNumber(b"3492890328409238509324850943850943825024385".to_vec())
        );
    }

    #[test]
    fn decodes_verbatim_string_preserving_format() {
        let value = decode(b"=15\r\ntxt:Some string\r\n").unwrap();
        assert_eq!(
            value,
            Value::VerbatimString {
                format: *b"txt",
                payload: b"Some string".to_vec(),
            }
        );
    }

    #[test]
    fn decodes_booleans() {
        assert_eq!(decode(b"#t\r\n").unwrap(), Value::Boolean(true));
        assert_eq!(decode(b"#f\r\n").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn invalid_boolean_is_response_error() {
        assert_matches!(decode(b"#x\r\n"), Err(CodecError::Response(_)));
    }

    #[test]
    fn decodes_doubles_including_special_values() {
        assert_eq!(decode(b",3.141\r\n").unwrap(), Value::Double(3.141));
        assert_eq!(decode(b",inf\r\n").unwrap(), Value::Double(f64::INFINITY));
        assert_eq!(decode(b",-inf\r\n").unwrap(), Value::Double(f64::NEG_INFINITY));
        assert_matches!(decode(b",nan\r\n"), Ok(Value::Double(n)) if n.is_nan());
    }

    #[test]
    fn simple_error_aborts_with_response_error() {
        let err = decode(b"-ERR wrong number of arguments\r\n").unwrap_err();
        assert_matches!(err, CodecError::Response(ResponseError { ref code, ref message })
            if code == "ERR" && message == "wrong number of arguments");
    }

    #[test]
    fn blob_error_aborts_with_response_error() {
        let err = decode(b"!21\r\nSYNTAX invalid syntax\r\n").unwrap_err();
        assert_matches!(err, CodecError::Response(ResponseError { ref code, .. }) if code == "SYNTAX");
    }

    #[test]
    fn error_nested_in_aggregate_propagates_out() {
        let err = decode(b"*2\r\n:1\r\n-ERR nope\r\n").unwrap_err();
        assert_matches!(err, CodecError::Response(_));
    }

    #[test]
    fn truncated_blob_body_is_io_error() {
        assert_matches!(decode(b"$5\r\nab\r\n"), Err(CodecError::Io(_)));
    }

    #[test]
    fn unknown_tag_on_decode_is_response_error() {
        assert_matches!(decode(b"?x\r\n"), Err(CodecError::Response(_)));
    }

    #[test]
    fn push_and_attribute_are_unsupported() {
        assert_matches!(decode(b">1\r\n:1\r\n"), Err(CodecError::Unsupported(UnsupportedTag::Push)));
        assert_matches!(decode(b"|1\r\n+k\r\n+v\r\n"), Err(CodecError::Unsupported(UnsupportedTag::Attribute)));
    }

    #[test]
    fn discard_consumes_whole_map_and_reports_nothing() {
        let input = b"%2\r\n$5\r\nproto\r\n:3\r\n$2\r\nid\r\n:42\r\nPAST";
        let mut cursor = Cursor::new(&input[..]);
        discard_response(&mut cursor, LIMIT).unwrap();

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"PAST");
    }

    #[test]
    fn discard_consumes_every_element_of_a_multi_item_array() {
        // Regression guard: a discard that recurses only once (rather than
        // `count` times) would leave "+c\r\n" unconsumed here.
        let input = b"*3\r\n+a\r\n+b\r\n+c\r\nAFTER";
        let mut cursor = Cursor::new(&input[..]);
        discard_response(&mut cursor, LIMIT).unwrap();

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"AFTER");
    }

    #[test]
    fn discard_matches_decode_byte_count() {
        let input = b"*2\r\n$6\r\nstream\r\n*1\r\n*2\r\n$3\r\n1-0\r\n*2\r\n$1\r\nk\r\n$1\r\nv\r\n";

        let mut decode_cursor = Cursor::new(&input[..]);
        decode_response(&mut decode_cursor, LIMIT).unwrap();

        let mut discard_cursor = Cursor::new(&input[..]);
        discard_response(&mut discard_cursor, LIMIT).unwrap();

        assert_eq!(decode_cursor.position(), discard_cursor.position());
    }

    #[test]
    fn discard_of_unknown_tag_is_silent() {
        let input = b"?whatever\r\nAFTER";
        let mut cursor = Cursor::new(&input[..]);
        discard_response(&mut cursor, LIMIT).unwrap();

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"AFTER");
    }

    #[test]
    fn discard_of_blob_reads_trailing_crlf() {
        let input = b"$5\r\nhello\r\nAFTER";
        let mut cursor = Cursor::new(&input[..]);
        discard_response(&mut cursor, LIMIT).unwrap();

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"AFTER");
    }

    #[test]
    fn discard_of_push_is_unsupported() {
        assert_matches!(
            discard_response(&mut Cursor::new(&b">1\r\n:1\r\n"[..]), LIMIT),
            Err(CodecError::Unsupported(UnsupportedTag::Push))
        );
    }

    #[test]
    fn bare_crlf_header_is_skipped_not_an_error() {
        assert_eq!(
            decode(b"\r\n+OK\r\n").unwrap(),
            Value::SimpleString(b"OK".to_vec())
        );
    }

    #[test]
    fn discard_skips_leading_bare_crlf_too() {
        let input = b"\r\n+OK\r\nAFTER";
        let mut cursor = Cursor::new(&input[..]);
        discard_response(&mut cursor, LIMIT).unwrap();

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"AFTER");
    }

    #[test]
    fn header_line_over_limit_is_io_error() {
        let mut input = Vec::new();
        input.push(b'+');
        input.extend(std::iter::repeat(b'a').take(64));
        input.extend_from_slice(b"\r\n");

        let mut cursor = Cursor::new(&input[..]);
        assert_matches!(decode_response(&mut cursor, 8), Err(CodecError::Io(_)));
    }
}
