//! Codec for encoding and decoding gnat control lines.
//!
//! Every operation is a CRLF-terminated ASCII line. `MSG` (inbound) and `PUB`
//! (outbound) carry a declared payload length followed by exactly that many raw
//! bytes and another CRLF, so payloads may contain anything, including CR and LF.
//!
//! Decoding is streaming: [`decode_from`] returns `Ok(None)` until a whole frame is
//! buffered and only then advances the buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::{ClientOp, Frame};
use crate::info::{ConnectOptions, ServerInfo};

/// Maximum control line length, excluding any payload.
pub const MAX_CONTROL_LINE_SIZE: usize = 4096;

/// Maximum payload size accepted in either direction (64 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

const CRLF: &[u8] = b"\r\n";

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A control line grew past the limit without a newline.
    #[error("Control line of {0} bytes exceeds maximum {MAX_CONTROL_LINE_SIZE}")]
    ControlLineTooLong(usize),

    /// Declared payload exceeds the limit.
    #[error("Payload size {0} exceeds maximum {MAX_PAYLOAD_SIZE}")]
    PayloadTooLarge(usize),

    /// Not enough data to decode frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// Wrong number of arguments for an operation.
    #[error("Malformed {op} line: expected {expected} arguments, got {got}")]
    ArgumentCount {
        op: &'static str,
        expected: &'static str,
        got: usize,
    },

    /// Payload size is negative or not a number.
    #[error("Invalid payload size: {0:?}")]
    InvalidSize(String),

    /// Subscription id is not a number.
    #[error("Invalid subscription id: {0:?}")]
    InvalidSid(String),

    /// Payload was not followed by CRLF.
    #[error("Missing CRLF after payload")]
    MissingTerminator,

    /// Control line is not valid UTF-8.
    #[error("Control line is not valid UTF-8")]
    InvalidUtf8,

    /// A subject, reply or queue token would break line framing.
    #[error("Invalid {field}: {value:?}")]
    InvalidToken { field: &'static str, value: String },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not understood (server-side decoding only).
    #[error("Unknown operation: {0}")]
    UnknownOp(String),
}

/// Outcome of parsing from the front of a buffer.
enum Parsed<T> {
    Complete { item: T, len: usize },
    Partial { needed: usize },
}

/// Encode a client operation to bytes.
///
/// # Errors
///
/// Returns an error if a token is invalid, the payload is too large, or JSON
/// encoding fails.
pub fn encode(op: &ClientOp) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(encoded_len_hint(op));
    encode_into(op, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a client operation into an existing buffer.
///
/// Nothing is written if the operation is rejected.
///
/// # Errors
///
/// Returns an error if a token is invalid, the payload is too large, or JSON
/// encoding fails.
pub fn encode_into(op: &ClientOp, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    match op {
        ClientOp::Connect(options) => {
            let json = serde_json::to_vec(options)?;
            buf.reserve(json.len() + 10);
            buf.put_slice(b"CONNECT ");
            buf.put_slice(&json);
            buf.put_slice(CRLF);
        }
        ClientOp::Pub {
            subject,
            reply_to,
            payload,
        } => {
            validate_token("subject", subject)?;
            let reply = optional_token("reply subject", reply_to.as_deref())?;
            if payload.len() > MAX_PAYLOAD_SIZE {
                return Err(ProtocolError::PayloadTooLarge(payload.len()));
            }

            // An absent reply is an empty token: `PUB foo  3`.
            buf.reserve(subject.len() + reply.len() + payload.len() + 32);
            buf.put_slice(b"PUB ");
            buf.put_slice(subject.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(reply.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(payload.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(payload);
            buf.put_slice(CRLF);
        }
        ClientOp::Sub {
            subject,
            queue,
            sid,
        } => {
            validate_token("subject", subject)?;
            let queue = optional_token("queue group", queue.as_deref())?;

            buf.put_slice(b"SUB ");
            buf.put_slice(subject.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(queue.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(sid.to_string().as_bytes());
            buf.put_slice(CRLF);
        }
        ClientOp::Unsub { sid, max_msgs } => {
            buf.put_slice(b"UNSUB ");
            buf.put_slice(sid.to_string().as_bytes());
            if let Some(max) = max_msgs {
                buf.put_u8(b' ');
                buf.put_slice(max.to_string().as_bytes());
            }
            buf.put_slice(CRLF);
        }
        ClientOp::Ping => buf.put_slice(b"PING\r\n"),
        ClientOp::Pong => buf.put_slice(b"PONG\r\n"),
    }

    Ok(())
}

/// Decode a single server frame from a complete byte slice.
///
/// # Errors
///
/// Returns `Incomplete` if the slice ends before the frame does, or any other
/// protocol error for malformed input.
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    match parse_frame(data)? {
        Parsed::Complete { item, .. } => Ok(item),
        Parsed::Partial { needed } => Err(ProtocolError::Incomplete(needed)),
    }
}

/// Try to decode a server frame from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(frame))` if a complete frame was decoded,
/// `Ok(None)` if more data is needed, or `Err` on protocol error.
///
/// # Errors
///
/// Returns an error if the buffered data can never form a valid frame.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    match parse_frame(buf)? {
        Parsed::Complete { item, len } => {
            buf.advance(len);
            Ok(Some(item))
        }
        Parsed::Partial { .. } => Ok(None),
    }
}

/// Encode a server frame. Used by mock servers and conformance tests.
///
/// # Errors
///
/// Returns an error if JSON encoding of `INFO` fails or a token is invalid.
pub fn encode_frame(frame: &Frame, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    match frame {
        Frame::Info(info) => {
            let json = serde_json::to_vec(info)?;
            buf.put_slice(b"INFO ");
            buf.put_slice(&json);
            buf.put_slice(CRLF);
        }
        Frame::Msg {
            subject,
            reply_to,
            sid,
            payload,
        } => {
            validate_token("subject", subject)?;
            let reply = optional_token("reply subject", reply_to.as_deref())?;

            buf.reserve(subject.len() + reply.len() + payload.len() + 48);
            buf.put_slice(b"MSG ");
            buf.put_slice(subject.as_bytes());
            buf.put_u8(b' ');
            buf.put_slice(sid.to_string().as_bytes());
            if !reply.is_empty() {
                buf.put_u8(b' ');
                buf.put_slice(reply.as_bytes());
            }
            buf.put_u8(b' ');
            buf.put_slice(payload.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(payload);
            buf.put_slice(CRLF);
        }
        Frame::Ping => buf.put_slice(b"PING\r\n"),
        Frame::Pong => buf.put_slice(b"PONG\r\n"),
        Frame::Ok => buf.put_slice(b"+OK\r\n"),
        Frame::Err(text) => {
            buf.put_slice(b"-ERR '");
            buf.put_slice(text.as_bytes());
            buf.put_slice(b"'\r\n");
        }
        Frame::Unknown(op) => {
            buf.put_slice(op.as_bytes());
            buf.put_slice(CRLF);
        }
    }

    Ok(())
}

/// Try to decode a client operation from a buffer, advancing it if successful.
/// Used by mock servers and conformance tests.
///
/// # Errors
///
/// Returns an error for malformed or unknown operations.
pub fn decode_op_from(buf: &mut BytesMut) -> Result<Option<ClientOp>, ProtocolError> {
    match parse_op(buf)? {
        Parsed::Complete { item, len } => {
            buf.advance(len);
            Ok(Some(item))
        }
        Parsed::Partial { .. } => Ok(None),
    }
}

fn parse_frame(data: &[u8]) -> Result<Parsed<Frame>, ProtocolError> {
    let Some((line, line_len)) = control_line(data)? else {
        return Ok(Parsed::Partial { needed: 1 });
    };
    let (op, args) = split_op(line);

    let frame = match op.to_ascii_uppercase().as_str() {
        "MSG" => {
            let header = parse_msg_args(args)?;
            return match payload_at(data, line_len, header.size)? {
                Some((payload, len)) => Ok(Parsed::Complete {
                    item: Frame::Msg {
                        subject: header.subject,
                        reply_to: header.reply_to,
                        sid: header.sid,
                        payload,
                    },
                    len,
                }),
                None => Ok(Parsed::Partial {
                    needed: line_len + header.size + CRLF.len() - data.len(),
                }),
            };
        }
        // Malformed INFO documents are tolerated; the fields are advisory.
        "INFO" => Frame::Info(ServerInfo::from_json(args).unwrap_or_default()),
        "PING" => Frame::Ping,
        "PONG" => Frame::Pong,
        "+OK" => Frame::Ok,
        "-ERR" => Frame::Err(args.trim_matches('\'').to_string()),
        _ => Frame::Unknown(op.to_string()),
    };

    Ok(Parsed::Complete {
        item: frame,
        len: line_len,
    })
}

fn parse_op(data: &[u8]) -> Result<Parsed<ClientOp>, ProtocolError> {
    let Some((line, line_len)) = control_line(data)? else {
        return Ok(Parsed::Partial { needed: 1 });
    };
    let (op, args) = split_op(line);
    let tokens: Vec<&str> = args.split_ascii_whitespace().collect();

    let op = match op.to_ascii_uppercase().as_str() {
        "PUB" => {
            let (subject, reply_to, size) = match tokens.as_slice() {
                [subject, size] => (*subject, None, *size),
                [subject, reply, size] => (*subject, Some(reply.to_string()), *size),
                other => {
                    return Err(ProtocolError::ArgumentCount {
                        op: "PUB",
                        expected: "2 or 3",
                        got: other.len(),
                    })
                }
            };
            let size = parse_size(size)?;
            return match payload_at(data, line_len, size)? {
                Some((payload, len)) => Ok(Parsed::Complete {
                    item: ClientOp::Pub {
                        subject: subject.to_string(),
                        reply_to,
                        payload,
                    },
                    len,
                }),
                None => Ok(Parsed::Partial {
                    needed: line_len + size + CRLF.len() - data.len(),
                }),
            };
        }
        "SUB" => match tokens.as_slice() {
            [subject, sid] => ClientOp::subscribe(*subject, None, parse_sid(sid)?),
            [subject, queue, sid] => {
                ClientOp::subscribe(*subject, Some(queue.to_string()), parse_sid(sid)?)
            }
            other => {
                return Err(ProtocolError::ArgumentCount {
                    op: "SUB",
                    expected: "2 or 3",
                    got: other.len(),
                })
            }
        },
        "UNSUB" => match tokens.as_slice() {
            [sid] => ClientOp::unsubscribe(parse_sid(sid)?),
            [sid, max] => ClientOp::Unsub {
                sid: parse_sid(sid)?,
                max_msgs: Some(
                    max.parse()
                        .map_err(|_| ProtocolError::InvalidSize(max.to_string()))?,
                ),
            },
            other => {
                return Err(ProtocolError::ArgumentCount {
                    op: "UNSUB",
                    expected: "1 or 2",
                    got: other.len(),
                })
            }
        },
        "CONNECT" => ClientOp::Connect(serde_json::from_str::<ConnectOptions>(args)?),
        "PING" => ClientOp::Ping,
        "PONG" => ClientOp::Pong,
        _ => return Err(ProtocolError::UnknownOp(op.to_string())),
    };

    Ok(Parsed::Complete {
        item: op,
        len: line_len,
    })
}

struct MsgHeader {
    subject: String,
    sid: u64,
    reply_to: Option<String>,
    size: usize,
}

fn parse_msg_args(args: &str) -> Result<MsgHeader, ProtocolError> {
    let tokens: Vec<&str> = args.split_ascii_whitespace().collect();
    let (subject, sid, reply_to, size) = match tokens.as_slice() {
        // MSG foo 1 3
        [subject, sid, size] => (*subject, *sid, None, *size),
        // MSG foo 1 bar 4
        [subject, sid, reply, size] => (*subject, *sid, Some(reply.to_string()), *size),
        other => {
            return Err(ProtocolError::ArgumentCount {
                op: "MSG",
                expected: "3 or 4",
                got: other.len(),
            })
        }
    };

    Ok(MsgHeader {
        subject: subject.to_string(),
        sid: parse_sid(sid)?,
        reply_to,
        size: parse_size(size)?,
    })
}

/// Find the first control line. Returns the line without its terminator and the
/// number of bytes it occupies including the terminator.
fn control_line(data: &[u8]) -> Result<Option<(&str, usize)>, ProtocolError> {
    match data.iter().position(|&b| b == b'\n') {
        Some(pos) if pos > MAX_CONTROL_LINE_SIZE => Err(ProtocolError::ControlLineTooLong(pos)),
        Some(pos) => {
            let raw = &data[..pos];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
            Ok(Some((line, pos + 1)))
        }
        None if data.len() > MAX_CONTROL_LINE_SIZE => {
            Err(ProtocolError::ControlLineTooLong(data.len()))
        }
        None => Ok(None),
    }
}

/// Split a control line into its verb and the remaining arguments.
fn split_op(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(|c: char| c == ' ' || c == '\t') {
        Some(i) => (&line[..i], line[i..].trim()),
        None => (line, ""),
    }
}

/// Slice out `size` payload bytes after the control line and check the CRLF.
/// Returns `None` if the payload has not fully arrived.
fn payload_at(
    data: &[u8],
    line_len: usize,
    size: usize,
) -> Result<Option<(Bytes, usize)>, ProtocolError> {
    let payload_end = line_len + size;
    let total = payload_end + CRLF.len();
    if data.len() < total {
        return Ok(None);
    }
    if &data[payload_end..total] != CRLF {
        return Err(ProtocolError::MissingTerminator);
    }
    Ok(Some((
        Bytes::copy_from_slice(&data[line_len..payload_end]),
        total,
    )))
}

fn parse_size(token: &str) -> Result<usize, ProtocolError> {
    let size: usize = token
        .parse()
        .map_err(|_| ProtocolError::InvalidSize(token.to_string()))?;
    if size > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(size));
    }
    Ok(size)
}

fn parse_sid(token: &str) -> Result<u64, ProtocolError> {
    token
        .parse()
        .map_err(|_| ProtocolError::InvalidSid(token.to_string()))
}

/// Check that a subject can be written on a control line.
///
/// # Errors
///
/// Returns `InvalidToken` for empty subjects or ones containing whitespace.
pub fn validate_subject(subject: &str) -> Result<(), ProtocolError> {
    validate_token("subject", subject)
}

/// Check an optional queue group. `None` and `""` are both "no queue".
///
/// # Errors
///
/// Returns `InvalidToken` if the queue contains whitespace or control characters.
pub fn validate_queue(queue: Option<&str>) -> Result<(), ProtocolError> {
    optional_token("queue group", queue).map(|_| ())
}

fn validate_token(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProtocolError::InvalidToken {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Validate an optional token, mapping `None` and `""` to the empty token.
fn optional_token<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ProtocolError> {
    match value {
        Some(v) if !v.is_empty() => {
            validate_token(field, v)?;
            Ok(v)
        }
        _ => Ok(""),
    }
}

fn encoded_len_hint(op: &ClientOp) -> usize {
    match op {
        ClientOp::Pub {
            subject, payload, ..
        } => subject.len() + payload.len() + 64,
        _ => 64,
    }
}
