//! MessagePack-RPC framing for the editor channel.
//!
//! Every frame on the wire is a single MessagePack array:
//!
//! ```text
//! request       [0, id:uint, method:str, params:array]
//! response      [1, id:uint, error:any,  result:any]
//! notification  [2, method:str, params:array]
//! ```
//!
//! Frames are self-delimiting, so there is no length header like the
//! Content-Length framing used for JSON-RPC. A decoder that hits the end of
//! the buffer mid-value reports [`CodecError::Incomplete`] and the caller
//! retries from the same offset once more bytes have arrived.

use std::io;

use rmpv::Value;
use thiserror::Error;

/// Message type tag for requests.
pub const REQUEST: u64 = 0;
/// Message type tag for responses.
pub const RESPONSE: u64 = 1;
/// Message type tag for notifications.
pub const NOTIFICATION: u64 = 2;

/// Codec-level failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ends in the middle of a frame. Not fatal: read more bytes
    /// and decode again from the same offset.
    #[error("Incomplete frame")]
    Incomplete,

    /// The bytes can never form a valid value. The stream is out of sync.
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// A well-formed value that is not a response or notification envelope.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Serializing an outgoing request failed.
    #[error("Encode error: {0}")]
    Encode(String),
}

impl CodecError {
    /// Whether the connection can survive this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::Incomplete)
    }
}

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Response {
        id: u32,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

/// Serialize `[0, id, method, params]`.
///
/// The whole frame is built in memory so the transport can write it in one
/// piece.
pub fn encode_request(id: u32, method: &str, params: Vec<Value>) -> Result<Vec<u8>, CodecError> {
    let frame = Value::Array(vec![
        Value::from(REQUEST),
        Value::from(id),
        Value::from(method),
        Value::Array(params),
    ]);

    let mut buf = Vec::with_capacity(32 + method.len());
    rmpv::encode::write_value(&mut buf, &frame).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode exactly one value starting at `offset`.
///
/// Returns the value and the number of bytes it occupied.
pub fn decode(buf: &[u8], offset: usize) -> Result<(Value, usize), CodecError> {
    let Some(mut rest) = buf.get(offset..) else {
        return Err(CodecError::Incomplete);
    };
    if rest.is_empty() {
        return Err(CodecError::Incomplete);
    }

    let available = rest.len();
    let value = rmpv::decode::read_value(&mut rest).map_err(classify)?;
    Ok((value, available - rest.len()))
}

/// Decode one value and classify it as an envelope.
pub fn decode_message(buf: &[u8], offset: usize) -> Result<(Message, usize), CodecError> {
    let (value, consumed) = decode(buf, offset)?;
    Ok((Message::from_value(value)?, consumed))
}

/// Finds frame boundaries from MessagePack headers alone, without building
/// values.
///
/// Progress is kept between calls: while a frame is unfinished, callers
/// pass the same buffer with more bytes appended, and only the headers not
/// yet walked are examined. Each byte is scanned once however the frame is
/// split across reads.
#[derive(Debug)]
pub struct FrameScanner {
    max_frame: usize,
    /// Bytes of the current frame already walked.
    pos: usize,
    /// Values still needed to finish the current frame.
    remaining: usize,
}

impl FrameScanner {
    /// A scanner rejecting frames longer than `max_frame` bytes.
    pub fn new(max_frame: usize) -> Self {
        Self {
            max_frame,
            pos: 0,
            remaining: 1,
        }
    }

    /// Length of the frame at the start of `buf`, or `Incomplete`.
    ///
    /// After a length is returned the scanner starts over on the next
    /// frame, which the caller passes starting at offset 0.
    pub fn scan(&mut self, buf: &[u8]) -> Result<usize, CodecError> {
        while self.remaining > 0 {
            let rest = buf.get(self.pos..).unwrap_or_default();
            let (size, children) = value_extent(rest)?;
            let end = self.pos.saturating_add(size);
            if end > self.max_frame {
                return Err(CodecError::Malformed(format!(
                    "frame exceeds maximum {} bytes",
                    self.max_frame
                )));
            }
            if end > buf.len() {
                return Err(CodecError::Incomplete);
            }
            self.pos = end;
            self.remaining = (self.remaining - 1).saturating_add(children);
        }

        let len = self.pos;
        self.pos = 0;
        self.remaining = 1;
        Ok(len)
    }
}

/// `(encoded size, nested value count)` of the value whose header starts
/// `buf`.
fn value_extent(buf: &[u8]) -> Result<(usize, usize), CodecError> {
    let marker = *buf.first().ok_or(CodecError::Incomplete)?;
    let extent = match marker {
        0x00..=0x7f | 0xe0..=0xff | 0xc0 | 0xc2 | 0xc3 => (1, 0),
        0x80..=0x8f => (1, 2 * usize::from(marker & 0x0f)),
        0x90..=0x9f => (1, usize::from(marker & 0x0f)),
        0xa0..=0xbf => (1 + usize::from(marker & 0x1f), 0),
        0xc1 => return Err(CodecError::Malformed("reserved marker 0xc1".to_string())),
        // bin 8/16/32, str 8/16/32
        0xc4 | 0xd9 => (be_len(buf, 1)?.saturating_add(2), 0),
        0xc5 | 0xda => (be_len(buf, 2)?.saturating_add(3), 0),
        0xc6 | 0xdb => (be_len(buf, 4)?.saturating_add(5), 0),
        // ext 8/16/32 carry a type byte after the length
        0xc7 => (be_len(buf, 1)?.saturating_add(3), 0),
        0xc8 => (be_len(buf, 2)?.saturating_add(4), 0),
        0xc9 => (be_len(buf, 4)?.saturating_add(6), 0),
        0xcc | 0xd0 => (2, 0),
        0xcd | 0xd1 => (3, 0),
        0xca | 0xce | 0xd2 => (5, 0),
        0xcb | 0xcf | 0xd3 => (9, 0),
        // fixext 1/2/4/8/16
        0xd4 => (3, 0),
        0xd5 => (4, 0),
        0xd6 => (6, 0),
        0xd7 => (10, 0),
        0xd8 => (18, 0),
        0xdc => (3, be_len(buf, 2)?),
        0xdd => (5, be_len(buf, 4)?),
        0xde => (3, be_len(buf, 2)?.saturating_mul(2)),
        0xdf => (5, be_len(buf, 4)?.saturating_mul(2)),
    };
    Ok(extent)
}

/// Big-endian length field of `width` bytes following the marker.
fn be_len(buf: &[u8], width: usize) -> Result<usize, CodecError> {
    let bytes = buf.get(1..1 + width).ok_or(CodecError::Incomplete)?;
    let len = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok(usize::try_from(len).unwrap_or(usize::MAX))
}

/// Running out of bytes shows up as `UnexpectedEof` from whichever read hit
/// the end; anything else means the stream is corrupt.
fn classify(err: rmpv::decode::Error) -> CodecError {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(ref e) | rmpv::decode::Error::InvalidDataRead(ref e)
            if e.kind() == io::ErrorKind::UnexpectedEof =>
        {
            CodecError::Incomplete
        }
        other => CodecError::Malformed(other.to_string()),
    }
}

impl Message {
    /// Classify a top-level value by array length and tag.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let Value::Array(mut items) = value else {
            return Err(CodecError::Protocol(format!(
                "expected array envelope, got {}",
                value
            )));
        };

        let tag = items.first().and_then(Value::as_u64);
        match (items.len(), tag) {
            (4, Some(RESPONSE)) => {
                let result = items.pop().unwrap_or(Value::Nil);
                let error = items.pop().unwrap_or(Value::Nil);
                let id = items[1]
                    .as_u64()
                    .and_then(|id| u32::try_from(id).ok())
                    .ok_or_else(|| {
                        CodecError::Protocol(format!("invalid response id: {}", items[1]))
                    })?;
                Ok(Message::Response { id, error, result })
            }
            (3, Some(NOTIFICATION)) => {
                let params = match items.pop() {
                    Some(Value::Array(params)) => params,
                    Some(other) => {
                        return Err(CodecError::Protocol(format!(
                            "notification params must be an array, got {}",
                            other
                        )))
                    }
                    None => Vec::new(),
                };
                let method = match items.pop() {
                    Some(Value::String(s)) => s.into_str().ok_or_else(|| {
                        CodecError::Protocol("notification method is not UTF-8".to_string())
                    })?,
                    other => {
                        return Err(CodecError::Protocol(format!(
                            "notification method must be a string, got {:?}",
                            other
                        )))
                    }
                };
                Ok(Message::Notification { method, params })
            }
            (len, tag) => Err(CodecError::Protocol(format!(
                "unexpected envelope (length {}, tag {:?})",
                len, tag
            ))),
        }
    }
}
