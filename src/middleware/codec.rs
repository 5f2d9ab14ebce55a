//! Byte encoding for recorded responses.
//!
//! The format is explicit and versioned so that decoding depends only on
//! the bytes, never on in-memory type layout. All integers are big-endian.
//!
//! ```text
//! u8   version (currently 1)
//! u32  header entry count
//!      per entry: u32 name length, name, u32 value length, value
//! u16  status code
//! u32  body length, body
//! ```
//!
//! Header entries are written in map order, so several values under one name
//! come back in the order the handler added them. A field longer than
//! `u32::MAX` bytes cannot be framed and makes [`encode`] fail.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::http::{Headers, RecordedResponse, StatusCode, UnknownStatusCode};

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Errors produced when a response cannot be framed, or bytes are not a
/// valid encoded response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("record truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),

    #[error("header {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error(transparent)]
    Status(#[from] UnknownStatusCode),

    #[error("{0} unexpected bytes after body")]
    TrailingBytes(usize),

    #[error("{field} of {len} bytes exceeds the 32-bit length prefix")]
    TooLong { field: &'static str, len: usize },
}

/// Serializes `response` into a standalone byte buffer.
///
/// # Errors
///
/// Returns [`CodecError::TooLong`] when the header count or any header or
/// body length does not fit in a `u32`.
pub fn encode(response: &RecordedResponse) -> Result<Bytes, CodecError> {
    let header_bytes: usize = response
        .headers
        .iter()
        .map(|(name, value)| 8 + name.len() + value.len())
        .sum();
    let mut buf = BytesMut::with_capacity(1 + 4 + header_bytes + 2 + 4 + response.body.len());

    buf.put_u8(FORMAT_VERSION);

    buf.put_u32(len_u32(response.headers.len(), "header count")?);
    for (name, value) in response.headers.iter() {
        put_chunk(&mut buf, name.as_bytes(), "name")?;
        put_chunk(&mut buf, value.as_bytes(), "value")?;
    }

    buf.put_u16(response.status.as_u16());

    put_chunk(&mut buf, &response.body, "body")?;

    Ok(buf.freeze())
}

/// Rebuilds a response from bytes produced by [`encode`].
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first inconsistency found when
/// `bytes` did not come from [`encode`].
pub fn decode(mut bytes: &[u8]) -> Result<RecordedResponse, CodecError> {
    let version = take_u8(&mut bytes, "version")?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let count = take_u32(&mut bytes, "header count")?;
    let mut headers = Headers::new();
    for _ in 0..count {
        let name = take_str(&mut bytes, "name")?;
        let value = take_str(&mut bytes, "value")?;
        headers.insert(name, value);
    }

    let status = StatusCode::try_from(take_u16(&mut bytes, "status")?)?;

    let body_len = take_u32(&mut bytes, "body length")? as usize;
    let body = take_chunk(&mut bytes, body_len, "body")?;

    if bytes.has_remaining() {
        return Err(CodecError::TrailingBytes(bytes.remaining()));
    }

    Ok(RecordedResponse {
        headers,
        status,
        body: Bytes::copy_from_slice(body),
    })
}

fn len_u32(len: usize, field: &'static str) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::TooLong { field, len })
}

fn put_chunk(buf: &mut BytesMut, data: &[u8], field: &'static str) -> Result<(), CodecError> {
    buf.put_u32(len_u32(data.len(), field)?);
    buf.put_slice(data);
    Ok(())
}

fn take_u8(bytes: &mut &[u8], field: &'static str) -> Result<u8, CodecError> {
    if bytes.remaining() < 1 {
        return Err(CodecError::Truncated { field });
    }
    Ok(bytes.get_u8())
}

fn take_u16(bytes: &mut &[u8], field: &'static str) -> Result<u16, CodecError> {
    if bytes.remaining() < 2 {
        return Err(CodecError::Truncated { field });
    }
    Ok(bytes.get_u16())
}

fn take_u32(bytes: &mut &[u8], field: &'static str) -> Result<u32, CodecError> {
    if bytes.remaining() < 4 {
        return Err(CodecError::Truncated { field });
    }
    Ok(bytes.get_u32())
}

fn take_chunk<'b>(
    bytes: &mut &'b [u8],
    len: usize,
    field: &'static str,
) -> Result<&'b [u8], CodecError> {
    if bytes.len() < len {
        return Err(CodecError::Truncated { field });
    }
    let remaining: &'b [u8] = *bytes;
    let (chunk, rest) = remaining.split_at(len);
    *bytes = rest;
    Ok(chunk)
}

fn take_str<'b>(bytes: &mut &'b [u8], field: &'static str) -> Result<&'b str, CodecError> {
    let len = take_u32(bytes, field)? as usize;
    let chunk = take_chunk(bytes, len, field)?;
    std::str::from_utf8(chunk).map_err(|_| CodecError::InvalidUtf8 { field })
}
