//! Reading and framing the endpoint's HTTP/1.1 response.
//!
//! The body is consumed only to find the end of the message; its contents
//! are not interpreted. Interim `1xx` responses are skipped.

use httparse::Status;

use crate::{error::DeliveryError, transport::Transport};

const BUFFER_SIZE: usize = 8192;
const MAX_HEADERS: usize = 64;

/// What was learned from a complete response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub body_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Informational,
    Empty,
    Length(usize),
    Chunked,
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Head {
    status: u16,
    len: usize,
    framing: Framing,
}

fn malformed(reason: impl Into<String>) -> DeliveryError {
    DeliveryError::MalformedResponse(reason.into())
}

fn parse_head(buf: &[u8]) -> Result<Option<Head>, DeliveryError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);

    let len = match response.parse(buf) {
        Ok(Status::Complete(len)) => len,
        Ok(Status::Partial) => return Ok(None),
        Err(e) => return Err(malformed(e.to_string())),
    };

    let status = response.code.ok_or_else(|| malformed("missing status code"))?;

    let framing = if (100..200).contains(&status) {
        Framing::Informational
    } else if status == 204 || status == 304 {
        Framing::Empty
    } else if let Some(encoding) = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("transfer-encoding"))
    {
        let encoding = String::from_utf8_lossy(encoding.value);
        let last = encoding.rsplit(',').next().unwrap_or_default().trim();
        if last.eq_ignore_ascii_case("chunked") {
            Framing::Chunked
        } else {
            Framing::UntilClose
        }
    } else if let Some(length) = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
    {
        let length = std::str::from_utf8(length.value)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .ok_or_else(|| malformed("invalid Content-Length"))?;
        Framing::Length(length)
    } else {
        Framing::UntilClose
    };

    Ok(Some(Head {
        status,
        len,
        framing,
    }))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Walks a chunked body, returning the decoded length once the terminating
/// chunk and trailer section have arrived.
fn parse_chunked(buf: &[u8]) -> Result<Option<usize>, DeliveryError> {
    let mut pos = 0;
    let mut body_len = 0usize;

    loop {
        let (consumed, size) = match httparse::parse_chunk_size(&buf[pos..]) {
            Ok(Status::Complete(parsed)) => parsed,
            Ok(Status::Partial) => return Ok(None),
            Err(_) => return Err(malformed("invalid chunk size")),
        };
        pos += consumed;

        if size == 0 {
            loop {
                let Some(end) = find_crlf(&buf[pos..]) else {
                    return Ok(None);
                };
                pos += end + 2;
                if end == 0 {
                    return Ok(Some(body_len));
                }
            }
        }

        let size = usize::try_from(size).map_err(|_| malformed("chunk too large"))?;
        let end = pos
            .checked_add(size)
            .and_then(|end| end.checked_add(2))
            .ok_or_else(|| malformed("chunk too large"))?;

        if buf.len() < end {
            return Ok(None);
        }
        if &buf[end - 2..end] != b"\r\n" {
            return Err(malformed("chunk not terminated by CRLF"));
        }

        body_len += size;
        pos = end;
    }
}

/// Attempts to frame a complete response from `buf`.
///
/// `eof` tells whether the peer has closed; it completes bodies delimited
/// by connection close.
///
/// # Returns
///
/// - `Ok(Some(summary))` once a final response is complete
/// - `Ok(None)` if more data is needed
/// - `Err` if the response is malformed
fn parse_response(buf: &[u8], eof: bool) -> Result<Option<ResponseSummary>, DeliveryError> {
    let mut offset = 0;

    loop {
        let Some(head) = parse_head(&buf[offset..])? else {
            return Ok(None);
        };
        let body = &buf[offset + head.len..];

        let body_len = match head.framing {
            Framing::Informational => {
                offset += head.len;
                continue;
            }
            Framing::Empty => Some(0),
            Framing::Length(length) => (body.len() >= length).then_some(length),
            Framing::Chunked => parse_chunked(body)?,
            Framing::UntilClose => eof.then_some(body.len()),
        };

        return Ok(body_len.map(|body_len| ResponseSummary {
            status: head.status,
            body_len,
        }));
    }
}

/// Reads one complete response from `transport` into `buffer`.
///
/// # Errors
///
/// - `ConnectionClosed` if the peer closes before the response is complete
/// - `ResponseTooLarge` if more than `limit` bytes arrive
/// - `MalformedResponse` if the bytes are not HTTP/1.x
/// - `Read` on I/O failure
pub async fn read_response(
    transport: &mut Transport,
    buffer: &mut Vec<u8>,
    limit: usize,
) -> Result<ResponseSummary, DeliveryError> {
    buffer.clear();
    let mut chunk = vec![0u8; BUFFER_SIZE];
    let mut eof = false;

    loop {
        if let Some(summary) = parse_response(buffer, eof)? {
            return Ok(summary);
        }

        if eof {
            return Err(DeliveryError::ConnectionClosed);
        }

        let read = transport.read(&mut chunk).await?;
        if read == 0 {
            eof = true;
            continue;
        }

        if buffer.len() + read > limit {
            return Err(DeliveryError::ResponseTooLarge { limit });
        }

        buffer.extend_from_slice(&chunk[..read]);
    }
}
