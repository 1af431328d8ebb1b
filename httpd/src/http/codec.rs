use std::{fmt::Write, str::from_utf8};

use bytes::{Buf, Bytes, BytesMut};
use http::{
    header::{CONTENT_ENCODING, CONTENT_LENGTH},
    request::Builder,
    Error as HttpError, Method, Uri, Version,
};
use memchr::memmem;
use once_cell::sync::Lazy;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    error::{RequestError, ResponseError},
    http::{encoding, ContentEncoding, LINE_DELIMITER, REQUEST_DELIMITER},
};

use super::{Request, Response};

pub const DEFAULT_MAX_HEAD_BYTES: usize = 8 * 1024;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

static FINDER: Lazy<memmem::Finder> = Lazy::new(|| memmem::Finder::new(LINE_DELIMITER));
static HEAD_FINDER: Lazy<memmem::Finder> = Lazy::new(|| memmem::Finder::new(REQUEST_DELIMITER));

/// Reads one request off a connection and writes one response back.
///
/// The head is buffered until the blank line, bounded by `max_head_bytes`.
/// The body is then read to exactly `Content-Length` bytes, bounded by
/// `max_body_bytes`.
pub struct ConnectionCodec {
    max_head_bytes: usize,
    max_body_bytes: usize,
    req: Option<(Builder, usize)>,
}

impl ConnectionCodec {
    pub fn new(max_head_bytes: usize, max_body_bytes: usize) -> Self {
        Self {
            max_head_bytes,
            max_body_bytes,
            req: None,
        }
    }
}

impl Default for ConnectionCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEAD_BYTES, DEFAULT_MAX_BODY_BYTES)
    }
}

impl Decoder for ConnectionCodec {
    type Item = Request;

    type Error = RequestError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (req, len) = match self.req.take() {
            Some(req) => req,
            None => {
                let Some(position) = HEAD_FINDER.find(&src[..]) else {
                    if src.len() > self.max_head_bytes {
                        return Err(RequestError::TooLarge {
                            limit: self.max_head_bytes,
                        });
                    }
                    return Ok(None);
                };

                if position > self.max_head_bytes {
                    return Err(RequestError::TooLarge {
                        limit: self.max_head_bytes,
                    });
                }

                let head = src.split_to(position);
                src.advance(REQUEST_DELIMITER.len());
                let req = request_from_slice(&head)?;

                let content_length = match req.headers_ref().and_then(|map| map.get(CONTENT_LENGTH)) {
                    Some(value) => value.to_str()?.trim().parse::<usize>()?,
                    None => 0,
                };

                if content_length > self.max_body_bytes {
                    return Err(RequestError::TooLarge {
                        limit: self.max_body_bytes,
                    });
                }

                (req, content_length)
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            self.req = Some((req, len));
            return Ok(None);
        }

        // anything past the declared length is dropped along with the connection
        let body = src.split_to(len).freeze();
        req.body(body).map(Some).map_err(RequestError::HttpError)
    }
}

#[inline]
fn request_from_slice(buf: &[u8]) -> Result<Builder, RequestError> {
    let mut buf = from_utf8(buf)?;
    let request_line = split_to_delimiter(&mut buf).ok_or(RequestError::MalformedRequestLine)?;

    // request line = "METHOD PATH HTTP/VERSION"
    let mut tokens = request_line.split(' ');
    let (Some(method), Some(path), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(RequestError::MalformedRequestLine);
    };

    if method.is_empty() || path.is_empty() || version.is_empty() {
        return Err(RequestError::MalformedRequestLine);
    }

    let mut builder = http::Request::builder()
        .method(Method::try_from(method).map_err(HttpError::from)?)
        .uri(Uri::try_from(path).map_err(HttpError::from)?)
        .version(match version {
            "HTTP/0.9" => Version::HTTP_09,
            "HTTP/1.0" => Version::HTTP_10,
            "HTTP/1.1" => Version::HTTP_11,
            "HTTP/2.0" => Version::HTTP_2,
            "HTTP/3.0" => Version::HTTP_3,
            _ => return Err(RequestError::UnsupportedVersion),
        });

    // header = "Name: Value"
    while let Some(mut header) = split_to_delimiter(&mut buf) {
        let key = split_to_byte(&mut header, b':').ok_or(RequestError::MalformedHeader)?;
        builder = builder.header(key, header.trim());
    }

    Ok(builder)
}

#[inline]
fn split_to_byte<'a>(buf: &mut &'a str, byte: u8) -> Option<&'a str> {
    memchr::memchr(byte, buf.as_bytes()).map(|e| {
        let part = &buf[..e];
        *buf = &buf[e + 1..];
        part
    })
}

#[inline]
fn split_to_delimiter<'a>(buf: &mut &'a str) -> Option<&'a str> {
    if buf.is_empty() {
        return None;
    }

    match FINDER.find(buf.as_bytes()) {
        Some(pos) => {
            let part = &buf[..pos];
            *buf = &buf[pos + LINE_DELIMITER.len()..];
            Some(part)
        }
        None => {
            let part = *buf;
            *buf = "";
            Some(part)
        }
    }
}

impl Encoder<(Response, ContentEncoding)> for ConnectionCodec {
    type Error = ResponseError;

    fn encode(
        &mut self,
        (response, content_encoding): (Response, ContentEncoding),
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        let (parts, body) = response.into_parts();

        let body = match content_encoding {
            ContentEncoding::Gzip if !body.is_empty() => {
                Bytes::from(encoding::compress(body.as_bytes())?)
            }
            _ => body.into_bytes(),
        };

        let reason = parts.status.canonical_reason().unwrap_or_default();
        write!(dst, "{:?} {} {reason}\r\n", parts.version, parts.status.as_u16())?;

        // both are derived from the final body below
        let headers = parts
            .headers
            .iter()
            .filter(|(key, _)| **key != CONTENT_LENGTH && **key != CONTENT_ENCODING);
        for (key, value) in headers {
            let value = value.to_str()?;
            write_header_name(dst, key.as_str())?;
            write!(dst, ": {value}\r\n")?;
        }

        if !body.is_empty() {
            if let Some(coding) = content_encoding.as_str() {
                write!(dst, "Content-Encoding: {coding}\r\n")?;
            }
            write!(dst, "Content-Length: {}\r\n", body.len())?;
        }

        dst.extend_from_slice(LINE_DELIMITER);
        dst.extend_from_slice(&body);

        Ok(())
    }
}

/// Writes a lowercase header name as `Title-Case`.
fn write_header_name(dst: &mut BytesMut, name: &str) -> std::fmt::Result {
    for (idx, segment) in name.split('-').enumerate() {
        if idx > 0 {
            dst.write_char('-')?;
        }

        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            dst.write_char(first.to_ascii_uppercase())?;
            dst.write_str(chars.as_str())?;
        }
    }

    Ok(())
}
