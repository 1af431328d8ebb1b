use std::{io, num::ParseIntError, str::Utf8Error};

use http::header::ToStrError;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request line must be `METHOD TARGET VERSION`")]
    MalformedRequestLine,
    #[error("header line is missing a `:` separator")]
    MalformedHeader,
    #[error("unsupported http version")]
    UnsupportedVersion,
    #[error("request exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("request head is not valid utf-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] ToStrError),
    #[error("invalid content-length: {0}")]
    InvalidContentLength(#[from] ParseIntError),
    #[error(transparent)]
    HttpError(#[from] http::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("header value is not visible ascii: {0}")]
    InvalidHeaderValue(#[from] ToStrError),
    #[error("failed to format response: {0}")]
    Format(#[from] std::fmt::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
