//! Content negotiation and the gzip content encoder.

use std::io::{self, Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use http::{header::ACCEPT_ENCODING, HeaderMap};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Picks gzip when any `Accept-Encoding` entry names it, identity otherwise.
    /// An entry weighted `q=0` refuses the coding instead.
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let accepts_gzip = headers
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter(|entry| !is_refused(entry))
            .map(|entry| entry.split(';').next().unwrap_or_default().trim())
            .any(|coding| coding.eq_ignore_ascii_case("gzip"));

        if accepts_gzip {
            Self::Gzip
        } else {
            Self::Identity
        }
    }

    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Identity => None,
            Self::Gzip => Some("gzip"),
        }
    }
}

fn is_refused(entry: &str) -> bool {
    entry
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("q"))
        .any(|(_, weight)| weight.trim().parse::<f32>().map_or(false, |q| q <= 0.0))
}

pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn accepting(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn negotiates_gzip_from_a_list() {
        assert_eq!(
            ContentEncoding::negotiate(&accepting("invalid-encoding-1, gzip, invalid-encoding-2")),
            ContentEncoding::Gzip
        );
        assert_eq!(
            ContentEncoding::negotiate(&accepting("GZIP;q=0.8")),
            ContentEncoding::Gzip
        );
    }

    #[test]
    fn zero_weight_refuses_gzip() {
        for value in ["gzip;q=0", "gzip; q=0.000", "deflate, GZIP ;Q=0.0"] {
            assert_eq!(
                ContentEncoding::negotiate(&accepting(value)),
                ContentEncoding::Identity,
                "{value}"
            );
        }
        assert_eq!(
            ContentEncoding::negotiate(&accepting("gzip;q=0.001")),
            ContentEncoding::Gzip
        );
        assert_eq!(
            ContentEncoding::negotiate(&accepting("gzip;q=0, gzip")),
            ContentEncoding::Gzip
        );
    }

    #[test]
    fn falls_back_to_identity() {
        assert_eq!(
            ContentEncoding::negotiate(&HeaderMap::new()),
            ContentEncoding::Identity
        );
        assert_eq!(
            ContentEncoding::negotiate(&accepting("deflate, br")),
            ContentEncoding::Identity
        );
    }

    #[test]
    fn gzip_round_trips() {
        let compressed = compress(b"abc").unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert_eq!(decompress(&compressed).unwrap(), b"abc");
    }

    #[test]
    fn compression_is_deterministic() {
        assert_eq!(compress(b"raspberry").unwrap(), compress(b"raspberry").unwrap());
    }
}
