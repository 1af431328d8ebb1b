use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};

pub type Response = http::Response<Body>;

/// A response payload. Text and binary bodies are mutually exclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Binary(Bytes),
}

impl Body {
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Text(text) => Bytes::from(text),
            Body::Binary(bytes) => bytes,
        }
    }
}

pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(Body::Empty);
        *response.status_mut() = self;

        response
    }
}

impl IntoResponse for Bytes {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(Body::Binary(self));

        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static(mime::APPLICATION_OCTET_STREAM.as_ref()),
        );

        response
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(Body::Text(self));

        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static(mime::TEXT_PLAIN.as_ref()),
        );

        response
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        IntoResponse::into_response(self.to_owned())
    }
}

impl<B: IntoResponse> IntoResponse for (StatusCode, B) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_bodies_are_plain_text() {
        let response = "abc".into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(response.body(), &Body::Text("abc".into()));
    }

    #[test]
    fn binary_bodies_are_octet_streams() {
        let response = (StatusCode::OK, Bytes::from_static(b"\x00\x01")).into_response();
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(response.body().len(), 2);
    }

    #[test]
    fn status_codes_have_no_body() {
        let response = StatusCode::CREATED.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.body().is_empty());
        assert!(response.headers().is_empty());
    }
}
