pub const LINE_DELIMITER: &[u8] = b"\r\n";
pub const REQUEST_DELIMITER: &[u8] = b"\r\n\r\n";

pub mod codec;
pub mod encoding;
mod response;

pub type Request = http::Request<bytes::Bytes>;
pub use encoding::ContentEncoding;
pub use response::{Body, IntoResponse, Response};
