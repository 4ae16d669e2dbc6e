//! MJPEG framing for the live video feed
//!
//! The feed is an HTTP `multipart/x-mixed-replace` body where every part is
//! one JPEG image:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```

use std::io;
use tokio_util::bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Response head sent once before the first part
pub fn response_head() -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={}\r\n\
         Cache-Control: no-cache, no-store\r\n\
         Connection: close\r\n\
         \r\n",
        BOUNDARY
    )
}

/// Minimal response for anything other than the feed path
pub fn not_found() -> &'static str {
    "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 9\r\nConnection: close\r\n\r\nNot Found"
}

/// Encodes JPEG images as multipart parts
#[derive(Debug, Clone, Default)]
pub struct MjpegCodec {
    /// Reject payloads that do not start with a JPEG marker
    strict: bool,
}

impl MjpegCodec {
    /// Codec accepting any payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that refuses non-JPEG payloads
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl Encoder<Bytes> for MjpegCodec {
    type Error = io::Error;

    fn encode(&mut self, image: Bytes, dst: &mut BytesMut) -> Result<(), io::Error> {
        if self.strict && !image.starts_with(&JPEG_SOI) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "frame is not a JPEG image",
            ));
        }

        dst.reserve(image.len() + BOUNDARY.len() + 48);
        dst.put_slice(b"--");
        dst.put_slice(BOUNDARY.as_bytes());
        dst.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
        dst.put_slice(&image);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
