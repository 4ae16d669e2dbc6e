//! Line-delimited JSON framing
//!
//! One [`Envelope`] per `\n`-terminated line. Blank lines are skipped.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use super::{Envelope, ProtocolError, MAX_FRAME_SIZE};

/// Codec turning byte streams into [`Envelope`]s and back
#[derive(Debug, Clone)]
pub struct EventCodec {
    lines: LinesCodec,
    max_length: usize,
}

impl EventCodec {
    /// Codec with the default frame limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_FRAME_SIZE)
    }

    /// Codec rejecting lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn map_err(&self, err: LinesCodecError) -> ProtocolError {
        match err {
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::FrameTooLarge {
                max: self.max_length,
            },
            LinesCodecError::Io(e) => ProtocolError::IoError(e),
        }
    }

    fn parse(line: &str) -> Result<Envelope, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventCodec {
    type Item = Envelope;
    type Error = ProtocolError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Envelope>, ProtocolError> {
        loop {
            match self.lines.decode(buf) {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Self::parse(&line).map(Some),
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.map_err(e)),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Envelope>, ProtocolError> {
        loop {
            match self.lines.decode_eof(buf) {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Self::parse(&line).map(Some),
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.map_err(e)),
            }
        }
    }
}

impl Encoder<&Envelope> for EventCodec {
    type Error = ProtocolError;

    fn encode(&mut self, envelope: &Envelope, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = serde_json::to_string(envelope)?;
        if line.len() > self.max_length {
            return Err(ProtocolError::FrameTooLarge {
                max: self.max_length,
            });
        }
        self.lines.encode(line, dst).map_err(|e| self.map_err(e))
    }
}

/// Pulls envelopes off an async byte stream.
///
/// A frame that fails to parse is reported as an error and skipped; the
/// reader stays usable. I/O errors and end of stream end the sequence.
pub struct EventReader<R> {
    inner: R,
    codec: EventCodec,
    buf: BytesMut,
    eof: bool,
}

impl<R: AsyncRead + Unpin> EventReader<R> {
    /// Reader using the default codec
    pub fn new(inner: R) -> Self {
        Self::with_codec(inner, EventCodec::new())
    }

    /// Reader using a custom codec (e.g. a different frame limit)
    pub fn with_codec(inner: R, codec: EventCodec) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(4096),
            eof: false,
        }
    }

    /// Next envelope, `None` once the stream is exhausted
    pub async fn next_envelope(&mut self) -> Option<Result<Envelope, ProtocolError>> {
        loop {
            if self.eof {
                return self.codec.decode_eof(&mut self.buf).transpose();
            }

            match self.codec.decode(&mut self.buf) {
                Ok(Some(envelope)) => return Some(Ok(envelope)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }

            match self.inner.read_buf(&mut self.buf).await {
                Ok(0) => self.eof = true,
                Ok(_) => {}
                Err(e) => {
                    self.eof = true;
                    self.buf.clear();
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
