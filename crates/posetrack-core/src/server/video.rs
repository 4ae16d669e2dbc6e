//! MJPEG live feed over plain HTTP

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;

use super::TrackingServer;
use crate::mjpeg::{self, MjpegCodec};

/// Upper bound on the request head we are willing to buffer
const MAX_REQUEST_HEAD: usize = 8192;

/// How long a client may take to send its request head
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of a `GET` request line, without its query string.
///
/// Returns `None` for other methods or malformed lines.
pub fn parse_request_path(request_line: &str) -> Option<&str> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let path = target.split('?').next().unwrap_or(target);
    Some(path)
}

impl TrackingServer {
    /// Accept video feed clients until shutdown
    pub async fn serve_video(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let path = self.config.server.video_path.clone();
                    let frames = self.subscribe_frames();
                    let token = self.shutdown.child_token();
                    tokio::spawn(async move {
                        if let Err(e) = stream_video(stream, &path, frames, token).await {
                            tracing::debug!("Video client {} dropped: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Failed to accept video client: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        tracing::debug!("Video listener stopped");
    }
}

async fn read_request_head<R>(stream: &mut R, limit: Duration) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(limit, read_head(stream))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no request head received"))?
}

async fn read_head<R>(stream: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        if head.len() > MAX_REQUEST_HEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

async fn stream_video(
    mut stream: TcpStream,
    video_path: &str,
    mut frames: watch::Receiver<Option<Bytes>>,
    token: CancellationToken,
) -> io::Result<()> {
    let peer: Option<SocketAddr> = stream.peer_addr().ok();
    let head = read_request_head(&mut stream, REQUEST_HEAD_TIMEOUT).await?;
    let request_line = head.lines().next().unwrap_or("");

    if parse_request_path(request_line) != Some(video_path) {
        tracing::debug!("Rejecting video request {:?}", request_line);
        stream.write_all(mjpeg::not_found().as_bytes()).await?;
        return Ok(());
    }

    tracing::info!("Video client {:?} attached", peer);
    stream.write_all(mjpeg::response_head().as_bytes()).await?;

    let mut codec = MjpegCodec::new();
    let mut buf = BytesMut::new();
    loop {
        // Latest frame only; intermediate frames are skipped for slow clients
        let image = frames.borrow_and_update().clone();
        if let Some(image) = image {
            buf.clear();
            codec.encode(image, &mut buf)?;
            stream.write_all(&buf).await?;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
