//! Client transport
//!
//! Connects to the tracking server over TCP. Outbound control signals are
//! queued to a writer task so sending never blocks the caller; inbound
//! frames are read with an [`EventReader`].

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::protocol::{ClientEvent, EventCodec, EventReader, ProtocolError};

/// Destination for outbound control signals.
///
/// Sends are fire-and-forget: an `Ok` means the signal was queued, not
/// that the peer acted on it.
pub trait SignalSink: Send + Sync {
    /// Queue `event` for delivery
    fn send(&self, event: ClientEvent) -> Result<(), ProtocolError>;
}

impl SignalSink for mpsc::UnboundedSender<ClientEvent> {
    fn send(&self, event: ClientEvent) -> Result<(), ProtocolError> {
        mpsc::UnboundedSender::send(self, event).map_err(|_| ProtocolError::ChannelClosed)
    }
}

/// Outbound half of a TCP tracking channel
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSender {
    /// Whether the writer task is still running
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl SignalSink for ChannelSender {
    fn send(&self, event: ClientEvent) -> Result<(), ProtocolError> {
        self.tx.send(event).map_err(|_| ProtocolError::ChannelClosed)
    }
}

/// Inbound half of a TCP tracking channel
pub type ChannelReceiver = EventReader<OwnedReadHalf>;

/// Connect to a tracking server
pub async fn connect<A: ToSocketAddrs>(
    addr: A,
) -> Result<(ChannelSender, ChannelReceiver), ProtocolError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let peer = stream.peer_addr()?;
    let (read_half, mut write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
    tokio::spawn(async move {
        let mut codec = EventCodec::new();
        let mut buf = BytesMut::new();
        while let Some(event) = rx.recv().await {
            buf.clear();
            if let Err(e) = codec.encode(&event.to_envelope(), &mut buf) {
                tracing::warn!("Failed to encode {}: {}", event.name(), e);
                continue;
            }
            if let Err(e) = write_half.write_all(&buf).await {
                tracing::warn!("Connection to {} lost: {}", peer, e);
                break;
            }
            tracing::debug!("Sent {} to {}", event.name(), peer);
        }
        let _ = write_half.shutdown().await;
    });

    tracing::info!("Connected to tracking server at {}", peer);
    Ok((ChannelSender { tx }, EventReader::new(read_half)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_sender_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel::<ClientEvent>();
        drop(rx);
        let err = SignalSink::send(&tx, ClientEvent::StartTracking).unwrap_err();
        assert!(matches!(err, ProtocolError::ChannelClosed));
    }
}
