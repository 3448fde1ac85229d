//! Probe protocol over TCP.
//!
//! One JSON object per line. The prober sends `alive_request`; a node whose
//! session belongs to the same user replies `alive_response` with its own
//! address. Any other node closes the connection without replying. Lines
//! longer than [`MAX_LINE_BYTES`] end the exchange.

use std::time::Duration;

use async_trait::async_trait;
use peerdrive_dht::PeerAddress;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::{PeerMessenger, ProbeOutcome, WireMessage};
use crate::error::Result;
use crate::session::SessionProvider;

/// Longest line either side accepts, newline included.
pub const MAX_LINE_BYTES: u64 = 4096;

/// Read one line of at most [`MAX_LINE_BYTES`]. `None` at end of stream.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = reader.take(MAX_LINE_BYTES).read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && read as u64 >= MAX_LINE_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("line exceeds {MAX_LINE_BYTES} bytes"),
        )
        .into());
    }
    Ok(Some(line))
}

/// [`PeerMessenger`] that opens one TCP connection per probe.
#[derive(Debug, Clone)]
pub struct TcpMessenger {
    connect_timeout: Duration,
}

impl Default for TcpMessenger {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TcpMessenger {
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn exchange(&self, user_id: &str, peer: &PeerAddress) -> Result<Option<WireMessage>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(peer.socket))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;

        let (reader, mut writer) = stream.into_split();
        let request = serde_json::to_string(&WireMessage::AliveRequest {
            user_id: user_id.to_string(),
        })?;
        writer.write_all(request.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut reader = BufReader::new(reader);
        match read_line(&mut reader).await? {
            Some(line) => Ok(Some(serde_json::from_str(&line)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PeerMessenger for TcpMessenger {
    async fn probe(&self, user_id: &str, peer: &PeerAddress) -> ProbeOutcome {
        match self.exchange(user_id, peer).await {
            Ok(Some(WireMessage::AliveResponse { peer: answered })) if answered == *peer => {
                ProbeOutcome::Alive
            }
            Ok(Some(other)) => {
                debug!("Unexpected probe answer from {}: {:?}", peer, other);
                ProbeOutcome::Unreachable
            }
            Ok(None) => {
                debug!("Peer {} closed without answering", peer);
                ProbeOutcome::Unreachable
            }
            Err(e) => {
                debug!("Probe to {} failed: {}", peer, e);
                ProbeOutcome::Unreachable
            }
        }
    }
}

/// Answers probes for the user logged in on this node.
#[derive(Debug, Clone)]
pub struct ProbeServer {
    local: PeerAddress,
    sessions: SessionProvider,
}

impl ProbeServer {
    pub fn new(local: PeerAddress, sessions: SessionProvider) -> Self {
        Self { local, sessions }
    }

    /// Accept connections until the listener fails.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        info!("Probe server listening on {}", listener.local_addr()?);
        loop {
            let (stream, addr) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    warn!("Probe connection from {} failed: {}", addr, e);
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        while let Some(line) = read_line(&mut reader).await? {
            let WireMessage::AliveRequest { user_id } = serde_json::from_str(&line)? else {
                debug!("Ignoring non-request message on probe connection");
                continue;
            };

            let logged_in = self
                .sessions
                .current()
                .map(|session| session.user_id == user_id)
                .unwrap_or(false);
            if !logged_in {
                debug!("Not answering probe for {}", user_id);
                return Ok(());
            }

            let response = serde_json::to_string(&WireMessage::AliveResponse { peer: self.local })?;
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        Ok(())
    }
}
