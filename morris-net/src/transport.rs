//! Duplex message channel to the relay
//!
//! A `Connection` is a pair of unbounded channels carrying decoded
//! `RelayMessage`s. Over TCP, background tasks translate between the channels
//! and newline-delimited JSON on the socket.

use crate::error::NetError;
use crate::protocol::{decode, encode, RelayMessage};
use crate::relay::LocalRelay;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Where the relay lives
#[derive(Clone)]
pub enum Endpoint {
    /// `host:port` of a relay speaking JSON lines
    Tcp(String),
    /// In-process relay
    Local(LocalRelay),
}

impl Endpoint {
    pub async fn connect(&self) -> Result<Connection, NetError> {
        match self {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await?;
                tracing::info!("connected to relay at {}", addr);
                Ok(spawn_stream(stream))
            }
            Endpoint::Local(relay) => Ok(relay.connect()),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "Tcp({})", addr),
            Endpoint::Local(_) => write!(f, "Local"),
        }
    }
}

pub struct Connection {
    outbound: UnboundedSender<RelayMessage>,
    inbound: UnboundedReceiver<RelayMessage>,
}

impl Connection {
    pub fn new(outbound: UnboundedSender<RelayMessage>, inbound: UnboundedReceiver<RelayMessage>) -> Self {
        Self { outbound, inbound }
    }

    pub fn send(&self, msg: RelayMessage) -> Result<(), NetError> {
        tracing::trace!("-> {}", msg.kind());
        self.outbound.send(msg).map_err(|_| NetError::ConnectionLost)
    }

    /// False once the task or relay draining the outbound side has stopped
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Next message, or `None` once the other side has gone away
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        let msg = self.inbound.recv().await;
        if let Some(msg) = &msg {
            tracing::trace!("<- {}", msg.kind());
        }
        msg
    }

    /// Extra handle for tasks that only send (keepalive)
    pub fn sender(&self) -> UnboundedSender<RelayMessage> {
        self.outbound.clone()
    }

    pub fn into_parts(self) -> (UnboundedSender<RelayMessage>, UnboundedReceiver<RelayMessage>) {
        (self.outbound, self.inbound)
    }
}

/// Bridge a socket to a `Connection`. Malformed lines are logged and dropped.
pub(crate) fn spawn_stream(stream: TcpStream) -> Connection {
    let (read_half, mut write_half) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayMessage>();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let mut line = match encode(&msg) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("failed to encode {}: {}", msg.kind(), e);
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                tracing::warn!("relay write failed: {}", e);
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match decode(&line) {
                    Ok(msg) => {
                        if in_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("dropping relay frame: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("relay read failed: {}", e);
                    break;
                }
            }
        }
    });

    Connection::new(out_tx, in_rx)
}
