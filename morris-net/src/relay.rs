//! Message relay
//!
//! Pairs exactly two peers by room code and forwards everything else between
//! them untouched. It knows nothing about the game. Used in-process for local
//! loopback play and tests, and behind a TCP listener by `morris relay`.

use crate::error::NetError;
use crate::protocol::RelayMessage;
use crate::transport::{spawn_stream, Connection};
use rand::Rng;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

const ROOM_CODE_LEN: usize = 4;

type PeerId = u64;

struct Peer {
    tx: UnboundedSender<RelayMessage>,
    name: String,
    room: Option<String>,
}

#[derive(Default)]
struct Room {
    host: Option<PeerId>,
    client: Option<PeerId>,
}

#[derive(Default)]
struct RelayState {
    peers: FxHashMap<PeerId, Peer>,
    rooms: FxHashMap<String, Room>,
    next_peer: PeerId,
}

#[derive(Clone, Default)]
pub struct LocalRelay {
    state: Arc<Mutex<RelayState>>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to this relay. Must be called inside a tokio runtime.
    pub fn connect(&self) -> Connection {
        let (to_relay_tx, to_relay_rx) = mpsc::unbounded_channel();
        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        self.attach(to_relay_rx, to_peer_tx);
        Connection::new(to_relay_tx, to_peer_rx)
    }

    /// Accept JSON-lines peers forever
    pub async fn serve(self, listener: TcpListener) -> Result<(), NetError> {
        tracing::info!("relay listening on {}", listener.local_addr()?);
        loop {
            let (stream, addr) = listener.accept().await?;
            tracing::info!("peer connected from {}", addr);
            let (outbound, inbound) = spawn_stream(stream).into_parts();
            self.attach(inbound, outbound);
        }
    }

    /// Number of open rooms
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    fn attach(&self, mut inbound: UnboundedReceiver<RelayMessage>, outbound: UnboundedSender<RelayMessage>) {
        let relay = self.clone();
        tokio::spawn(async move {
            let peer = relay.register(outbound);
            while let Some(msg) = inbound.recv().await {
                relay.route(peer, msg);
            }
            relay.remove_peer(peer);
        });
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, tx: UnboundedSender<RelayMessage>) -> PeerId {
        let mut state = self.lock();
        let id = state.next_peer;
        state.next_peer += 1;
        state.peers.insert(
            id,
            Peer {
                tx,
                name: String::new(),
                room: None,
            },
        );
        id
    }

    fn route(&self, peer: PeerId, msg: RelayMessage) {
        let mut state = self.lock();
        match msg {
            RelayMessage::Host { player_name, room_code } => state.host(peer, player_name, room_code),
            RelayMessage::Join { room_code, player_name } => state.join(peer, player_name, &room_code),
            other => state.forward(peer, other),
        }
    }

    fn remove_peer(&self, peer: PeerId) {
        self.lock().remove(peer);
    }
}

impl RelayState {
    fn host(&mut self, peer: PeerId, name: String, requested: Option<String>) {
        let code = match requested.map(|c| c.to_uppercase()) {
            Some(code) => {
                let taken = self.rooms.get(&code).map_or(false, |room| room.host.is_some());
                if taken {
                    self.send(peer, RelayMessage::Error {
                        message: format!("room {} is already hosted", code),
                    });
                    return;
                }
                code
            }
            None => self.fresh_code(),
        };

        let room = self.rooms.entry(code.clone()).or_default();
        room.host = Some(peer);
        let client = room.client;
        if let Some(p) = self.peers.get_mut(&peer) {
            p.name = name;
            p.room = Some(code.clone());
        }
        tracing::debug!("room {} hosted", code);
        self.send(peer, RelayMessage::HostAccepted { room_code: code });

        if let Some(client) = client {
            self.introduce(peer, client);
        }
    }

    fn join(&mut self, peer: PeerId, name: String, code: &str) {
        let code = code.trim().to_uppercase();
        let host = match self.rooms.get(&code) {
            None => {
                self.send(peer, RelayMessage::Error {
                    message: format!("room {} not found", code),
                });
                return;
            }
            Some(room) if room.client.is_some() => {
                self.send(peer, RelayMessage::Error {
                    message: format!("room {} is full", code),
                });
                return;
            }
            Some(room) => room.host,
        };

        if let Some(room) = self.rooms.get_mut(&code) {
            room.client = Some(peer);
        }
        if let Some(p) = self.peers.get_mut(&peer) {
            p.name = name;
            p.room = Some(code.clone());
        }
        tracing::debug!("peer {} joined room {}", peer, code);

        if let Some(host) = host {
            self.introduce(host, peer);
        }
    }

    fn forward(&mut self, from: PeerId, msg: RelayMessage) {
        match self.partner(from) {
            Some(to) => self.send(to, msg),
            None => tracing::debug!("dropping {} from unpaired peer {}", msg.kind(), from),
        }
    }

    fn remove(&mut self, peer: PeerId) {
        let partner = self.partner(peer);
        let Some(removed) = self.peers.remove(&peer) else {
            return;
        };
        let Some(code) = removed.room else {
            return;
        };

        if let Some(room) = self.rooms.get_mut(&code) {
            if room.host == Some(peer) {
                room.host = None;
            }
            if room.client == Some(peer) {
                room.client = None;
            }
            if room.host.is_none() && room.client.is_none() {
                self.rooms.remove(&code);
                tracing::debug!("room {} closed", code);
            }
        }

        if let Some(partner) = partner {
            self.send(partner, RelayMessage::OpponentDisconnected {});
        }
    }

    fn introduce(&self, host: PeerId, client: PeerId) {
        let name_of = |id: PeerId| self.peers.get(&id).map(|p| p.name.clone()).unwrap_or_default();
        self.send(host, RelayMessage::OpponentJoined { name: name_of(client) });
        self.send(client, RelayMessage::OpponentJoined { name: name_of(host) });
    }

    fn partner(&self, peer: PeerId) -> Option<PeerId> {
        let code = self.peers.get(&peer)?.room.as_ref()?;
        let room = self.rooms.get(code)?;
        if room.host == Some(peer) {
            room.client
        } else {
            room.host
        }
    }

    fn send(&self, peer: PeerId, msg: RelayMessage) {
        if let Some(p) = self.peers.get(&peer) {
            // A closed receiver means the peer is being removed
            let _ = p.tx.send(msg);
        }
    }

    fn fresh_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| rng.gen_range(b'A'..=b'Z') as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}
