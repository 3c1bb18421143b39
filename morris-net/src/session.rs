//! Network session state machine
//!
//! No I/O happens here: the session turns relay messages into controller
//! actions and tells the caller what to send back. The host always plays
//! Player A, the client Player B.

use crate::error::NetError;
use crate::protocol::RelayMessage;
use morris_core::{Action, Controller, MatchState, Move, Player, Position, TurnReport};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Host has a room code and waits for the client
    WaitingForOpponent,
    Synchronized,
}

/// What a received message meant for the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    HostAccepted { room_code: String },
    OpponentJoined { name: String },
    /// The remote player's action was applied to the local controller
    RemoteAction(TurnReport),
    /// The host restarted the match
    MatchReset,
    OpponentLeft,
    /// A message that must be sent back to the peer
    Reply(RelayMessage),
    Latency { round_trip_ms: u64 },
    /// Nothing to do
    Ignored,
}

pub struct NetworkSession {
    role: Role,
    state: ConnectionState,
    room_code: Option<String>,
    local_name: String,
    remote_player_name: Option<String>,
    is_local_turn: bool,
    round_trip_ms: Option<u64>,
    clock: Instant,
}

impl NetworkSession {
    pub fn host(name: &str) -> Self {
        Self::new(Role::Host, None, name)
    }

    pub fn client(room_code: &str, name: &str) -> Self {
        Self::new(Role::Client, Some(room_code.trim().to_uppercase()), name)
    }

    fn new(role: Role, room_code: Option<String>, name: &str) -> Self {
        Self {
            role,
            state: ConnectionState::Disconnected,
            room_code,
            local_name: name.to_string(),
            remote_player_name: None,
            // Player A always opens
            is_local_turn: role == Role::Host,
            round_trip_ms: None,
            clock: Instant::now(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn remote_player_name(&self) -> Option<&str> {
        self.remote_player_name.as_deref()
    }

    pub fn is_local_turn(&self) -> bool {
        self.is_local_turn
    }

    pub fn round_trip_ms(&self) -> Option<u64> {
        self.round_trip_ms
    }

    pub fn is_synchronized(&self) -> bool {
        self.state == ConnectionState::Synchronized
    }

    pub fn local_player(&self) -> Player {
        match self.role {
            Role::Host => Player::A,
            Role::Client => Player::B,
        }
    }

    pub fn remote_player(&self) -> Player {
        self.local_player().opponent()
    }

    // ========================================================================
    // OUTGOING
    // ========================================================================

    /// First message on a fresh connection; moves the session to `Connecting`
    pub fn opening_message(&mut self) -> RelayMessage {
        self.state = ConnectionState::Connecting;
        match self.role {
            Role::Host => RelayMessage::Host {
                player_name: self.local_name.clone(),
                room_code: self.room_code.clone(),
            },
            Role::Client => RelayMessage::Join {
                room_code: self.room_code.clone().unwrap_or_default(),
                player_name: self.local_name.clone(),
            },
        }
    }

    /// Messages for a move already applied locally
    pub fn outgoing_for(&self, mv: &Move) -> Result<Vec<RelayMessage>, NetError> {
        self.check_synchronized()?;
        Ok(RelayMessage::for_move(mv))
    }

    pub fn outgoing_capture(&self, position: Position) -> Result<RelayMessage, NetError> {
        self.check_synchronized()?;
        Ok(RelayMessage::Capture { position })
    }

    /// Reset the match locally and produce the message telling the client.
    /// A client may not reset; its request goes nowhere.
    pub fn request_reset(&mut self, controller: &mut Controller) -> Result<RelayMessage, NetError> {
        if self.role == Role::Client {
            tracing::warn!("reset rejected: only the host can reset a networked match");
            return Err(NetError::ResetNotAllowed);
        }
        controller.reset();
        self.sync_turn(controller.state());
        Ok(RelayMessage::ResetRequested {})
    }

    pub fn latency_probe(&self) -> RelayMessage {
        RelayMessage::LatencyProbe { sent_at: self.now_ms() }
    }

    // ========================================================================
    // INCOMING
    // ========================================================================

    /// Apply one relay message. Remote actions go through the controller's
    /// turn-owner check exactly like local ones.
    pub fn handle(
        &mut self,
        msg: RelayMessage,
        controller: &mut Controller,
    ) -> Result<SessionEvent, NetError> {
        match msg {
            RelayMessage::HostAccepted { room_code } if self.role == Role::Host => {
                tracing::info!("hosting room {}", room_code);
                self.room_code = Some(room_code.clone());
                self.state = ConnectionState::WaitingForOpponent;
                Ok(SessionEvent::HostAccepted { room_code })
            }
            RelayMessage::OpponentJoined { name } => {
                tracing::info!("{} joined the match", name);
                self.remote_player_name = Some(name.clone());
                self.state = ConnectionState::Synchronized;
                self.sync_turn(controller.state());
                Ok(SessionEvent::OpponentJoined { name })
            }
            RelayMessage::Move { from, to } => {
                let action = match from {
                    Some(from) => Action::Slide { from, to },
                    None => Action::Place(to),
                };
                self.apply_remote(action, controller)
            }
            RelayMessage::Capture { position } => {
                self.apply_remote(Action::Capture(position), controller)
            }
            RelayMessage::ResetRequested {} if self.role == Role::Client => {
                tracing::info!("host reset the match");
                controller.reset();
                self.sync_turn(controller.state());
                Ok(SessionEvent::MatchReset)
            }
            RelayMessage::OpponentDisconnected {} => {
                tracing::warn!("opponent disconnected");
                if self.state != ConnectionState::Disconnected {
                    self.state = ConnectionState::WaitingForOpponent;
                }
                Ok(SessionEvent::OpponentLeft)
            }
            RelayMessage::LatencyProbe { sent_at } => {
                Ok(SessionEvent::Reply(RelayMessage::LatencyAck { sent_at }))
            }
            RelayMessage::LatencyAck { sent_at } => {
                let rtt = self.now_ms().saturating_sub(sent_at);
                self.round_trip_ms = Some(rtt);
                Ok(SessionEvent::Latency { round_trip_ms: rtt })
            }
            RelayMessage::Error { message } => {
                tracing::error!("relay error: {}", message);
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Disconnected;
                }
                Err(NetError::Relay(message))
            }
            other => {
                tracing::warn!("ignoring unexpected {} message", other.kind());
                Ok(SessionEvent::Ignored)
            }
        }
    }

    /// Recompute `is_local_turn` from the match state
    pub fn sync_turn(&mut self, state: &MatchState) {
        self.is_local_turn = state.active_player() == self.local_player();
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// The transport closed underneath the session. Returns true when the
    /// session should try to reconnect (host only).
    pub fn connection_lost(&mut self) -> bool {
        self.state = ConnectionState::Disconnected;
        self.role == Role::Host
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn apply_remote(
        &mut self,
        action: Action,
        controller: &mut Controller,
    ) -> Result<SessionEvent, NetError> {
        if !self.is_synchronized() {
            tracing::warn!("dropping remote action received before synchronization");
            return Ok(SessionEvent::Ignored);
        }

        match controller.act(self.remote_player(), action) {
            Ok(report) => {
                self.sync_turn(controller.state());
                Ok(SessionEvent::RemoteAction(report))
            }
            Err(err) => {
                tracing::error!("remote {:?} rejected: {}", action, err);
                self.state = ConnectionState::Disconnected;
                Err(NetError::Desync(format!("remote {:?} rejected: {}", action, err)))
            }
        }
    }

    fn check_synchronized(&self) -> Result<(), NetError> {
        if self.is_synchronized() {
            Ok(())
        } else {
            Err(NetError::NotConnected)
        }
    }

    /// Origin of the session's millisecond clock
    pub(crate) fn epoch(&self) -> Instant {
        self.clock
    }

    fn now_ms(&self) -> u64 {
        millis_since(self.clock)
    }
}

pub(crate) fn millis_since(epoch: Instant) -> u64 {
    epoch.elapsed().as_millis() as u64
}
