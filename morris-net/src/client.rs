//! Relay client driver
//!
//! Owns the connection and the session. Local actions are applied to the
//! controller first and forwarded only once accepted; incoming messages are
//! handed to the session one at a time.

use crate::config::NetConfig;
use crate::error::NetError;
use crate::protocol::RelayMessage;
use crate::session::{millis_since, NetworkSession, Role, SessionEvent};
use crate::transport::{Connection, Endpoint};
use morris_core::{Action, Controller, MatchState, Move, Position, TurnReport};
use tokio::task::JoinHandle;

pub struct NetClient {
    endpoint: Endpoint,
    config: NetConfig,
    session: NetworkSession,
    connection: Option<Connection>,
    keepalive: Option<JoinHandle<()>>,
    closed: bool,
}

impl NetClient {
    // ========================================================================
    // CONNECT
    // ========================================================================

    pub async fn connect_as_host(
        endpoint: Endpoint,
        player_name: &str,
        config: NetConfig,
    ) -> Result<Self, NetError> {
        Self::open(endpoint, NetworkSession::host(player_name), config).await
    }

    pub async fn connect_as_client(
        endpoint: Endpoint,
        room_code: &str,
        player_name: &str,
        config: NetConfig,
    ) -> Result<Self, NetError> {
        Self::open(endpoint, NetworkSession::client(room_code, player_name), config).await
    }

    async fn open(endpoint: Endpoint, session: NetworkSession, config: NetConfig) -> Result<Self, NetError> {
        let mut client = Self {
            endpoint,
            config,
            session,
            connection: None,
            keepalive: None,
            closed: false,
        };
        client.dial().await?;
        Ok(client)
    }

    async fn dial(&mut self) -> Result<(), NetError> {
        let connection = self.endpoint.connect().await?;
        connection.send(self.session.opening_message())?;
        self.connection = Some(connection);
        Ok(())
    }

    pub fn session(&self) -> &NetworkSession {
        &self.session
    }

    // ========================================================================
    // LOCAL ACTIONS
    // ========================================================================

    /// Apply a local action and forward it to the opponent. If it cannot
    /// be forwarded the action is rolled back.
    pub fn send_local_action(
        &mut self,
        controller: &mut Controller,
        action: Action,
    ) -> Result<TurnReport, NetError> {
        self.check_ready()?;
        let snapshot = controller.state().clone();
        let report = controller.act_local(action)?;
        self.forward(controller, snapshot, vec![RelayMessage::for_action(action)])?;
        Ok(report)
    }

    /// Apply a full local move (with capture) and forward it
    pub fn send_local_move(&mut self, controller: &mut Controller, mv: Move) -> Result<TurnReport, NetError> {
        self.check_ready()?;
        let messages = self.session.outgoing_for(&mv)?;
        let snapshot = controller.state().clone();
        let report = controller.apply_local_move(mv)?;
        self.forward(controller, snapshot, messages)?;
        Ok(report)
    }

    pub fn send_local_capture(
        &mut self,
        controller: &mut Controller,
        position: Position,
    ) -> Result<TurnReport, NetError> {
        self.send_local_action(controller, Action::Capture(position))
    }

    /// Host only: restart the match on both peers. The keepalive timer
    /// starts over with the new match.
    pub fn request_reset(&mut self, controller: &mut Controller) -> Result<(), NetError> {
        let msg = self.session.request_reset(controller)?;
        if self.session.is_synchronized() {
            if let Err(err) = self.send(msg) {
                self.drop_connection();
                return Err(err);
            }
            self.start_keepalive();
        } else {
            self.stop_keepalive();
        }
        Ok(())
    }

    // ========================================================================
    // INCOMING
    // ========================================================================

    /// Wait for the next meaningful event. Latency probes are answered here
    /// and never surface. The host transparently reconnects on a dropped
    /// transport; the client gets `ConnectionLost`.
    pub async fn next_event(&mut self, controller: &mut Controller) -> Result<SessionEvent, NetError> {
        loop {
            if self.closed {
                return Err(NetError::NotConnected);
            }
            let received = match self.connection.as_mut() {
                Some(connection) => connection.recv().await,
                None => None,
            };

            let Some(msg) = received else {
                self.stop_keepalive();
                self.connection = None;
                if self.session.connection_lost() {
                    self.reconnect().await?;
                    continue;
                }
                self.closed = true;
                tracing::error!("connection to relay lost");
                return Err(NetError::ConnectionLost);
            };

            match self.session.handle(msg, controller) {
                Ok(SessionEvent::Reply(reply)) => self.send(reply)?,
                Ok(event) => {
                    match &event {
                        SessionEvent::OpponentJoined { .. } | SessionEvent::MatchReset => {
                            self.start_keepalive()
                        }
                        SessionEvent::OpponentLeft => self.stop_keepalive(),
                        _ => {}
                    }
                    return Ok(event);
                }
                Err(err @ NetError::Desync(_)) => {
                    self.disconnect();
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the connection for good
    pub fn disconnect(&mut self) {
        self.stop_keepalive();
        self.connection = None;
        self.closed = true;
        self.session.disconnect();
        tracing::info!("disconnected from relay");
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Send the messages for an action already applied to `controller`.
    /// On failure the controller goes back to `snapshot` and the connection
    /// is dropped; the turn flag follows the controller either way.
    fn forward(
        &mut self,
        controller: &mut Controller,
        snapshot: MatchState,
        messages: Vec<RelayMessage>,
    ) -> Result<(), NetError> {
        let sent = messages.into_iter().try_for_each(|msg| self.send(msg));
        if let Err(err) = &sent {
            tracing::error!("local action not forwarded, rolling back: {}", err);
            controller.restore(snapshot);
            self.drop_connection();
        }
        self.session.sync_turn(controller.state());
        sent
    }

    /// The transport is unusable. The host reconnects from `next_event`.
    fn drop_connection(&mut self) {
        self.stop_keepalive();
        self.connection = None;
        if !self.session.connection_lost() {
            self.closed = true;
        }
    }

    async fn reconnect(&mut self) -> Result<(), NetError> {
        let attempts = self.config.max_reconnect_attempts;
        for attempt in 1..=attempts {
            tracing::warn!("connection lost, reconnecting ({}/{})", attempt, attempts);
            tokio::time::sleep(self.config.reconnect_backoff()).await;
            match self.dial().await {
                Ok(()) => {
                    tracing::info!("reconnected to relay");
                    return Ok(());
                }
                Err(e) => tracing::warn!("reconnect attempt {} failed: {}", attempt, e),
            }
        }
        self.closed = true;
        tracing::error!("giving up after {} reconnect attempts", attempts);
        Err(NetError::ConnectionLost)
    }

    fn start_keepalive(&mut self) {
        self.stop_keepalive();
        let Some(connection) = &self.connection else {
            return;
        };
        let tx = connection.sender();
        let epoch = self.session.epoch();
        let interval = self.config.keepalive_interval();

        self.keepalive = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let probe = RelayMessage::LatencyProbe {
                    sent_at: millis_since(epoch),
                };
                if tx.send(probe).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_keepalive(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }

    fn send(&self, msg: RelayMessage) -> Result<(), NetError> {
        match &self.connection {
            Some(connection) => connection.send(msg),
            None => Err(NetError::ConnectionLost),
        }
    }

    fn check_ready(&mut self) -> Result<(), NetError> {
        if !self.session.is_synchronized() {
            return Err(NetError::NotConnected);
        }
        if !self.connection.as_ref().is_some_and(Connection::is_open) {
            tracing::error!("connection to relay lost");
            self.drop_connection();
            return Err(NetError::ConnectionLost);
        }
        if !self.session.is_local_turn() {
            return Err(NetError::OutOfTurn);
        }
        Ok(())
    }

    pub fn role(&self) -> Role {
        self.session.role()
    }

    pub fn has_keepalive(&self) -> bool {
        self.keepalive.is_some()
    }
}

impl Drop for NetClient {
    fn drop(&mut self) {
        self.stop_keepalive();
    }
}
