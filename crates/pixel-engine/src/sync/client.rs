//! Connection lifecycle and submit bookkeeping for the real-time channel.
//!
//! The client never blocks. Outbound traffic goes through a [`Transport`], and every
//! inbound event (connect, disconnect, ack, credential refresh result) is fed back in
//! by the host as it happens.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::error::SyncError;
use crate::api::types::StagedPixel;
use crate::sync::protocol::{ClientMessage, WirePixel};

/// Outbound half of the real-time channel.
pub trait Transport {
    /// Open (or reopen) the channel authenticated with `token`.
    fn connect(&mut self, token: &str);
    /// Close the channel. No `disconnect` event is expected back.
    fn disconnect(&mut self);
    fn send(&mut self, message: &ClientMessage);
}

/// Access to the stored credential and the refresh operation.
pub trait CredentialProvider {
    fn access_token(&self) -> Option<String>;
    /// Start a refresh. The result comes back through `on_refresh_complete`.
    fn begin_refresh(&mut self);
    /// Drop all stored credentials.
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Disconnected,
    Connecting,
    Connected,
    /// Channel suspended while the credential is refreshed.
    Reauthenticating,
    /// Terminal until the host calls `connect` with fresh credentials.
    SessionExpired,
}

/// Persistent connection problem shown to the user until it clears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum ConnectionIssue {
    ConnectionLost,
    ConnectFailed(String),
    NoCredentials,
    SessionExpired,
}

pub struct SyncClient<T: Transport, C: CredentialProvider> {
    transport: T,
    credentials: C,
    state: SyncState,
    refresh_in_flight: bool,
    next_request_id: u64,
    in_flight: BTreeMap<u64, Vec<StagedPixel>>,
    issue: Option<ConnectionIssue>,
}

impl<T: Transport, C: CredentialProvider> SyncClient<T, C> {
    pub fn new(transport: T, credentials: C) -> Self {
        Self {
            transport,
            credentials,
            state: SyncState::Disconnected,
            refresh_in_flight: false,
            next_request_id: 1,
            in_flight: BTreeMap::new(),
            issue: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn issue(&self) -> Option<&ConnectionIssue> {
        self.issue.as_ref()
    }

    /// True while at least one batch awaits its ack.
    pub fn is_submitting(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    /// Open the channel with the stored credential. A running refresh owns the
    /// reconnect, so this is a no-op until it completes.
    pub fn connect(&mut self) -> Result<(), SyncError> {
        if matches!(self.state, SyncState::Connecting | SyncState::Connected) {
            return Ok(());
        }
        if self.refresh_in_flight || self.state == SyncState::Reauthenticating {
            log::debug!("connect deferred to the running credential refresh");
            return Ok(());
        }
        let Some(token) = self.credentials.access_token() else {
            log::error!("cannot connect: no access token");
            self.issue = Some(ConnectionIssue::NoCredentials);
            return Err(SyncError::SessionExpired);
        };
        log::info!("connecting to canvas server");
        self.state = SyncState::Connecting;
        self.refresh_in_flight = false;
        self.transport.connect(&token);
        Ok(())
    }

    /// Close the channel for good (page teardown). In-flight batches are forgotten.
    pub fn shutdown(&mut self) {
        self.transport.disconnect();
        self.state = SyncState::Disconnected;
        self.refresh_in_flight = false;
        self.in_flight.clear();
    }

    /// The channel reports an open connection. Requests fresh energy and canvas state.
    pub fn on_connected(&mut self) {
        if self.state == SyncState::SessionExpired {
            log::warn!("ignoring connect after session expiry");
            return;
        }
        log::info!("connected to canvas server");
        self.state = SyncState::Connected;
        self.issue = None;
        self.transport.send(&ClientMessage::RequestEnergy);
        self.transport.send(&ClientMessage::RequestCanvas);
    }

    /// The channel dropped. Silent while a credential refresh owns the connection.
    pub fn on_disconnected(&mut self, reason: Option<&str>) {
        if !self.in_flight.is_empty() {
            log::warn!(
                "forgetting {} unacknowledged batches after disconnect",
                self.in_flight.len()
            );
            self.in_flight.clear();
        }
        if self.refresh_in_flight || self.state == SyncState::SessionExpired {
            log::debug!("disconnect during credential refresh");
            return;
        }
        log::warn!("connection lost: {}", reason.unwrap_or("unknown reason"));
        self.state = SyncState::Disconnected;
        self.issue = Some(ConnectionIssue::ConnectionLost);
    }

    pub fn on_connect_error(&mut self, message: Option<&str>) {
        let message = message.unwrap_or("connection error").to_string();
        log::error!("connect error: {}", message);
        if self.refresh_in_flight || self.state == SyncState::SessionExpired {
            return;
        }
        self.issue = Some(ConnectionIssue::ConnectFailed(message));
    }

    /// Server rejected the credential. Suspends the channel and starts one refresh;
    /// repeats while a refresh is running are ignored.
    pub fn on_token_expired(&mut self) {
        if self.refresh_in_flight || self.state == SyncState::SessionExpired {
            log::debug!("token expiry while refresh already running");
            return;
        }
        log::info!("access token expired, refreshing");
        self.refresh_in_flight = true;
        self.state = SyncState::Reauthenticating;
        self.in_flight.clear();
        self.transport.disconnect();
        self.credentials.begin_refresh();
    }

    /// Result of the refresh started by `on_token_expired`. `None` means it failed.
    ///
    /// Returns `Err(SessionExpired)` when the session is over and the user must log in again.
    pub fn on_refresh_complete(&mut self, token: Option<String>) -> Result<(), SyncError> {
        if !self.refresh_in_flight {
            log::warn!("ignoring refresh result with no refresh in flight");
            return Ok(());
        }
        self.refresh_in_flight = false;
        match token.filter(|t| !t.is_empty()) {
            Some(token) => {
                log::info!("credential refreshed, reconnecting");
                self.state = SyncState::Connecting;
                self.transport.connect(&token);
                Ok(())
            }
            None => {
                log::error!("credential refresh failed, session expired");
                self.credentials.clear();
                self.state = SyncState::SessionExpired;
                self.issue = Some(ConnectionIssue::SessionExpired);
                Err(SyncError::SessionExpired)
            }
        }
    }

    /// Send `pixels` as one batch. Returns the request id the ack will echo.
    pub fn submit(&mut self, pixels: &[StagedPixel]) -> Result<u64, SyncError> {
        if pixels.is_empty() {
            return Err(SyncError::NothingToSubmit);
        }
        match self.state {
            SyncState::Connected => {}
            SyncState::SessionExpired => return Err(SyncError::SessionExpired),
            _ => return Err(SyncError::NotConnected),
        }
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.transport.send(&ClientMessage::SubmitBatch {
            request_id,
            pixels: pixels.iter().map(WirePixel::from).collect(),
        });
        self.in_flight.insert(request_id, pixels.to_vec());
        log::info!("submitted batch {} ({} pixels)", request_id, pixels.len());
        Ok(request_id)
    }

    /// Match an ack to its batch. An ack without an id resolves the oldest batch, since
    /// acks arrive in send order on one connection. Unknown ids resolve nothing.
    pub fn resolve_ack(&mut self, request_id: Option<u64>) -> Option<(u64, Vec<StagedPixel>)> {
        let id = match request_id {
            Some(id) => id,
            None => *self.in_flight.keys().next()?,
        };
        let pixels = self.in_flight.remove(&id);
        if pixels.is_none() {
            log::warn!("ack for unknown batch {}", id);
        }
        pixels.map(|p| (id, p))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Wire {
        Connect(String),
        Disconnect,
        Send(ClientMessage),
    }

    /// Records everything the client sends.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub log: Vec<Wire>,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<&ClientMessage> {
            self.log
                .iter()
                .filter_map(|w| match w {
                    Wire::Send(m) => Some(m),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self, token: &str) {
            self.log.push(Wire::Connect(token.to_string()));
        }

        fn disconnect(&mut self) {
            self.log.push(Wire::Disconnect);
        }

        fn send(&mut self, message: &ClientMessage) {
            self.log.push(Wire::Send(message.clone()));
        }
    }

    #[derive(Debug, Default)]
    pub struct MemoryCredentials {
        pub token: Option<String>,
        pub refreshes: usize,
        pub cleared: bool,
    }

    impl MemoryCredentials {
        pub fn with_token(token: &str) -> Self {
            Self {
                token: Some(token.to_string()),
                ..Default::default()
            }
        }
    }

    impl CredentialProvider for MemoryCredentials {
        fn access_token(&self) -> Option<String> {
            self.token.clone()
        }

        fn begin_refresh(&mut self) {
            self.refreshes += 1;
        }

        fn clear(&mut self) {
            self.token = None;
            self.cleared = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::api::types::{Color, GridPos};

    fn connected() -> SyncClient<RecordingTransport, MemoryCredentials> {
        let mut client = SyncClient::new(RecordingTransport::default(), MemoryCredentials::with_token("t1"));
        client.connect().unwrap();
        client.on_connected();
        client
    }

    fn pixel(x: u32) -> StagedPixel {
        StagedPixel { pos: GridPos::new(x, 0), color: Color::BLACK }
    }

    #[test]
    fn connect_requests_snapshots() {
        let client = connected();
        assert_eq!(client.state(), SyncState::Connected);
        assert_eq!(client.transport().log[0], Wire::Connect("t1".into()));
        assert_eq!(
            client.transport().sent(),
            vec![&ClientMessage::RequestEnergy, &ClientMessage::RequestCanvas]
        );
    }

    #[test]
    fn connect_without_token_fails() {
        let mut client = SyncClient::new(RecordingTransport::default(), MemoryCredentials::default());
        assert_eq!(client.connect(), Err(SyncError::SessionExpired));
        assert_eq!(client.issue(), Some(&ConnectionIssue::NoCredentials));
        assert!(client.transport().log.is_empty());
    }

    #[test]
    fn submit_requires_connection_and_pixels() {
        let mut client = SyncClient::new(RecordingTransport::default(), MemoryCredentials::with_token("t"));
        assert_eq!(client.submit(&[pixel(0)]), Err(SyncError::NotConnected));
        let mut client = connected();
        assert_eq!(client.submit(&[]), Err(SyncError::NothingToSubmit));
        assert_eq!(client.submit(&[pixel(0)]), Ok(1));
        assert_eq!(client.submit(&[pixel(1)]), Ok(2));
        assert!(client.is_submitting());
    }

    #[test]
    fn acks_resolve_by_id_or_in_order() {
        let mut client = connected();
        client.submit(&[pixel(0)]).unwrap();
        client.submit(&[pixel(1)]).unwrap();
        client.submit(&[pixel(2)]).unwrap();
        assert_eq!(client.resolve_ack(Some(2)), Some((2, vec![pixel(1)])));
        assert_eq!(client.resolve_ack(Some(2)), None);
        assert_eq!(client.resolve_ack(Some(99)), None);
        assert_eq!(client.resolve_ack(None), Some((1, vec![pixel(0)])));
        assert_eq!(client.resolve_ack(None), Some((3, vec![pixel(2)])));
        assert_eq!(client.resolve_ack(None), None);
        assert!(!client.is_submitting());
    }

    #[test]
    fn disconnect_reports_loss_and_forgets_batches() {
        let mut client = connected();
        client.submit(&[pixel(0)]).unwrap();
        client.on_disconnected(Some("transport close"));
        assert_eq!(client.state(), SyncState::Disconnected);
        assert_eq!(client.issue(), Some(&ConnectionIssue::ConnectionLost));
        assert!(!client.is_submitting());
        client.on_connected();
        assert_eq!(client.issue(), None);
    }

    #[test]
    fn token_expiry_refreshes_once() {
        let mut client = connected();
        client.on_token_expired();
        client.on_token_expired();
        assert_eq!(client.credentials().refreshes, 1);
        assert_eq!(client.state(), SyncState::Reauthenticating);
        client.on_disconnected(None);
        assert_eq!(client.issue(), None);

        assert_eq!(client.on_refresh_complete(Some("t2".into())), Ok(()));
        assert_eq!(client.state(), SyncState::Connecting);
        assert_eq!(client.transport().log.last(), Some(&Wire::Connect("t2".into())));
        client.on_connected();
        assert_eq!(client.state(), SyncState::Connected);
    }

    #[test]
    fn connect_during_refresh_waits_for_new_token() {
        let mut client = connected();
        client.on_token_expired();
        let disconnected_at = client.transport().log.len();
        assert_eq!(client.connect(), Ok(()));
        assert_eq!(client.transport().log.len(), disconnected_at);
        assert_eq!(client.state(), SyncState::Reauthenticating);

        client.on_token_expired();
        assert_eq!(client.credentials().refreshes, 1);

        assert_eq!(client.on_refresh_complete(Some("t2".into())), Ok(()));
        assert_eq!(
            &client.transport().log[disconnected_at - 1..],
            &[Wire::Disconnect, Wire::Connect("t2".into())]
        );
    }

    #[test]
    fn failed_refresh_expires_session() {
        let mut client = connected();
        client.on_token_expired();
        assert_eq!(client.on_refresh_complete(None), Err(SyncError::SessionExpired));
        assert_eq!(client.state(), SyncState::SessionExpired);
        assert!(client.credentials().cleared);
        assert_eq!(client.issue(), Some(&ConnectionIssue::SessionExpired));

        client.on_token_expired();
        assert_eq!(client.credentials().refreshes, 1);
        client.on_connected();
        assert_eq!(client.state(), SyncState::SessionExpired);
        assert_eq!(client.submit(&[pixel(0)]), Err(SyncError::SessionExpired));
    }

    #[test]
    fn stray_refresh_result_is_ignored() {
        let mut client = connected();
        assert_eq!(client.on_refresh_complete(None), Ok(()));
        assert_eq!(client.state(), SyncState::Connected);
        assert!(!client.credentials().cleared);
    }
}
