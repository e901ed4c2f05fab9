use glam::Vec2;
use serde::Serialize;

use crate::api::config::{CanvasConfig, ConfigError};
use crate::api::error::{ProtocolError, StageError, SyncError};
use crate::api::types::{Color, CommittedPixel, GridPos, Millis, StagedPixel};
use crate::core::time::RefreshTimer;
use crate::core::viewport::Viewport;
use crate::input::gesture::{Gesture, GestureClassifier};
use crate::input::queue::{InputEvent, InputQueue};
use crate::renderer::bitmap::PixelBitmap;
use crate::renderer::frame::{Blit, RenderFrame};
use crate::renderer::scheduler::{FrameScheduler, RedrawReason};
use crate::store::committed::CommittedStore;
use crate::store::energy::{EnergyCorrection, EnergyDisplay, EnergyLedger};
use crate::store::staged::EditBuffer;
use crate::sync::client::{ConnectionIssue, CredentialProvider, SyncClient, SyncState, Transport};
use crate::sync::protocol::{BatchAck, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// User-facing message. `code` is stable and meant for localisation lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub code: &'static str,
    pub message: String,
}

impl Notice {
    fn connection_lost() -> Self {
        Self {
            level: NoticeLevel::Error,
            code: "connection-lost",
            message: "connection lost".to_string(),
        }
    }
}

impl From<&StageError> for Notice {
    fn from(err: &StageError) -> Self {
        let code = match err {
            StageError::OutOfBounds(_) => "out-of-bounds",
            StageError::AlreadyStaged(_) => "already-staged",
            StageError::InsufficientEnergy { .. } => "not-enough-energy",
            StageError::NotStaged(_) => "cannot-erase-unsent",
            StageError::EditSessionClosed => "palette-closed",
        };
        Self {
            level: NoticeLevel::Warning,
            code,
            message: err.to_string(),
        }
    }
}

impl From<&SyncError> for Notice {
    fn from(err: &SyncError) -> Self {
        let (level, code) = match err {
            SyncError::NothingToSubmit => (NoticeLevel::Warning, "place-pixel-required"),
            SyncError::NotConnected => (NoticeLevel::Error, "not-connected"),
            SyncError::SessionExpired => (NoticeLevel::Error, "session-expired"),
            SyncError::Rejected(_) => (NoticeLevel::Error, "submit-rejected"),
        };
        Self {
            level,
            code,
            message: err.to_string(),
        }
    }
}

/// Events for the host, drained once per frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EngineEvent {
    Notice(Notice),
    /// Tap outside edit mode on a committed pixel.
    PixelInspected(CommittedPixel),
    #[serde(rename_all = "camelCase")]
    SubmitSucceeded { request_id: u64, count: usize },
    /// Credential refresh failed. The host should send the user to log in.
    SessionExpired,
    ConnectionChanged(SyncState),
    EnergyChanged(EnergyDisplay),
}

/// Change counters. A selector re-reads a store only when its counter moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Revision {
    pub committed: u64,
    pub staged: u64,
    pub viewport: u64,
    pub energy: u64,
}

/// Local edit mode state ("palette open").
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSession {
    pub open: bool,
    pub eraser: bool,
    pub color: Color,
}

/// The canvas engine. Owns every store and is the only thing that mutates them.
pub struct CanvasEngine<T: Transport, C: CredentialProvider> {
    config: CanvasConfig,
    viewport: Viewport,
    gestures: GestureClassifier,
    input: InputQueue,
    committed: CommittedStore,
    staged: EditBuffer,
    ledger: EnergyLedger,
    bitmap: PixelBitmap,
    scheduler: FrameScheduler,
    frame_requested: bool,
    refresh_timer: RefreshTimer,
    sync: SyncClient<T, C>,
    session: EditSession,
    local_user_id: String,
    viewport_revision: u64,
    energy_revision: u64,
    shown_energy: Option<(u32, u32, u32)>,
    shown_sync_state: SyncState,
    events: Vec<EngineEvent>,
}

impl<T: Transport, C: CredentialProvider> CanvasEngine<T, C> {
    pub fn new(
        config: CanvasConfig,
        viewport_size: Vec2,
        transport: T,
        credentials: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = config.grid();
        let mut viewport = Viewport::new(&config, viewport_size);
        viewport.center();
        log::info!(
            "canvas engine: {}x{} grid, viewport {}x{}",
            grid.width,
            grid.height,
            viewport_size.x,
            viewport_size.y
        );

        let mut engine = Self {
            gestures: GestureClassifier::new(&config),
            input: InputQueue::new(),
            committed: CommittedStore::new(grid),
            staged: EditBuffer::new(),
            ledger: EnergyLedger::new(config.energy_capacity, config.regen_seconds),
            bitmap: PixelBitmap::new(grid, config.background),
            scheduler: FrameScheduler::new(),
            frame_requested: false,
            refresh_timer: RefreshTimer::new(config.balance_refresh_interval),
            sync: SyncClient::new(transport, credentials),
            session: EditSession {
                open: false,
                eraser: false,
                color: config.palette.first().copied().unwrap_or(Color::BLACK),
            },
            local_user_id: String::new(),
            viewport_revision: 0,
            energy_revision: 0,
            shown_energy: None,
            shown_sync_state: SyncState::Disconnected,
            events: Vec::new(),
            viewport,
            config,
        };
        engine.request_redraw(RedrawReason::Pixels);
        Ok(engine)
    }

    // -- Accessors --

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn committed(&self) -> &CommittedStore {
        &self.committed
    }

    pub fn staged(&self) -> &EditBuffer {
        &self.staged
    }

    pub fn ledger(&self) -> &EnergyLedger {
        &self.ledger
    }

    pub fn edit_session(&self) -> EditSession {
        self.session
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn connection_issue(&self) -> Option<&ConnectionIssue> {
        self.sync.issue()
    }

    pub fn is_submitting(&self) -> bool {
        self.sync.is_submitting()
    }

    pub fn sync(&self) -> &SyncClient<T, C> {
        &self.sync
    }

    pub fn bitmap(&self) -> &PixelBitmap {
        &self.bitmap
    }

    pub fn revision(&self) -> Revision {
        Revision {
            committed: self.committed.revision(),
            staged: self.staged.revision(),
            viewport: self.viewport_revision,
            energy: self.energy_revision,
        }
    }

    pub fn energy_display(&self, now: Millis) -> EnergyDisplay {
        self.ledger.display(now, self.staged.len())
    }

    /// Pixels acknowledged from this client are attributed to `user_id`.
    pub fn set_local_user(&mut self, user_id: impl Into<String>) {
        self.local_user_id = user_id.into();
    }

    /// Take queued host events.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// True once after a redraw became pending. The host answers by scheduling
    /// one animation frame.
    pub fn take_frame_request(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    fn request_redraw(&mut self, reason: RedrawReason) {
        if self.scheduler.request(reason) {
            self.frame_requested = true;
        }
    }

    // -- Viewport --

    pub fn resize(&mut self, size: Vec2) {
        // A press that spans a layout change would land on a different cell.
        self.gestures.reset();
        if self.viewport.resize(size) {
            self.viewport_changed();
        }
    }

    pub fn center(&mut self) {
        if self.viewport.center() {
            self.viewport_changed();
        }
    }

    /// Set the transform directly. Both values are clamped.
    pub fn set_transform(&mut self, offset: Vec2, scale: f32) {
        if self.viewport.set_transform(offset, scale) {
            self.viewport_changed();
        }
    }

    fn viewport_changed(&mut self) {
        self.viewport_revision += 1;
        self.request_redraw(RedrawReason::Viewport);
    }

    // -- Input --

    /// Queue an event for the next `process_input`.
    pub fn push_input(&mut self, event: InputEvent) {
        self.input.push(event);
    }

    /// Handle all queued input in arrival order.
    pub fn process_input(&mut self, now: Millis) {
        for event in self.input.drain() {
            self.handle_input(event, now);
        }
    }

    /// Classify one event and apply the resulting gesture.
    pub fn handle_input(&mut self, event: InputEvent, now: Millis) {
        if !event.is_finite() {
            log::debug!("dropping non-finite input event {:?}", event);
            return;
        }
        let Some(gesture) = self.gestures.handle(&event, &self.viewport) else {
            return;
        };
        match gesture {
            Gesture::Pan { offset } => self.set_transform(offset, self.viewport.scale()),
            Gesture::PinchZoom { offset, scale } | Gesture::WheelZoom { offset, scale } => {
                self.set_transform(offset, scale)
            }
            Gesture::Tap { screen } => self.tap(screen, now),
        }
    }

    /// A tap stages or erases in edit mode, and inspects otherwise.
    /// Taps outside the grid do nothing.
    pub fn tap(&mut self, screen: Vec2, now: Millis) {
        let cell = self.viewport.screen_to_grid(screen);
        let Some(pos) = self.config.grid().cell(cell) else {
            log::debug!("tap outside grid at {:?}", cell);
            return;
        };
        if !self.session.open {
            self.inspect(pos);
            return;
        }
        // Rejections are already reported as notices.
        let _ = if self.session.eraser {
            self.unstage(pos, now).map(|_| ())
        } else {
            self.stage(pos, self.session.color, now)
        };
    }

    fn inspect(&mut self, pos: GridPos) {
        if let Some(pixel) = self.committed.get(pos) {
            self.events.push(EngineEvent::PixelInspected(pixel.clone()));
        }
    }

    // -- Edit session --

    pub fn open_edit_session(&mut self) {
        self.session.open = true;
    }

    /// Close the palette and discard everything staged.
    pub fn close_edit_session(&mut self, now: Millis) {
        self.gestures.reset();
        self.session.open = false;
        self.session.eraser = false;
        self.clear(now);
    }

    pub fn set_eraser(&mut self, enabled: bool) {
        self.session.eraser = enabled;
    }

    pub fn select_color(&mut self, color: Color) {
        self.session.color = color;
        self.session.eraser = false;
    }

    pub fn stage(&mut self, pos: GridPos, color: Color, now: Millis) -> Result<(), StageError> {
        let result = self.try_stage(pos, color, now);
        match &result {
            Ok(()) => {
                self.request_redraw(RedrawReason::Pixels);
                self.note_energy(now);
            }
            Err(err) => self.reject(err),
        }
        result
    }

    fn try_stage(&mut self, pos: GridPos, color: Color, now: Millis) -> Result<(), StageError> {
        if !self.session.open {
            return Err(StageError::EditSessionClosed);
        }
        if !self.config.grid().contains(pos) {
            return Err(StageError::OutOfBounds(pos));
        }
        self.staged.stage(pos, color, self.ledger.whole_units(now))
    }

    pub fn unstage(&mut self, pos: GridPos, now: Millis) -> Result<StagedPixel, StageError> {
        let result = self.staged.unstage(pos);
        match &result {
            Ok(_) => self.pixels_edited(now),
            Err(err) => self.reject(err),
        }
        result
    }

    pub fn undo_last(&mut self, now: Millis) -> Option<StagedPixel> {
        let undone = self.staged.undo_last();
        if undone.is_some() {
            self.pixels_edited(now);
        }
        undone
    }

    /// Discard all staged pixels. Returns how many were dropped.
    pub fn clear(&mut self, now: Millis) -> usize {
        let cleared = self.staged.clear();
        if cleared > 0 {
            self.pixels_edited(now);
        }
        cleared
    }

    fn pixels_edited(&mut self, now: Millis) {
        self.request_redraw(RedrawReason::Pixels);
        self.note_energy(now);
    }

    fn reject(&mut self, err: &StageError) {
        log::warn!("edit rejected: {}", err);
        self.events.push(EngineEvent::Notice(err.into()));
    }

    // -- Sync --

    pub fn connect(&mut self) -> Result<(), SyncError> {
        let result = self.sync.connect();
        if let Err(err) = &result {
            self.events.push(EngineEvent::Notice(err.into()));
        }
        self.note_connection();
        result
    }

    pub fn shutdown(&mut self) {
        self.sync.shutdown();
        self.note_connection();
    }

    /// Send every staged pixel as one batch. Staged pixels stay put until the ack.
    pub fn submit(&mut self) -> Result<u64, SyncError> {
        let result = self.sync.submit(self.staged.as_slice());
        if let Err(err) = &result {
            log::warn!("submit refused: {}", err);
            self.events.push(EngineEvent::Notice(err.into()));
        }
        result
    }

    /// Decode and apply one inbound envelope.
    pub fn on_server_json(&mut self, json: &str, now: Millis) -> Result<(), ProtocolError> {
        let message = ServerMessage::from_json(json)?;
        self.on_server_message(message, now);
        Ok(())
    }

    pub fn on_server_message(&mut self, message: ServerMessage, now: Millis) {
        match message {
            ServerMessage::Connect => self.sync.on_connected(),
            ServerMessage::Disconnect { reason } => {
                let was = self.sync.state();
                self.sync.on_disconnected(reason.as_deref());
                if was != SyncState::Disconnected && self.sync.state() == SyncState::Disconnected {
                    self.events.push(EngineEvent::Notice(Notice::connection_lost()));
                }
            }
            ServerMessage::ConnectError { message } => self.sync.on_connect_error(message.as_deref()),
            ServerMessage::TokenExpired => self.sync.on_token_expired(),
            ServerMessage::CanvasState(pixels) => {
                log::info!("canvas snapshot: {} pixels", pixels.len());
                self.committed.replace_all(pixels);
                self.request_redraw(RedrawReason::Pixels);
            }
            ServerMessage::UpdatePixels(pixels) => {
                let before = self.committed.revision();
                self.committed.merge(pixels);
                if self.committed.revision() != before {
                    self.request_redraw(RedrawReason::Pixels);
                }
            }
            ServerMessage::EnergyUpdate(correction) | ServerMessage::Energy(correction) => {
                self.apply_energy(correction, now)
            }
            ServerMessage::BatchAck(ack) => self.on_batch_ack(ack, now),
        }
        self.note_connection();
    }

    /// Result of a credential refresh the provider was asked to start. `None` means it failed.
    pub fn on_refresh_complete(&mut self, token: Option<String>) {
        if let Err(err) = self.sync.on_refresh_complete(token) {
            self.events.push(EngineEvent::Notice((&err).into()));
            self.events.push(EngineEvent::SessionExpired);
        }
        self.note_connection();
    }

    fn on_batch_ack(&mut self, ack: BatchAck, now: Millis) {
        let Some((request_id, submitted)) = self.sync.resolve_ack(ack.request_id) else {
            return;
        };
        if let Some(reason) = ack.error {
            log::warn!("batch {} rejected: {}", request_id, reason);
            let err = SyncError::Rejected(reason);
            self.events.push(EngineEvent::Notice((&err).into()));
            return;
        }

        let owner = self.local_user_id.clone();
        self.committed.merge(submitted.iter().map(|p| CommittedPixel {
            pos: p.pos,
            color: p.color,
            owner_id: owner.clone(),
            placed_at: Some(now),
        }));
        self.staged.remove_submitted(&submitted);
        log::info!("batch {} accepted ({} pixels)", request_id, submitted.len());
        self.events.push(EngineEvent::SubmitSucceeded {
            request_id,
            count: submitted.len(),
        });
        self.request_redraw(RedrawReason::Pixels);
        self.apply_energy(
            EnergyCorrection {
                energy: ack.energy_left,
                capacity: ack.capacity,
                ..Default::default()
            },
            now,
        );
    }

    fn apply_energy(&mut self, correction: EnergyCorrection, now: Millis) {
        if self.ledger.apply(correction, now) {
            self.energy_revision += 1;
        }
        self.note_energy(now);
    }

    fn note_energy(&mut self, now: Millis) {
        let display = self.energy_display(now);
        let key = (display.current, display.capacity, display.available);
        if self.shown_energy != Some(key) {
            self.shown_energy = Some(key);
            self.events.push(EngineEvent::EnergyChanged(display));
        }
    }

    fn note_connection(&mut self) {
        let state = self.sync.state();
        if state != self.shown_sync_state {
            self.shown_sync_state = state;
            self.events.push(EngineEvent::ConnectionChanged(state));
        }
    }

    // -- Frame --

    /// Per-frame clock. Re-evaluates the regenerating balance every refresh interval.
    pub fn tick(&mut self, dt: f32, now: Millis) {
        if self.refresh_timer.advance(dt) {
            self.note_energy(now);
        }
    }

    /// Called from the host's animation frame callback. Returns None if nothing changed
    /// since the last frame.
    pub fn animation_frame(&mut self) -> Option<RenderFrame<'_>> {
        let ticket = self.scheduler.take()?;
        self.frame_requested = false;
        let bitmap_changed = self.bitmap.recompose_if_dirty(&self.committed, &self.staged);
        log::trace!("frame {:?}, bitmap changed: {}", ticket, bitmap_changed);
        Some(RenderFrame {
            blit: Blit::from_viewport(&self.viewport, self.bitmap.width(), self.bitmap.height()),
            bitmap: self.bitmap.as_bytes(),
            bitmap_changed,
            staged: self.staged.as_slice(),
            cell_screen_size: self.viewport.cell_size() * self.viewport.scale(),
        })
    }
}
