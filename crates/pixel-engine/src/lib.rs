pub mod api;
pub mod core;
pub mod input;
pub mod renderer;
pub mod store;
pub mod sync;

// Re-export key types at crate root for convenience
pub use api::config::{CanvasConfig, ConfigError};
pub use api::engine::{CanvasEngine, EditSession, EngineEvent, Notice, NoticeLevel, Revision};
pub use api::error::{ProtocolError, StageError, SyncError};
pub use api::types::{Color, CommittedPixel, GridPos, GridSize, InvalidColor, Millis, StagedPixel};
pub use crate::core::time::RefreshTimer;
pub use crate::core::viewport::Viewport;
pub use input::gesture::{Gesture, GestureClassifier, GestureState};
pub use input::queue::{InputEvent, InputQueue, PointerTarget, TouchSet};
pub use renderer::{Blit, FrameScheduler, PixelBitmap, RedrawReason, RenderFrame};
pub use store::committed::CommittedStore;
pub use store::energy::{format_countdown, EnergyCorrection, EnergyDisplay, EnergyLedger};
pub use store::staged::EditBuffer;
pub use sync::{
    BatchAck, ClientMessage, ConnectionIssue, CredentialProvider, ServerMessage, SyncClient,
    SyncState, Transport, WirePixel,
};
