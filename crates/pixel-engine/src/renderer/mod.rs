pub mod bitmap;
pub mod frame;
pub mod scheduler;

// Re-export key types for convenient access
pub use bitmap::PixelBitmap;
pub use frame::{Blit, RenderFrame};
pub use scheduler::{FrameScheduler, FrameTicket, RedrawReason};
