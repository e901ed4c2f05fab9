pub mod client;
pub mod protocol;

pub use client::{ConnectionIssue, CredentialProvider, SyncClient, SyncState, Transport};
pub use protocol::{BatchAck, ClientMessage, ServerMessage, WirePixel};
