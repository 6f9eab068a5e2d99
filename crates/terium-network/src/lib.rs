//! The peer transport: an opaque framed byte stream with inbound and
//! outbound channels. Peer discovery, authentication and transport framing
//! beyond the 1-KiB-read convention are out of scope here.

pub mod frame;
pub mod peer;

pub use frame::{Frame, FrameError};
pub use peer::{spawn_reader, spawn_writer};
