//! # hubwire-codec
//!
//! MessagePack hub protocol with varint length-prefixed framing.
//!
//! This crate provides:
//! - `MessagePackHubProtocol` - Message encoder/parser implementing `HubProtocol`
//! - `HubCodec` - `ntex_codec` decoder/encoder yielding `HubMessage`s
//! - `FrameCodec` - Length-prefixed frame encoder/decoder
//! - `MessagePackReader` / `MessagePackWriter` - Primitive MessagePack access
//!
//! ## Frame Format
//!
//! ```text
//! +---------------------+------------------------------+
//! | Length (varint 1-5) | MessagePack array (N bytes)  |
//! +---------------------+------------------------------+
//! ```
//!
//! The length is split into 7-bit groups, least significant first, with the
//! high bit of each byte set while more bytes follow.

mod codec;
mod frame;
mod primitive;
mod protocol;

pub mod coerce;
pub mod varint;

pub use codec::HubCodec;
pub use frame::FrameCodec;
pub use primitive::{MessagePackReader, MessagePackWriter};
pub use protocol::{MessagePackHubProtocol, PROTOCOL_NAME, PROTOCOL_VERSION, read_message_type};
