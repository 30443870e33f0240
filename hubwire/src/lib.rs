//! # Hubwire
//!
//! Binary message protocol for bidirectional RPC hubs.
//!
//! Hubwire provides:
//! - **Hub messages**: invocations, streaming, completions, cancellation, keep-alive and close
//! - **MessagePack encoding** with varint length-prefixed framing
//! - **Invocation binder** that types incoming arguments and results by method
//! - **Stream codec** for `ntex_codec` based transports
//!
//! ## Quick Start
//!
//! ```rust
//! use hubwire::prelude::*;
//!
//! let protocol = MessagePackHubProtocol::new();
//! let binder = MethodTable::new();
//! binder.register_target("add", vec![TypeHint::Float, TypeHint::Float]);
//!
//! let call: HubMessage = InvocationMessage::new("add", vec![Value::Int(1), Value::Float(2.5)])
//!     .with_invocation_id("1")
//!     .into();
//!
//! let mut buf = BytesMut::new();
//! protocol.write_message(&call, &mut buf).unwrap();
//!
//! let messages = protocol.parse_messages(&mut buf, &binder).unwrap();
//! let HubMessage::Invocation(invocation) = &messages[0] else { unreachable!() };
//! assert_eq!(invocation.arguments, vec![Value::Float(1.0), Value::Float(2.5)]);
//! ```
//!
//! ## Architecture
//!
//! Hubwire is composed of two crates:
//!
//! - [`hubwire-core`] - Message model, values, binder, errors and the protocol trait
//! - [`hubwire-codec`] - MessagePack protocol, framing and stream codec

// Re-export core types
pub use hubwire_core::{
    CodecError, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_NESTING_DEPTH, HubError, HubProtocol,
    ProtocolConfig, TransferFormat, Value,
};

// Re-export message types
pub use hubwire_core::{
    CancelInvocationMessage, CloseMessage, CompletionMessage, CompletionOutcome, Headers,
    HubMessage, InvocationMessage, MessageType, StreamInvocationMessage, StreamItemMessage,
};

// Re-export binder
pub use hubwire_core::{InvocationBinder, MethodTable, TypeHint, UntypedBinder};

// Re-export codec
pub use hubwire_codec::{
    FrameCodec, HubCodec, MessagePackHubProtocol, MessagePackReader, MessagePackWriter,
    PROTOCOL_NAME, PROTOCOL_VERSION, coerce, varint,
};

// Re-export buffers for user convenience
pub use ntex_bytes::{Bytes, BytesMut};

/// Prelude module for convenient imports.
///
/// ```rust
/// use hubwire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BytesMut, HubCodec, HubMessage, InvocationMessage, MessagePackHubProtocol, MethodTable,
        TypeHint, Value,
    };

    pub use hubwire_core::{HubProtocol, InvocationBinder};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
