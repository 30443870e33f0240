//! # hubwire-core
//!
//! Core types, traits, and error definitions for the hubwire hub protocol.
//!
//! This crate provides:
//! - Error types (`HubError`, `CodecError`)
//! - Hub message types (`HubMessage` and one struct per message kind)
//! - Opaque payload values (`Value`)
//! - The invocation binder (`InvocationBinder`, `TypeHint`, `MethodTable`)
//! - Protocol trait and limits (`HubProtocol`, `ProtocolConfig`)

mod binder;
mod error;
mod message;
mod protocol;
mod value;

pub use binder::{InvocationBinder, MethodTable, TypeHint, UntypedBinder};
pub use error::{CodecError, HubError};
pub use message::{
    CancelInvocationMessage, CloseMessage, CompletionMessage, CompletionOutcome, Headers,
    HubMessage, InvocationMessage, MessageType, StreamInvocationMessage, StreamItemMessage,
};
pub use protocol::{
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_NESTING_DEPTH, HubProtocol, ProtocolConfig,
    TransferFormat,
};
pub use value::Value;
