//! Hub protocol trait definitions.
//!
//! The `HubProtocol` trait abstracts over wire encodings of hub messages.
//! Transports hand it raw inbound bytes and send whatever it writes.

use ntex_bytes::BytesMut;

use crate::binder::InvocationBinder;
use crate::error::CodecError;
use crate::message::HubMessage;

/// Default maximum frame size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default limit on nested arrays and maps inside one value.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Whether a protocol produces text or binary transport messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    /// UTF-8 text frames.
    Text,
    /// Binary frames.
    Binary,
}

/// Wire encoding of hub messages.
///
/// # Example
///
/// ```rust
/// use hubwire_core::{HubProtocol, TransferFormat};
///
/// // Transports only need the protocol's identity and the two entry points
/// fn describe<P: HubProtocol>(protocol: &P) -> String {
///     let kind = match protocol.transfer_format() {
///         TransferFormat::Text => "text",
///         TransferFormat::Binary => "binary",
///     };
///     format!("{} v{} ({kind})", protocol.name(), protocol.version())
/// }
/// ```
pub trait HubProtocol: Send + Sync {
    /// Protocol name used during negotiation.
    fn name(&self) -> &str;

    /// Protocol version.
    fn version(&self) -> u32;

    /// Transfer format the protocol requires from the transport.
    fn transfer_format(&self) -> TransferFormat;

    /// Append one encoded message to `dst`.
    ///
    /// On error `dst` is left as it was.
    fn write_message(&self, message: &HubMessage, dst: &mut BytesMut) -> Result<(), CodecError>;

    /// Decode every complete message buffered in `src`, in arrival order.
    ///
    /// Consumed bytes are removed from `src`; a trailing partial message stays
    /// buffered until more bytes arrive. An error is fatal for the connection.
    fn parse_messages(
        &self,
        src: &mut BytesMut,
        binder: &dyn InvocationBinder,
    ) -> Result<Vec<HubMessage>, CodecError>;
}

/// Limits applied by a protocol implementation.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Maximum payload size of a single frame in bytes.
    pub max_frame_size: usize,

    /// Maximum depth of nested arrays and maps in a decoded value.
    pub max_nesting_depth: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ProtocolConfig {
    /// Create a new protocol configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum frame size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the maximum nesting depth.
    #[must_use]
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}
