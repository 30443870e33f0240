//! Stream codec pairing the hub protocol with a binder.

use std::fmt;
use std::sync::Arc;

use hubwire_core::{CodecError, HubMessage, HubProtocol, InvocationBinder};
use ntex_bytes::{Buf, BytesMut};
use ntex_codec::{Decoder, Encoder};

use crate::protocol::MessagePackHubProtocol;

/// Decodes and encodes hub messages on a byte stream.
///
/// Decoding yields one message per call. Frames of unknown message types are
/// dropped without surfacing to the caller.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use hubwire_codec::HubCodec;
/// use hubwire_core::{HubMessage, MethodTable};
/// use ntex_bytes::BytesMut;
/// use ntex_codec::{Decoder, Encoder};
///
/// let codec = HubCodec::new(Arc::new(MethodTable::new()));
/// let mut buf = BytesMut::new();
///
/// codec.encode(HubMessage::Ping, &mut buf).unwrap();
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(HubMessage::Ping));
/// assert_eq!(codec.decode(&mut buf).unwrap(), None);
/// ```
#[derive(Clone)]
pub struct HubCodec {
    protocol: MessagePackHubProtocol,
    binder: Arc<dyn InvocationBinder>,
}

impl HubCodec {
    /// Create a codec with default protocol limits.
    pub fn new(binder: Arc<dyn InvocationBinder>) -> Self {
        Self::with_protocol(MessagePackHubProtocol::new(), binder)
    }

    /// Create a codec around a configured protocol.
    pub fn with_protocol(
        protocol: MessagePackHubProtocol,
        binder: Arc<dyn InvocationBinder>,
    ) -> Self {
        Self { protocol, binder }
    }

    /// Get the protocol.
    #[inline]
    pub fn protocol(&self) -> &MessagePackHubProtocol {
        &self.protocol
    }

    /// Get the binder.
    #[inline]
    pub fn binder(&self) -> &Arc<dyn InvocationBinder> {
        &self.binder
    }
}

impl fmt::Debug for HubCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCodec")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

impl Decoder for HubCodec {
    type Item = HubMessage;
    type Error = CodecError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.protocol.parse_frame(&src[..], self.binder.as_ref()) {
                Ok((Some(message), consumed)) => {
                    src.advance(consumed);
                    return Ok(Some(message));
                }
                Ok((None, consumed)) => src.advance(consumed),
                Err(CodecError::IncompleteFrame { needed }) => {
                    src.reserve(needed);
                    return Ok(None);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "dropping unparseable hub stream");
                    return Err(e);
                }
            }
        }
    }
}

impl Encoder for HubCodec {
    type Item = HubMessage;
    type Error = CodecError;

    fn encode(&self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.protocol.write_message(&item, dst)
    }
}
