//! Error types for the hubwire protocol.

/// Main error type for hubwire operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HubError {
    /// Codec error (framing, serialization, deserialization)
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A message was constructed with an invalid combination of fields
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Codec errors for framing and MessagePack values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The buffer holds less than one whole frame.
    ///
    /// Not fatal: the caller keeps the bytes and retries once more arrive.
    #[error("incomplete frame: need at least {needed} more bytes")]
    IncompleteFrame {
        /// Lower bound on the number of bytes still missing
        needed: usize,
    },

    /// The input ended in the middle of a value
    #[error("insufficient data to read value")]
    InsufficientData,

    /// Corrupt tag, length, or value
    #[error("malformed value: {0}")]
    MalformedValue(String),

    /// Well-formed values that do not make a valid hub message
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Message type discriminant not known to this implementation
    #[error("unknown message type: {0}")]
    UnknownMessageType(i64),

    /// Frame size exceeds maximum allowed
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Encoding a message failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CodecError {
    /// Create a malformed value error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedValue(message.into())
    }

    /// Create a protocol violation error.
    #[must_use]
    pub fn violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Check if the error only means "wait for more bytes".
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IncompleteFrame { .. } | Self::InsufficientData)
    }

    /// Check if the error leaves the inbound stream unparseable.
    ///
    /// A fatal error means the connection must be torn down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedValue(_) | Self::ProtocolViolation(_) | Self::FrameTooLarge { .. }
        )
    }

    /// Reinterpret a primitive error raised inside a frame whose full length
    /// is already buffered.
    ///
    /// Running out of data there means the frame lied about its length.
    #[must_use]
    pub fn within_frame(self) -> Self {
        match self {
            Self::InsufficientData | Self::IncompleteFrame { .. } => {
                Self::malformed("value extends past the end of its frame")
            }
            other => other,
        }
    }
}

impl HubError {
    /// Create an invalid message error.
    #[must_use]
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage(message.into())
    }

    /// Check if this error indicates the connection should be closed.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Codec(e) if e.is_fatal())
    }
}
