//! Hub message types.
//!
//! One struct per message kind, gathered in the [`HubMessage`] sum type.
//! Messages are plain owned values; the codec builds a fresh one per frame.

use std::collections::HashMap;
use std::fmt;

use crate::error::HubError;
use crate::value::Value;

/// Per-message metadata. An empty map means no headers.
pub type Headers = HashMap<String, String>;

/// Type of hub message.
///
/// The discriminants are the wire values and are stable across
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Invocation of a remote target, optionally expecting a completion.
    Invocation = 1,

    /// Item produced by a streaming invocation.
    StreamItem = 2,

    /// Final result or error of an invocation.
    Completion = 3,

    /// Invocation whose result is a stream of items.
    StreamInvocation = 4,

    /// Request to stop a streaming invocation.
    CancelInvocation = 5,

    /// Keepalive.
    Ping = 6,

    /// Connection is being closed by the sender.
    Close = 7,
}

impl MessageType {
    /// Map a wire discriminant to a message type.
    #[must_use]
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(Self::Invocation),
            2 => Some(Self::StreamItem),
            3 => Some(Self::Completion),
            4 => Some(Self::StreamInvocation),
            5 => Some(Self::CancelInvocation),
            6 => Some(Self::Ping),
            7 => Some(Self::Close),
            _ => None,
        }
    }

    /// Wire discriminant.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invocation => "invocation",
            Self::StreamItem => "stream-item",
            Self::Completion => "completion",
            Self::StreamInvocation => "stream-invocation",
            Self::CancelInvocation => "cancel-invocation",
            Self::Ping => "ping",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation of a remote target.
///
/// Without an invocation ID this is fire-and-forget: no completion follows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationMessage {
    /// Message headers.
    pub headers: Headers,

    /// Correlation ID, if a completion is expected.
    pub invocation_id: Option<String>,

    /// Name of the remote method.
    pub target: String,

    /// Positional arguments.
    pub arguments: Vec<Value>,

    /// IDs of client-to-server streams passed as arguments.
    pub stream_ids: Option<Vec<String>>,
}

impl InvocationMessage {
    /// Create a fire-and-forget invocation.
    #[must_use]
    pub fn new(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: None,
            target: target.into(),
            arguments,
            stream_ids: None,
        }
    }

    /// Set the invocation ID.
    #[must_use]
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = Some(invocation_id.into());
        self
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the stream IDs.
    #[must_use]
    pub fn with_stream_ids(mut self, stream_ids: Vec<String>) -> Self {
        self.stream_ids = Some(stream_ids);
        self
    }
}

/// Invocation whose result is delivered as a stream of items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamInvocationMessage {
    /// Message headers.
    pub headers: Headers,

    /// Correlation ID of the stream.
    pub invocation_id: String,

    /// Name of the remote method.
    pub target: String,

    /// Positional arguments.
    pub arguments: Vec<Value>,

    /// IDs of client-to-server streams passed as arguments.
    pub stream_ids: Option<Vec<String>>,
}

impl StreamInvocationMessage {
    /// Create a stream invocation.
    #[must_use]
    pub fn new(
        invocation_id: impl Into<String>,
        target: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            target: target.into(),
            arguments,
            stream_ids: None,
        }
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the stream IDs.
    #[must_use]
    pub fn with_stream_ids(mut self, stream_ids: Vec<String>) -> Self {
        self.stream_ids = Some(stream_ids);
        self
    }
}

/// Single item of a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamItemMessage {
    /// Message headers.
    pub headers: Headers,

    /// ID of the stream this item belongs to.
    pub invocation_id: String,

    /// The item.
    pub item: Value,
}

impl StreamItemMessage {
    /// Create a stream item.
    #[must_use]
    pub fn new(invocation_id: impl Into<String>, item: impl Into<Value>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            item: item.into(),
        }
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// How an invocation finished.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompletionOutcome {
    /// Finished without a result.
    #[default]
    Void,
    /// Finished with a result.
    Result(Value),
    /// Failed with an error message.
    Error(String),
}

/// Final message of an invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionMessage {
    /// Message headers.
    pub headers: Headers,

    /// ID of the invocation being completed.
    pub invocation_id: String,

    /// Result, error, or nothing.
    pub outcome: CompletionOutcome,
}

impl CompletionMessage {
    /// Create a completion from optional parts.
    ///
    /// # Errors
    /// Returns `HubError::InvalidMessage` if both `result` and `error` are set.
    pub fn new(
        invocation_id: impl Into<String>,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<Self, HubError> {
        let outcome = match (result, error) {
            (Some(_), Some(_)) => {
                return Err(HubError::invalid_message(
                    "completion cannot carry both a result and an error",
                ));
            }
            (Some(result), None) => CompletionOutcome::Result(result),
            (None, Some(error)) => CompletionOutcome::Error(error),
            (None, None) => CompletionOutcome::Void,
        };

        Ok(Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            outcome,
        })
    }

    /// Completion without a result.
    #[must_use]
    pub fn void(invocation_id: impl Into<String>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            outcome: CompletionOutcome::Void,
        }
    }

    /// Completion carrying a result.
    #[must_use]
    pub fn with_result(invocation_id: impl Into<String>, result: impl Into<Value>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            outcome: CompletionOutcome::Result(result.into()),
        }
    }

    /// Completion carrying an error.
    #[must_use]
    pub fn with_error(invocation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
            outcome: CompletionOutcome::Error(error.into()),
        }
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// The result, if the invocation produced one.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            CompletionOutcome::Result(value) => Some(value),
            _ => None,
        }
    }

    /// The error message, if the invocation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CompletionOutcome::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Request to stop a streaming invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CancelInvocationMessage {
    /// Message headers.
    pub headers: Headers,

    /// ID of the stream to cancel.
    pub invocation_id: String,
}

impl CancelInvocationMessage {
    /// Create a cancel request.
    #[must_use]
    pub fn new(invocation_id: impl Into<String>) -> Self {
        Self {
            headers: Headers::new(),
            invocation_id: invocation_id.into(),
        }
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// Sent before the sender closes the connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseMessage {
    /// Reason for closing, if it was an error.
    pub error: Option<String>,

    /// Whether the peer may reconnect. `None` leaves the field off the wire.
    pub allow_reconnect: Option<bool>,
}

impl CloseMessage {
    /// Clean close.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close with an error.
    #[must_use]
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            allow_reconnect: None,
        }
    }

    /// Set the reconnect flag.
    #[must_use]
    pub fn allow_reconnect(mut self, allow: bool) -> Self {
        self.allow_reconnect = Some(allow);
        self
    }
}

/// Any hub message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// See [`InvocationMessage`].
    Invocation(InvocationMessage),
    /// See [`StreamInvocationMessage`].
    StreamInvocation(StreamInvocationMessage),
    /// See [`StreamItemMessage`].
    StreamItem(StreamItemMessage),
    /// See [`CompletionMessage`].
    Completion(CompletionMessage),
    /// See [`CancelInvocationMessage`].
    CancelInvocation(CancelInvocationMessage),
    /// Keepalive.
    Ping,
    /// See [`CloseMessage`].
    Close(CloseMessage),
}

impl HubMessage {
    /// The wire discriminant of this message.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Invocation(_) => MessageType::Invocation,
            Self::StreamInvocation(_) => MessageType::StreamInvocation,
            Self::StreamItem(_) => MessageType::StreamItem,
            Self::Completion(_) => MessageType::Completion,
            Self::CancelInvocation(_) => MessageType::CancelInvocation,
            Self::Ping => MessageType::Ping,
            Self::Close(_) => MessageType::Close,
        }
    }

    /// Invocation ID, for the kinds that carry one.
    #[must_use]
    pub fn invocation_id(&self) -> Option<&str> {
        match self {
            Self::Invocation(m) => m.invocation_id.as_deref(),
            Self::StreamInvocation(m) => Some(&m.invocation_id),
            Self::StreamItem(m) => Some(&m.invocation_id),
            Self::Completion(m) => Some(&m.invocation_id),
            Self::CancelInvocation(m) => Some(&m.invocation_id),
            Self::Ping | Self::Close(_) => None,
        }
    }

    /// Headers, for the kinds that carry them on the wire.
    #[must_use]
    pub fn headers(&self) -> Option<&Headers> {
        match self {
            Self::Invocation(m) => Some(&m.headers),
            Self::StreamInvocation(m) => Some(&m.headers),
            Self::StreamItem(m) => Some(&m.headers),
            Self::Completion(m) => Some(&m.headers),
            Self::CancelInvocation(m) => Some(&m.headers),
            Self::Ping | Self::Close(_) => None,
        }
    }

    /// Check if this message belongs to a stream.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            Self::StreamInvocation(_) | Self::StreamItem(_) | Self::CancelInvocation(_)
        )
    }
}

impl From<InvocationMessage> for HubMessage {
    fn from(m: InvocationMessage) -> Self {
        Self::Invocation(m)
    }
}

impl From<StreamInvocationMessage> for HubMessage {
    fn from(m: StreamInvocationMessage) -> Self {
        Self::StreamInvocation(m)
    }
}

impl From<StreamItemMessage> for HubMessage {
    fn from(m: StreamItemMessage) -> Self {
        Self::StreamItem(m)
    }
}

impl From<CompletionMessage> for HubMessage {
    fn from(m: CompletionMessage) -> Self {
        Self::Completion(m)
    }
}

impl From<CancelInvocationMessage> for HubMessage {
    fn from(m: CancelInvocationMessage) -> Self {
        Self::CancelInvocation(m)
    }
}

impl From<CloseMessage> for HubMessage {
    fn from(m: CloseMessage) -> Self {
        Self::Close(m)
    }
}
