//! MessagePack hub protocol.
//!
//! Each message is a MessagePack array whose first element is the message
//! type, wrapped in a varint length-prefixed frame:
//!
//! ```text
//! Invocation        [1, headers, invocationId | nil, target, [args], [streamIds]?]
//! StreamItem        [2, headers, invocationId, item]
//! Completion        [3, headers, invocationId, resultKind, error | result]
//! StreamInvocation  [4, headers, invocationId, target, [args], [streamIds]?]
//! CancelInvocation  [5, headers, invocationId]
//! Ping              [6]
//! Close             [7, error | nil, allowReconnect?]
//! ```

use hubwire_core::{
    CancelInvocationMessage, CloseMessage, CodecError, CompletionMessage, CompletionOutcome,
    Headers, HubMessage, HubProtocol, InvocationBinder, InvocationMessage, MessageType,
    ProtocolConfig, StreamInvocationMessage, StreamItemMessage, TransferFormat, Value,
};
use ntex_bytes::{Buf, BytesMut};

use crate::coerce;
use crate::frame::FrameCodec;
use crate::primitive::{MessagePackReader, MessagePackWriter};

/// Name announced during protocol negotiation.
pub const PROTOCOL_NAME: &str = "messagepack";

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

const RESULT_KIND_ERROR: i64 = 1;
const RESULT_KIND_VOID: i64 = 2;
const RESULT_KIND_NON_VOID: i64 = 3;

/// Binary hub protocol over MessagePack.
///
/// Stateless: one instance can be shared by any number of connections.
///
/// ## Example
///
/// ```rust
/// use hubwire_codec::MessagePackHubProtocol;
/// use hubwire_core::{HubMessage, HubProtocol, StreamItemMessage, UntypedBinder, Value};
/// use ntex_bytes::BytesMut;
///
/// let protocol = MessagePackHubProtocol::new();
/// let mut buf = BytesMut::new();
///
/// let item = StreamItemMessage::new("test", 69).with_headers([("key".to_string(), "value".to_string())].into());
/// protocol.write_message(&item.into(), &mut buf).unwrap();
///
/// let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
/// let HubMessage::StreamItem(item) = &messages[0] else { panic!("expected a stream item") };
/// assert_eq!(item.item, Value::Int(69));
/// assert!(buf.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MessagePackHubProtocol {
    frames: FrameCodec,
    max_nesting_depth: usize,
}

impl MessagePackHubProtocol {
    /// Create a protocol with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    /// Create a protocol with custom limits.
    #[must_use]
    pub fn with_config(config: ProtocolConfig) -> Self {
        Self {
            frames: FrameCodec::with_max_frame_size(config.max_frame_size),
            max_nesting_depth: config.max_nesting_depth,
        }
    }

    /// Maximum payload size of a frame.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.frames.max_frame_size()
    }

    /// Serialize `message` to its array payload, without the length prefix.
    pub fn encode_payload(&self, message: &HubMessage) -> Result<Vec<u8>, CodecError> {
        let mut w = MessagePackWriter::with_capacity(64);

        let arity = match message {
            HubMessage::Invocation(m) => 5 + usize::from(m.stream_ids.is_some()),
            HubMessage::StreamInvocation(m) => 5 + usize::from(m.stream_ids.is_some()),
            HubMessage::StreamItem(_) => 4,
            HubMessage::Completion(m) => match m.outcome {
                CompletionOutcome::Void => 4,
                _ => 5,
            },
            HubMessage::CancelInvocation(_) => 3,
            HubMessage::Ping => 1,
            HubMessage::Close(m) => 2 + usize::from(m.allow_reconnect.is_some()),
        };
        w.write_array_header(arity)?;
        w.write_int(i64::from(message.message_type().as_u8()))?;

        match message {
            HubMessage::Invocation(m) => {
                write_headers(&mut w, &m.headers)?;
                w.write_str_or_nil(m.invocation_id.as_deref())?;
                w.write_str(&m.target)?;
                write_arguments(&mut w, &m.arguments)?;
                if let Some(ids) = &m.stream_ids {
                    write_stream_ids(&mut w, ids)?;
                }
            }
            HubMessage::StreamInvocation(m) => {
                write_headers(&mut w, &m.headers)?;
                w.write_str(&m.invocation_id)?;
                w.write_str(&m.target)?;
                write_arguments(&mut w, &m.arguments)?;
                if let Some(ids) = &m.stream_ids {
                    write_stream_ids(&mut w, ids)?;
                }
            }
            HubMessage::StreamItem(m) => {
                write_headers(&mut w, &m.headers)?;
                w.write_str(&m.invocation_id)?;
                w.write_value(&m.item)?;
            }
            HubMessage::Completion(m) => {
                write_headers(&mut w, &m.headers)?;
                w.write_str(&m.invocation_id)?;
                match &m.outcome {
                    CompletionOutcome::Error(error) => {
                        w.write_int(RESULT_KIND_ERROR)?;
                        w.write_str(error)?;
                    }
                    CompletionOutcome::Void => w.write_int(RESULT_KIND_VOID)?,
                    CompletionOutcome::Result(result) => {
                        w.write_int(RESULT_KIND_NON_VOID)?;
                        w.write_value(result)?;
                    }
                }
            }
            HubMessage::CancelInvocation(m) => {
                write_headers(&mut w, &m.headers)?;
                w.write_str(&m.invocation_id)?;
            }
            HubMessage::Ping => {}
            HubMessage::Close(m) => {
                w.write_str_or_nil(m.error.as_deref())?;
                if let Some(allow) = m.allow_reconnect {
                    w.write_bool(allow)?;
                }
            }
        }

        Ok(w.into_inner())
    }

    /// Decode the first frame in `src`.
    ///
    /// Returns the message (or `None` if its type is unknown and the frame was
    /// skipped) and the number of bytes the frame occupied.
    ///
    /// # Errors
    /// `CodecError::IncompleteFrame` if `src` does not hold a whole frame yet.
    /// Any other error is fatal for the connection.
    pub fn parse_frame(
        &self,
        src: &[u8],
        binder: &dyn InvocationBinder,
    ) -> Result<(Option<HubMessage>, usize), CodecError> {
        let payload = self.frames.frame_bounds(src)?;
        let consumed = payload.end;

        let mut reader = MessagePackReader::with_max_depth(&src[payload], self.max_nesting_depth);
        let message = self
            .read_message(&mut reader, binder)
            .map_err(CodecError::within_frame)?;

        if message.is_some() && reader.remaining() > 0 {
            tracing::trace!(
                trailing = reader.remaining(),
                "ignoring bytes after message array"
            );
        }

        Ok((message, consumed))
    }

    /// Decode every complete frame in `src`, in order.
    ///
    /// Returns the messages and the number of bytes they occupied. A trailing
    /// partial frame is left for the next call.
    pub fn parse_slice(
        &self,
        src: &[u8],
        binder: &dyn InvocationBinder,
    ) -> Result<(Vec<HubMessage>, usize), CodecError> {
        let mut messages = Vec::new();
        let mut offset = 0;

        while offset < src.len() {
            match self.parse_frame(&src[offset..], binder) {
                Ok((message, consumed)) => {
                    offset += consumed;
                    messages.extend(message);
                }
                Err(CodecError::IncompleteFrame { needed }) => {
                    tracing::trace!(
                        needed,
                        buffered = src.len() - offset,
                        "waiting for the rest of a frame"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((messages, offset))
    }

    fn read_message(
        &self,
        reader: &mut MessagePackReader<'_>,
        binder: &dyn InvocationBinder,
    ) -> Result<Option<HubMessage>, CodecError> {
        let len = reader.read_array_header()?;
        if len == 0 {
            return Err(CodecError::violation("message array is empty"));
        }

        let message_type = match read_message_type(reader) {
            Ok(message_type) => message_type,
            Err(CodecError::UnknownMessageType(kind)) => {
                tracing::debug!(message_type = kind, "skipping message of unknown type");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let min = min_arity(message_type);
        if len < min {
            return Err(CodecError::violation(format!(
                "{message_type} message has {len} fields, expected at least {min}"
            )));
        }

        let (message, read) = match message_type {
            MessageType::Invocation => {
                let headers = read_headers(reader)?;
                let invocation_id = reader.read_str_or_nil()?;
                let target = reader.read_str()?;
                let arguments = read_arguments(reader, &target, binder)?;
                let stream_ids = read_stream_ids(reader, len)?;
                let read = 5 + usize::from(len > 5);

                let message = InvocationMessage {
                    headers,
                    invocation_id,
                    target,
                    arguments,
                    stream_ids,
                };
                (HubMessage::Invocation(message), read)
            }
            MessageType::StreamInvocation => {
                let headers = read_headers(reader)?;
                let invocation_id = reader.read_str()?;
                let target = reader.read_str()?;
                let arguments = read_arguments(reader, &target, binder)?;
                let stream_ids = read_stream_ids(reader, len)?;
                let read = 5 + usize::from(len > 5);

                let message = StreamInvocationMessage {
                    headers,
                    invocation_id,
                    target,
                    arguments,
                    stream_ids,
                };
                (HubMessage::StreamInvocation(message), read)
            }
            MessageType::StreamItem => {
                let headers = read_headers(reader)?;
                let invocation_id = reader.read_str()?;
                let item = reader.read_value()?;
                let item = match binder.stream_item_type(&invocation_id) {
                    Some(hint) => coerce::coerce(item, &hint),
                    None => item,
                };

                let message = StreamItemMessage {
                    headers,
                    invocation_id,
                    item,
                };
                (HubMessage::StreamItem(message), 4)
            }
            MessageType::Completion => {
                let message = read_completion(reader, len, binder)?;
                (HubMessage::Completion(message), len)
            }
            MessageType::CancelInvocation => {
                let headers = read_headers(reader)?;
                let invocation_id = reader.read_str()?;
                let message = CancelInvocationMessage {
                    headers,
                    invocation_id,
                };
                (HubMessage::CancelInvocation(message), 3)
            }
            MessageType::Ping => (HubMessage::Ping, 1),
            MessageType::Close => {
                let error = reader.read_str_or_nil()?;
                // A present flag must be a bool; nil is not read as absent
                let allow_reconnect = if len > 2 {
                    Some(reader.read_bool()?)
                } else {
                    None
                };
                let message = CloseMessage {
                    error,
                    allow_reconnect,
                };
                (HubMessage::Close(message), 2 + usize::from(len > 2))
            }
        };

        // Fields appended by newer peers
        for _ in read..len {
            reader.skip_value()?;
        }

        Ok(Some(message))
    }
}

impl Default for MessagePackHubProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl HubProtocol for MessagePackHubProtocol {
    fn name(&self) -> &str {
        PROTOCOL_NAME
    }

    fn version(&self) -> u32 {
        PROTOCOL_VERSION
    }

    fn transfer_format(&self) -> TransferFormat {
        TransferFormat::Binary
    }

    fn write_message(&self, message: &HubMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = self.encode_payload(message)?;
        self.frames.encode_slice(&payload, dst)
    }

    fn parse_messages(
        &self,
        src: &mut BytesMut,
        binder: &dyn InvocationBinder,
    ) -> Result<Vec<HubMessage>, CodecError> {
        let (messages, consumed) = self.parse_slice(src, binder)?;
        src.advance(consumed);
        Ok(messages)
    }
}

/// Read the discriminant of a message.
///
/// # Errors
/// `CodecError::UnknownMessageType` for discriminants this version does not
/// know; the caller decides whether to skip the frame.
pub fn read_message_type(reader: &mut MessagePackReader<'_>) -> Result<MessageType, CodecError> {
    let kind = reader.read_int()?;
    MessageType::from_i64(kind).ok_or(CodecError::UnknownMessageType(kind))
}

fn min_arity(message_type: MessageType) -> usize {
    match message_type {
        MessageType::Invocation | MessageType::StreamInvocation => 5,
        MessageType::StreamItem | MessageType::Completion => 4,
        MessageType::CancelInvocation => 3,
        MessageType::Close => 2,
        MessageType::Ping => 1,
    }
}

fn write_headers(w: &mut MessagePackWriter, headers: &Headers) -> Result<(), CodecError> {
    w.write_map_header(headers.len())?;
    for (key, value) in headers {
        w.write_str(key)?;
        w.write_str(value)?;
    }
    Ok(())
}

fn write_arguments(w: &mut MessagePackWriter, arguments: &[Value]) -> Result<(), CodecError> {
    w.write_array_header(arguments.len())?;
    for argument in arguments {
        w.write_value(argument)?;
    }
    Ok(())
}

fn write_stream_ids(w: &mut MessagePackWriter, ids: &[String]) -> Result<(), CodecError> {
    w.write_array_header(ids.len())?;
    for id in ids {
        w.write_str(id)?;
    }
    Ok(())
}

// Headers are always a map; nil in their slot is malformed.
fn read_headers(reader: &mut MessagePackReader<'_>) -> Result<Headers, CodecError> {
    let count = reader.read_map_header()?;
    let mut headers = Headers::with_capacity(count.min(reader.remaining() / 2));
    for _ in 0..count {
        let key = reader.read_str()?;
        let value = reader.read_str()?;
        headers.insert(key, value);
    }
    Ok(headers)
}

fn read_arguments(
    reader: &mut MessagePackReader<'_>,
    target: &str,
    binder: &dyn InvocationBinder,
) -> Result<Vec<Value>, CodecError> {
    let count = reader.read_array_header()?;
    let mut arguments = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        arguments.push(reader.read_value()?);
    }

    let types = binder.parameter_types(target);
    Ok(coerce::bind_arguments(target, arguments, &types))
}

fn read_stream_ids(
    reader: &mut MessagePackReader<'_>,
    len: usize,
) -> Result<Option<Vec<String>>, CodecError> {
    if len < 6 {
        return Ok(None);
    }
    if reader.peek_nil()? {
        reader.read_nil()?;
        return Ok(None);
    }

    let count = reader.read_array_header()?;
    let mut ids = Vec::with_capacity(count.min(reader.remaining()));
    for _ in 0..count {
        ids.push(reader.read_str()?);
    }
    Ok(Some(ids))
}

fn read_completion(
    reader: &mut MessagePackReader<'_>,
    len: usize,
    binder: &dyn InvocationBinder,
) -> Result<CompletionMessage, CodecError> {
    let headers = read_headers(reader)?;
    let invocation_id = reader.read_str()?;
    let result_kind = reader.read_int()?;

    let expected = match result_kind {
        RESULT_KIND_VOID => 4,
        RESULT_KIND_ERROR | RESULT_KIND_NON_VOID => 5,
        other => {
            return Err(CodecError::violation(format!(
                "unknown completion result kind {other}"
            )));
        }
    };
    if len < expected {
        return Err(CodecError::violation(format!(
            "completion with result kind {result_kind} has {len} fields, expected {expected}"
        )));
    }
    // The result kind fixes the arity: an error completion cannot also carry
    // a result, and a void one carries nothing.
    if len > expected {
        return Err(CodecError::malformed(format!(
            "completion with result kind {result_kind} carries {} extra fields",
            len - expected
        )));
    }

    let outcome = match result_kind {
        RESULT_KIND_ERROR => CompletionOutcome::Error(reader.read_str()?),
        RESULT_KIND_VOID => CompletionOutcome::Void,
        _ => {
            let result = reader.read_value()?;
            let result = match binder.return_type(&invocation_id) {
                Some(hint) => coerce::coerce(result, &hint),
                None => result,
            };
            CompletionOutcome::Result(result)
        }
    };

    Ok(CompletionMessage {
        headers,
        invocation_id,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use hubwire_core::{MethodTable, TypeHint, UntypedBinder};

    use super::*;

    fn encode(protocol: &MessagePackHubProtocol, message: &HubMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        protocol.write_message(message, &mut buf).unwrap();
        buf
    }

    fn roundtrip(message: HubMessage, binder: &dyn InvocationBinder) -> HubMessage {
        let protocol = MessagePackHubProtocol::new();
        let mut buf = encode(&protocol, &message);
        let mut messages = protocol.parse_messages(&mut buf, binder).unwrap();
        assert!(buf.is_empty());
        assert_eq!(messages.len(), 1);
        messages.remove(0)
    }

    fn frame(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec::new().encode_slice(payload, &mut buf).unwrap();
        buf
    }

    fn test_binder() -> MethodTable {
        let binder = MethodTable::new();
        binder.register_target(
            "test",
            vec![
                TypeHint::Int,
                TypeHint::map(TypeHint::String, TypeHint::list(TypeHint::String)),
            ],
        );
        binder
    }

    #[test]
    fn test_protocol_identity() {
        let protocol = MessagePackHubProtocol::new();
        assert_eq!(protocol.name(), "messagepack");
        assert_eq!(protocol.version(), 1);
        assert_eq!(protocol.transfer_format(), TransferFormat::Binary);
    }

    #[test]
    fn test_invocation_wire_bytes() {
        let protocol = MessagePackHubProtocol::new();
        let ding = Value::map([("ding", Value::Array(vec![Value::from("abc")]))]);
        let message: HubMessage =
            InvocationMessage::new("test", vec![Value::Int(42), ding]).with_invocation_id("1").into();

        let buf = encode(&protocol, &message);
        let expected: &[u8] = &[
            0x17, // frame length
            0x95, 0x01, 0x80, // [1, {},
            0xa1, b'1', // "1",
            0xa4, b't', b'e', b's', b't', // "test",
            0x92, 0x2a, // [42,
            0x81, 0xa4, b'd', b'i', b'n', b'g', // {"ding":
            0x91, 0xa3, b'a', b'b', b'c', // ["abc"]}]]
        ];
        assert_eq!(&buf[..], expected);
    }

    #[test]
    fn test_invocation_with_binder() {
        let ding = Value::map([("ding", Value::Array(vec![Value::from("abc")]))]);
        let message: HubMessage = InvocationMessage::new("test", vec![Value::Int(42), ding.clone()])
            .with_invocation_id("1")
            .into();

        let decoded = roundtrip(message.clone(), &test_binder());
        let HubMessage::Invocation(invocation) = &decoded else {
            panic!("expected an invocation, got {decoded:?}");
        };
        assert_eq!(invocation.invocation_id.as_deref(), Some("1"));
        assert_eq!(invocation.target, "test");
        assert_eq!(invocation.arguments[0], Value::Int(42));
        assert_eq!(invocation.arguments[1], ding);
        assert!(invocation.headers.is_empty());
        assert!(invocation.stream_ids.is_none());
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_stream_item_wire_bytes() {
        let protocol = MessagePackHubProtocol::new();
        let message: HubMessage = StreamItemMessage::new("test", 69)
            .with_headers(Headers::from([("key".to_string(), "value".to_string())]))
            .into();

        let buf = encode(&protocol, &message);
        let expected: &[u8] = &[
            0x13, // frame length
            0x94, 0x02, // [2,
            0x81, 0xa3, b'k', b'e', b'y', 0xa5, b'v', b'a', b'l', b'u', b'e', // {"key": "value"},
            0xa4, b't', b'e', b's', b't', // "test",
            0x45, // 69]
        ];
        assert_eq!(&buf[..], expected);

        let decoded = roundtrip(message, &UntypedBinder);
        let HubMessage::StreamItem(item) = decoded else {
            panic!("expected a stream item");
        };
        assert_eq!(item.invocation_id, "test");
        assert_eq!(item.item, Value::Int(69));
        assert_eq!(item.headers.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn test_roundtrip_every_variant() {
        let messages: Vec<HubMessage> = vec![
            InvocationMessage::new("fire", vec![Value::Bool(true)]).into(),
            InvocationMessage::new("upload", vec![])
                .with_invocation_id("2")
                .with_header("trace", "abc")
                .with_stream_ids(vec!["s1".into(), "s2".into()])
                .into(),
            StreamInvocationMessage::new("3", "counter", vec![Value::Int(10), Value::Float(0.5)])
                .into(),
            StreamInvocationMessage::new("4", "upload", vec![])
                .with_stream_ids(vec![])
                .into(),
            StreamItemMessage::new("3", Value::Bytes(vec![1, 2, 3])).into(),
            CompletionMessage::void("5").into(),
            CompletionMessage::with_result("6", Value::map([("ok", true)])).into(),
            CompletionMessage::with_error("7", "boom").into(),
            CompletionMessage::with_result("8", Value::Nil).into(),
            CancelInvocationMessage::new("3").into(),
            HubMessage::Ping,
            CloseMessage::new().into(),
            CloseMessage::with_error("shutting down").allow_reconnect(true).into(),
        ];

        for message in messages {
            let decoded = roundtrip(message.clone(), &UntypedBinder);
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_batch_preserves_order() {
        let protocol = MessagePackHubProtocol::new();
        let first: HubMessage = InvocationMessage::new("a", vec![Value::Int(1)]).into();
        let second: HubMessage = CompletionMessage::with_result("x", "done").into();

        let mut buf = BytesMut::new();
        protocol.write_message(&first, &mut buf).unwrap();
        protocol.write_message(&second, &mut buf).unwrap();

        let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
        assert_eq!(messages, vec![first, second]);
    }

    #[test]
    fn test_partial_buffer_is_incomplete() {
        let protocol = MessagePackHubProtocol::new();
        let message: HubMessage = InvocationMessage::new("test", vec![Value::Int(42)])
            .with_invocation_id("1")
            .into();
        let full = encode(&protocol, &message);

        for k in 1..full.len() {
            let partial = &full[..k];
            assert!(matches!(
                protocol.parse_frame(partial, &UntypedBinder),
                Err(CodecError::IncompleteFrame { .. })
            ));

            let mut buf = BytesMut::new();
            buf.extend_from_slice(partial);
            let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
            assert!(messages.is_empty());
            assert_eq!(buf.len(), k);
        }
    }

    #[test]
    fn test_partial_tail_stays_buffered() {
        let protocol = MessagePackHubProtocol::new();
        let mut buf = encode(&protocol, &HubMessage::Ping);
        let second = encode(&protocol, &CancelInvocationMessage::new("1").into());
        buf.extend_from_slice(&second[..2]);

        let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
        assert_eq!(messages, vec![HubMessage::Ping]);
        assert_eq!(&buf[..], &second[..2]);

        buf.extend_from_slice(&second[2..]);
        let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
        assert_eq!(messages, vec![CancelInvocationMessage::new("1").into()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unknown_message_type_is_skipped() {
        let protocol = MessagePackHubProtocol::new();
        // [99, {}]
        let mut buf = frame(&[0x92, 0x63, 0x80]);
        protocol.write_message(&HubMessage::Ping, &mut buf).unwrap();

        let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
        assert_eq!(messages, vec![HubMessage::Ping]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unknown_target_falls_back_to_raw_values() {
        let arguments = vec![
            Value::Int(7),
            Value::map([("k", Value::Array(vec![Value::Int(1)]))]),
        ];
        let message: HubMessage = InvocationMessage::new("unknown", arguments.clone()).into();

        let decoded = roundtrip(message, &test_binder());
        let HubMessage::Invocation(invocation) = decoded else {
            panic!("expected an invocation");
        };
        assert_eq!(invocation.arguments, arguments);
    }

    #[test]
    fn test_binder_coerces_arguments() {
        let binder = MethodTable::new();
        binder.register_target("scale", vec![TypeHint::Float]);

        let message: HubMessage =
            InvocationMessage::new("scale", vec![Value::Int(2), Value::from("extra")]).into();
        let HubMessage::Invocation(invocation) = roundtrip(message, &binder) else {
            panic!("expected an invocation");
        };
        assert_eq!(
            invocation.arguments,
            vec![Value::Float(2.0), Value::from("extra")]
        );
    }

    #[test]
    fn test_completion_uses_return_type() {
        let binder = MethodTable::new();
        binder.register_invocation("9", TypeHint::Float);

        let message: HubMessage = CompletionMessage::with_result("9", 3).into();
        let HubMessage::Completion(completion) = roundtrip(message, &binder) else {
            panic!("expected a completion");
        };
        assert_eq!(completion.result(), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_stream_item_uses_item_type() {
        let binder = MethodTable::new();
        binder.register_stream("s", TypeHint::list(TypeHint::Float));

        let item = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let message: HubMessage = StreamItemMessage::new("s", item).into();
        let HubMessage::StreamItem(item) = roundtrip(message, &binder) else {
            panic!("expected a stream item");
        };
        assert_eq!(
            item.item,
            Value::Array(vec![Value::Float(1.0), Value::Float(2.0)])
        );
    }

    #[test]
    fn test_completion_with_error_and_result_is_rejected() {
        let protocol = MessagePackHubProtocol::new();
        // [3, {}, "1", 1, "boom", 42]
        let mut buf = frame(&[0x96, 0x03, 0x80, 0xa1, b'1', 0x01, 0xa4, b'b', b'o', b'o', b'm', 0x2a]);

        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));
        // Nothing consumed on a fatal error
        assert_eq!(buf.len(), 13);
    }

    #[test]
    fn test_completion_arity() {
        let protocol = MessagePackHubProtocol::new();

        // [3, {}, "1", 3] - non-void completion without its result
        let mut buf = frame(&[0x94, 0x03, 0x80, 0xa1, b'1', 0x03]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::ProtocolViolation(_))));

        // [3, {}, "1", 9] - unknown result kind
        let mut buf = frame(&[0x94, 0x03, 0x80, 0xa1, b'1', 0x09]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::ProtocolViolation(_))));
    }

    #[test]
    fn test_trailing_fields_are_skipped() {
        let protocol = MessagePackHubProtocol::new();
        // [5, {}, "1", "future", [1]]
        let mut buf = frame(&[
            0x95, 0x05, 0x80, 0xa1, b'1', 0xa6, b'f', b'u', b't', b'u', b'r', b'e', 0x91, 0x01,
        ]);
        let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
        assert_eq!(messages, vec![CancelInvocationMessage::new("1").into()]);
    }

    #[test]
    fn test_wide_encodings_decode() {
        // [1, {"k": "v"}, "1", "t", [7]] with array16, map16 and str16 headers
        let payload = [
            0xdc, 0x00, 0x05, 0x01, // array16 of 5, type 1
            0xde, 0x00, 0x01, 0xda, 0x00, 0x01, b'k', 0xd9, 0x01, b'v', // map16 {"k": "v"}
            0xda, 0x00, 0x01, b'1', // "1"
            0xdb, 0x00, 0x00, 0x00, 0x01, b't', // str32 "t"
            0xdc, 0x00, 0x01, 0xd0, 0x07, // array16 [int8 7]
        ];
        let protocol = MessagePackHubProtocol::new();
        let mut buf = frame(&payload);

        let messages = protocol.parse_messages(&mut buf, &test_binder()).unwrap();
        let expected: HubMessage = InvocationMessage::new("t", vec![Value::Int(7)])
            .with_invocation_id("1")
            .with_header("k", "v")
            .into();
        assert_eq!(messages, vec![expected]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_nil_headers_and_reconnect_flag_are_malformed() {
        let protocol = MessagePackHubProtocol::new();

        // [1, nil, nil, "t", []]
        let mut buf = frame(&[0x95, 0x01, 0xc0, 0xc0, 0xa1, b't', 0x90]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));

        // [7, nil, nil]
        let mut buf = frame(&[0x93, 0x07, 0xc0, 0xc0]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));
    }

    #[test]
    fn test_nil_stream_ids() {
        let protocol = MessagePackHubProtocol::new();
        // [1, {}, nil, "t", [], nil]
        let mut buf = frame(&[0x96, 0x01, 0x80, 0xc0, 0xa1, b't', 0x90, 0xc0]);
        let messages = protocol.parse_messages(&mut buf, &UntypedBinder).unwrap();
        assert_eq!(messages, vec![InvocationMessage::new("t", vec![]).into()]);
    }

    #[test]
    fn test_short_message_is_a_violation() {
        let protocol = MessagePackHubProtocol::new();
        // [2, {}, "1"] - stream item without its item
        let mut buf = frame(&[0x93, 0x02, 0x80, 0xa1, b'1']);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::ProtocolViolation(_))));

        // []
        let mut buf = frame(&[0x90]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::ProtocolViolation(_))));
    }

    #[test]
    fn test_frame_shorter_than_its_contents_is_malformed() {
        let protocol = MessagePackHubProtocol::new();
        // [6] declared as an array of two inside a two byte frame
        let mut buf = frame(&[0x92, 0x06]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));

        let mut buf = frame(&[0xc1]);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));
    }

    #[test]
    fn test_headers_must_be_strings() {
        let protocol = MessagePackHubProtocol::new();
        // [5, {"k": 1}, "1"]
        let mut buf = frame(&[0x93, 0x05, 0x81, 0xa1, b'k', 0x01, 0xa1, b'1']);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let protocol = MessagePackHubProtocol::with_config(ProtocolConfig::new().max_frame_size(8));
        let message: HubMessage = InvocationMessage::new("a-long-target-name", vec![]).into();

        let mut buf = BytesMut::new();
        let result = protocol.write_message(&message, &mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
        assert!(buf.is_empty());

        let mut buf = encode(&MessagePackHubProtocol::new(), &message);
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = Value::Int(0);
        for _ in 0..10 {
            value = Value::Array(vec![value]);
        }
        let message: HubMessage = StreamItemMessage::new("s", value).into();
        let mut buf = encode(&MessagePackHubProtocol::new(), &message);

        let protocol =
            MessagePackHubProtocol::with_config(ProtocolConfig::new().max_nesting_depth(4));
        let result = protocol.parse_messages(&mut buf, &UntypedBinder);
        assert!(matches!(result, Err(CodecError::MalformedValue(_))));
    }
}
