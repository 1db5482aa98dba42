//! Turning relay messages into frames and back.
//!
//! The relay and [`RemoteStore`](https://docs.rs/vrlink-store) only see a
//! [`Codec`]; which format is on the wire is decided in one place.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Frame format shared by both ends of a relay connection.
///
/// Shared by every connection task of the relay, hence `Send + Sync +
/// 'static`. Decoded values own their data, so the frame buffer can be
/// dropped as soon as `decode` returns.
pub trait Codec: Send + Sync + 'static {
    /// Encodes one message into a frame.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes one frame.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] for malformed input, unknown `type` tags
    /// and documents that fail validation (a bad pin, for instance).
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON frames, the format browser clients of the relay speak.
///
/// ```rust
/// use vrlink_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let frame = JsonCodec
///     .encode(&ClientMessage::Get { id: 1, path: "sessions/abc".into() })
///     .unwrap();
/// assert_eq!(frame, br#"{"type":"Get","id":1,"path":"sessions/abc"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientMessage, ServerMessage};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<ClientMessage, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_type_tag_fails() {
        let result: Result<ServerMessage, _> =
            JsonCodec.decode(br#"{"type":"Teleport","id":1}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_invalid_pin_inside_document() {
        let raw = br#"{"type":"Set","id":1,"path":"sessions/x","doc":{
            "pin":"99","token":"x","app":"PENDING","player":"PENDING",
            "command":"NONE","state":"INITIAL"}}"#;
        let result: Result<ClientMessage, _> = JsonCodec.decode(raw);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
