//! Wire codec: a length-prefixed string-array envelope with a delimited
//! metadata section (spec.md §4.1, §6).
//!
//! ```text
//! [ "__METADATA_START" ] [ k1 ] [ v1 ] ... [ kN ] [ vN ] [ "__METADATA_END" ] [ u1 ] ... [ uM ]
//! ```
//!
//! If the first frame is not the start sentinel, the entire sequence is
//! treated as [`super::UserData`] (backward compatibility with legacy
//! producers). An empty frame sequence decodes to the empty [`super::Message`].
//!
//! Frames are carried as `Vec<u8>` on the wire; this module assumes UTF-8
//! but never panics on malformed bytes — malformed metadata keys/values
//! surface as [`CodecError::Decode`].

use thiserror::Error;

use super::Message;

/// Sentinel opening the metadata region of a frame sequence.
pub const METADATA_START: &str = "__METADATA_START";
/// Sentinel closing the metadata region of a frame sequence.
pub const METADATA_END: &str = "__METADATA_END";

/// Codec failure.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A frame could not be encoded (never occurs for well-formed
    /// [`Message`]s today, but kept distinct from [`CodecError::Decode`]
    /// per spec.md §7's `Encode`/`Decode` split).
    #[error("encode failure: {0}")]
    Encode(String),

    /// A frame sequence could not be decoded: the metadata section opened
    /// but never closed, or a frame was not valid UTF-8.
    #[error("decode failure: {0}")]
    Decode(String),
}

/// Encode a [`Message`] into the wire frame sequence.
pub fn encode(message: &Message) -> Result<Vec<Vec<u8>>, CodecError> {
    let mut frames = Vec::with_capacity(2 + message.metadata.len() * 2 + message.user_data.len());
    // The sentinel pair is emitted unconditionally, even for empty metadata:
    // otherwise a UserData payload that happens to contain the literal
    // sentinel string would be misread as the start of a metadata section on
    // decode, breaking `decode(encode(m)) == m`.
    frames.push(METADATA_START.as_bytes().to_vec());
    for (k, v) in &message.metadata {
        frames.push(k.as_bytes().to_vec());
        frames.push(v.as_bytes().to_vec());
    }
    frames.push(METADATA_END.as_bytes().to_vec());
    for u in &message.user_data {
        frames.push(u.as_bytes().to_vec());
    }
    Ok(frames)
}

/// Decode a wire frame sequence into a [`Message`].
pub fn decode(frames: &[Vec<u8>]) -> Result<Message, CodecError> {
    if frames.is_empty() {
        return Ok(Message::new());
    }

    let first = frame_str(&frames[0])?;
    if first != METADATA_START {
        // Legacy producer: the whole sequence is UserData.
        let user_data = frames
            .iter()
            .map(|f| frame_str(f).map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Message {
            metadata: Default::default(),
            user_data,
        });
    }

    let mut message = Message::new();
    let mut idx = 1;
    loop {
        let Some(frame) = frames.get(idx) else {
            return Err(CodecError::Decode(
                "metadata section opened but never closed".into(),
            ));
        };
        let s = frame_str(frame)?;
        if s == METADATA_END {
            idx += 1;
            break;
        }
        let key = s.to_owned();
        idx += 1;
        let value = frame_str(frames.get(idx).ok_or_else(|| {
            CodecError::Decode(format!("metadata key {key:?} has no matching value"))
        })?)?
        .to_owned();
        idx += 1;
        message.metadata.insert(key, value);
    }

    for frame in &frames[idx..] {
        message.user_data.push(frame_str(frame)?.to_owned());
    }

    Ok(message)
}

fn frame_str(frame: &[u8]) -> Result<&str, CodecError> {
    std::str::from_utf8(frame).map_err(|e| CodecError::Decode(format!("invalid utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(strs: &[&str]) -> Vec<Vec<u8>> {
        strs.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn empty_frames_decode_to_empty_message() {
        let m = decode(&[]).unwrap();
        assert_eq!(m, Message::new());
    }

    #[test]
    fn legacy_decode_without_sentinel() {
        let m = decode(&frames(&["hello", "world"])).unwrap();
        assert!(m.metadata.is_empty());
        assert_eq!(m.user_data, vec!["hello", "world"]);
    }

    #[test]
    fn roundtrip_preserves_metadata_and_user_data() {
        let mut original = Message::new();
        original.set("from", "client");
        original.set("subject", "discovery");
        original.user_data = vec!["arg1".into(), "arg2".into()];

        let encoded = encode(&original).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn roundtrip_empty_message() {
        let original = Message::new();
        let encoded = encode(&original).unwrap();
        assert_eq!(encoded, frames(&[METADATA_START, METADATA_END]));
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn roundtrip_user_data_containing_the_sentinel_literal() {
        // Regression: with no metadata, UserData containing the literal
        // sentinel string must not be misread as a real metadata section.
        let mut original = Message::new();
        original.user_data = vec![METADATA_START.to_string()];

        let encoded = encode(&original).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn unterminated_metadata_section_fails_to_decode() {
        let frames = frames(&[METADATA_START, "k", "v"]);
        let err = decode(&frames).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn dangling_metadata_key_fails_to_decode() {
        let frames = frames(&[METADATA_START, "k"]);
        let err = decode(&frames).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
