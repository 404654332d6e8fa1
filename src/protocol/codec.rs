use serde::Deserialize;
use thiserror::Error;

use super::messages::ServerMessage;

/// Inbound frames larger than this are rejected before parsing.
pub const MAX_FRAME_BYTES: usize = 4 * 1024;

/// Separator used when several outbound frames are coalesced into one
/// text frame. Receivers must tolerate newline-separated JSON objects.
pub const FRAME_SEPARATOR: char = '\n';

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame exceeds {MAX_FRAME_BYTES} bytes ({0} bytes)")]
    FrameTooLarge(usize),
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parsed wire envelope. The payload stays opaque until the handler
/// registered for `msg_type` decodes it.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Parse an inbound text frame into its envelope.
pub fn parse(frame: &str) -> Result<Envelope, CodecError> {
    if frame.len() > MAX_FRAME_BYTES {
        return Err(CodecError::FrameTooLarge(frame.len()));
    }
    Ok(serde_json::from_str(frame)?)
}

/// Encode an outbound message as a single JSON text frame.
pub fn encode(message: &ServerMessage) -> String {
    // ServerMessage contains only JSON-representable fields; serialization
    // cannot fail for any constructible value.
    serde_json::to_string(message).unwrap_or_default()
}

/// Join already-encoded frames into one LF-separated batch frame.
pub fn join_frames(frames: &[String]) -> String {
    frames.join(&FRAME_SEPARATOR.to_string())
}
