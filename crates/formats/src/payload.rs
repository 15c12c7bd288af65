use crate::primitive::Primitive;
use crate::wire::{self, WireError};
use base64::Engine as _;

/// Decodes the base64 text returned by `getWebGLData`.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, WireError> {
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| WireError::Base64(e.to_string()))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Base64 transport payload straight to a decoded primitive.
pub fn decode_payload(payload: &str) -> Result<Primitive, WireError> {
    let bytes = decode_base64(payload)?;
    wire::decode(&bytes)
}
