//! Hex encoding for configured commands and card responses
//!
//! Commands are written as plain hex pairs with no separators. Case does not
//! matter on input; output is always lowercase.

/// Decode a hex-encoded command into bytes.
///
/// Characters are consumed two at a time and a trailing odd character is
/// dropped. Returns `None` if the string contains anything other than hex
/// digits, or if nothing is left to decode.
pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    let even = hex.len() - hex.len() % 2;
    let pairs = hex.get(..even)?;

    match hex::decode(pairs) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        _ => None,
    }
}

/// Encode bytes as a lowercase hex string
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
