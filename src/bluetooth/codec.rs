// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Text payload <-> wire byte conversion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire encoding for text payloads. Both ends must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    /// Two hex digits per byte on the text side.
    #[default]
    Hex,
    /// One byte per character, truncated to the low byte.
    Raw,
}

/// Encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("hex payload has odd length {0}")]
    OddLength(usize),
    #[error("invalid hex digit {ch:?} at index {index}")]
    InvalidDigit { ch: char, index: usize },
}

impl From<hex::FromHexError> for CodecError {
    fn from(err: hex::FromHexError) -> Self {
        match err {
            hex::FromHexError::InvalidHexCharacter { c, index } => {
                CodecError::InvalidDigit { ch: c, index }
            }
            // Only odd length remains for Vec<u8> targets.
            _ => CodecError::OddLength(0),
        }
    }
}

/// Converts text payloads to wire bytes and back.
///
/// In [`CodecMode::Hex`] the text side is upper-case hex, `"AB"` travels as the
/// single byte `0xAB` and comes back as `"AB"`. Lower-case digits are
/// rejected so that every accepted payload decodes back to itself. In [`CodecMode::Raw`] every
/// character becomes its low byte and every byte comes back as the character
/// with that code point, so only text below U+0100 survives the round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Codec {
    mode: CodecMode,
}

impl Codec {
    pub fn new(mode: CodecMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    /// Encode a text payload for the wire.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, CodecError> {
        match self.mode {
            CodecMode::Hex => {
                if text.len() % 2 != 0 {
                    return Err(CodecError::OddLength(text.len()));
                }
                let lower = text.char_indices().find(|(_, c)| c.is_ascii_lowercase());
                if let Some((index, ch)) = lower {
                    return Err(CodecError::InvalidDigit { ch, index });
                }
                Ok(hex::decode(text)?)
            }
            CodecMode::Raw => Ok(text.chars().map(|c| c as u32 as u8).collect()),
        }
    }

    /// Decode wire bytes into a text payload. Never fails.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self.mode {
            CodecMode::Hex => hex::encode_upper(bytes),
            CodecMode::Raw => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode() {
        let codec = Codec::new(CodecMode::Hex);
        assert_eq!(codec.encode("AB").unwrap(), vec![0xAB]);
        assert_eq!(codec.encode("00FF10").unwrap(), vec![0x00, 0xFF, 0x10]);
        assert_eq!(codec.encode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_decode_is_upper_case() {
        let codec = Codec::new(CodecMode::Hex);
        assert_eq!(codec.decode(&[0xAB, 0x0D]), "AB0D");
    }

    #[test]
    fn test_hex_roundtrip() {
        let codec = Codec::new(CodecMode::Hex);
        for text in ["", "00", "DEADBEEF", "0123456789ABCDEF"] {
            assert_eq!(codec.decode(&codec.encode(text).unwrap()), text);
        }
    }

    #[test]
    fn test_hex_roundtrip_every_byte_pair() {
        let codec = Codec::new(CodecMode::Hex);
        for hi in 0..=255u8 {
            let mut text = String::new();
            for lo in (0..=255u8).step_by(17) {
                let pair = format!("{:02X}{:02X}", hi, lo);
                assert_eq!(codec.decode(&codec.encode(&pair).unwrap()), pair);
                text.push_str(&pair);
            }
            assert_eq!(codec.decode(&codec.encode(&text).unwrap()), text);
        }
    }

    #[test]
    fn test_hex_rejects_lower_case() {
        let codec = Codec::new(CodecMode::Hex);
        assert_eq!(
            codec.encode("ab"),
            Err(CodecError::InvalidDigit { ch: 'a', index: 0 })
        );
        assert_eq!(
            codec.encode("0Ff0"),
            Err(CodecError::InvalidDigit { ch: 'f', index: 2 })
        );
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        let codec = Codec::new(CodecMode::Hex);
        assert_eq!(codec.encode("ABC"), Err(CodecError::OddLength(3)));
        assert_eq!(
            codec.encode("AZ"),
            Err(CodecError::InvalidDigit { ch: 'Z', index: 1 })
        );
    }

    #[test]
    fn test_raw_roundtrip_latin1() {
        let codec = Codec::new(CodecMode::Raw);
        let text = "hello\r\n\u{00e9}\u{00ff}";
        let bytes = codec.encode(text).unwrap();
        assert_eq!(bytes.len(), text.chars().count());
        assert_eq!(codec.decode(&bytes), text);
    }

    #[test]
    fn test_raw_truncates_wide_chars() {
        let codec = Codec::new(CodecMode::Raw);
        // U+0141 keeps only its low byte.
        assert_eq!(codec.encode("\u{0141}").unwrap(), vec![0x41]);
    }

    #[test]
    fn test_default_mode_is_hex() {
        assert_eq!(Codec::default().mode(), CodecMode::Hex);
    }
}
