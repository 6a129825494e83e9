//! Hex byte strings as they appear in catalogs, reports, and restore points.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Owned byte string that serializes as spaced upper-case hex (`"00 DC 05"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn parse(text: &str) -> Result<Self> {
        parse_hex(text).map(Self)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for HexBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hex(&self.0))
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        HexBytes::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Parse hex bytes, either spaced (`"00 DC 05"`) or contiguous (`"00DC05"`).
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.split_whitespace().collect();
    if !digits.is_ascii() {
        return Err(Error::InvalidHex(format!("non-ASCII input '{}'", text)));
    }
    if digits.len() % 2 != 0 {
        return Err(Error::InvalidHex(format!(
            "odd number of hex digits in '{}'",
            text
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|e| {
                Error::InvalidHex(format!("invalid hex byte '{}': {}", &digits[i..i + 2], e))
            })
        })
        .collect()
}

pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format at most `limit` bytes, marking the elided tail.
pub fn format_hex_truncated(bytes: &[u8], limit: usize) -> String {
    if bytes.len() <= limit {
        return format_hex(bytes);
    }
    format!(
        "{} ... (+{} bytes)",
        format_hex(&bytes[..limit]),
        bytes.len() - limit
    )
}

/// Serde adapter for optional addresses written as `"0x..."` strings.
pub mod opt_address {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<u64>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(address) => serializer.serialize_str(&format!("0x{:X}", address)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<u64>, D::Error> {
        let Some(text) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let digits = text.trim_start_matches("0x").trim_start_matches("0X");
        u64::from_str_radix(digits, 16)
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("Invalid address '{}': {}", text, e)))
    }
}
