//! Stored values and the keys they live under.

use crate::ConversionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// STORED VALUES
// ============================================================================

/// A scalar payload accepted by `Cache::store`.
///
/// The store is bytes-in/bytes-out, so every variant has a single byte
/// encoding: strings as UTF-8, bytes verbatim, numbers as decimal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Str(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl StoredValue {
    /// Encode to the bytes written to the store.
    ///
    /// Floats always keep a decimal point or exponent (`3.0`, not `3`) so they
    /// read back as floats rather than integers.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Str(s) => s.as_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
            Self::Int(i) => i.to_string().into_bytes(),
            Self::Float(f) => format!("{:?}", f).into_bytes(),
        }
    }

    /// Name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for StoredValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for StoredValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

// ============================================================================
// CONVERSIONS FROM STORED BYTES
// ============================================================================

/// Decode stored bytes as UTF-8.
pub fn decode_utf8(bytes: Vec<u8>) -> Result<String, ConversionError> {
    String::from_utf8(bytes).map_err(|e| ConversionError::InvalidUtf8 {
        reason: e.to_string(),
    })
}

/// Parse stored bytes as a decimal integer.
pub fn decode_int(bytes: Vec<u8>) -> Result<i64, ConversionError> {
    let text = String::from_utf8_lossy(&bytes);
    text.trim()
        .parse::<i64>()
        .map_err(|_| ConversionError::InvalidInteger {
            value: text.into_owned(),
        })
}

/// Parse stored bytes as a float.
pub fn decode_float(bytes: Vec<u8>) -> Result<f64, ConversionError> {
    let text = String::from_utf8_lossy(&bytes);
    text.trim()
        .parse::<f64>()
        .map_err(|_| ConversionError::InvalidFloat {
            value: text.into_owned(),
        })
}

// ============================================================================
// CACHE KEYS
// ============================================================================

/// Key generated for every `store` call.
///
/// UUIDv7 keeps keys unique across processes and sortable by creation time.
/// The hyphenated text form is what lands in the store, which keeps cache keys
/// disjoint from telemetry key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(Uuid);

impl CacheKey {
    /// Generate a fresh key.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// The store key this cache key maps to.
    pub fn to_store_key(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for CacheKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_value_encoding() {
        assert_eq!(StoredValue::from("foo").to_bytes(), b"foo".to_vec());
        assert_eq!(StoredValue::from(vec![0u8, 255]).to_bytes(), vec![0u8, 255]);
        assert_eq!(StoredValue::from(123i64).to_bytes(), b"123".to_vec());
        assert_eq!(StoredValue::from(-7i32).to_bytes(), b"-7".to_vec());
        assert_eq!(StoredValue::from(3.0f64).to_bytes(), b"3.0".to_vec());
        assert_eq!(StoredValue::from(0.25f64).to_bytes(), b"0.25".to_vec());
    }

    #[test]
    fn test_decode_helpers() {
        assert_eq!(decode_utf8(b"foo".to_vec()).unwrap(), "foo");
        assert_eq!(decode_int(b"123".to_vec()).unwrap(), 123);
        assert_eq!(decode_float(b"3.0".to_vec()).unwrap(), 3.0);

        assert!(matches!(
            decode_utf8(vec![0xff, 0xfe]),
            Err(ConversionError::InvalidUtf8 { .. })
        ));
        assert_eq!(
            decode_int(b"foo".to_vec()),
            Err(ConversionError::InvalidInteger {
                value: "foo".to_string()
            })
        );
        assert!(matches!(
            decode_float(b"x1".to_vec()),
            Err(ConversionError::InvalidFloat { .. })
        ));
    }

    #[test]
    fn test_cache_key_text_roundtrip() {
        let key = CacheKey::generate();
        let text = key.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text, key.to_store_key());
        assert_eq!(text.parse::<CacheKey>().unwrap(), key);
    }

    #[test]
    fn test_cache_keys_are_fresh() {
        let a = CacheKey::generate();
        let b = CacheKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stored_value_kind() {
        assert_eq!(StoredValue::from("x").kind(), "str");
        assert_eq!(StoredValue::from(1i64).kind(), "int");
        assert_eq!(StoredValue::from(1.5f64).kind(), "float");
        assert_eq!(StoredValue::from(b"x".as_slice()).kind(), "bytes");
    }
}
