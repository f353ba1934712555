//! Standard (padded) base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::fmt;

/// Base64 text standing for bytes.
///
/// Solana authorizations travel as base64 of the bincode-serialized transaction,
/// and EdDSA API secrets are handed out as base64 of the raw key.
///
/// ```rust
/// use x402_settle_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"hello world");
/// assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
/// assert_eq!(encoded.decode().unwrap(), b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, str>);

impl Base64Bytes<'_> {
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        Base64Bytes(Cow::Owned(STANDARD.encode(input)))
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.0.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Surrounding whitespace is dropped; env files often leave a trailing newline.
impl<'a> From<&'a str> for Base64Bytes<'a> {
    fn from(s: &'a str) -> Self {
        Base64Bytes(Cow::Borrowed(s.trim()))
    }
}

impl fmt::Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
