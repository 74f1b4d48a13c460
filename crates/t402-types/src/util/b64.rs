//! Base64 text carried in payloads: Solana transactions, TON BOCs and friendly
//! addresses.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use std::borrow::Cow;
use std::fmt;

/// Base64 text held as bytes and decoded on demand.
///
/// ```rust
/// use t402_types::util::Base64Bytes;
///
/// let encoded = Base64Bytes::encode(b"hello world");
/// assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
/// assert_eq!(encoded.decode().unwrap(), b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes<'a>(pub Cow<'a, [u8]>);

impl Base64Bytes<'_> {
    /// Strict standard alphabet with padding.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.0)
    }

    /// Standard or URL-safe alphabet, padding optional. TON wallets emit both.
    pub fn decode_lenient(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let unpadded = self.0.strip_suffix(b"==").or_else(|| self.0.strip_suffix(b"="));
        let unpadded = unpadded.unwrap_or(&self.0);
        let url_safe: Vec<u8> = unpadded
            .iter()
            .map(|byte| match byte {
                b'+' => b'-',
                b'/' => b'_',
                other => *other,
            })
            .collect();
        URL_SAFE_NO_PAD.decode(url_safe)
    }

    pub fn encode<T: AsRef<[u8]>>(input: T) -> Base64Bytes<'static> {
        Base64Bytes(Cow::Owned(STANDARD.encode(input.as_ref()).into_bytes()))
    }
}

impl AsRef<[u8]> for Base64Bytes<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> From<&'a str> for Base64Bytes<'a> {
    fn from(s: &'a str) -> Self {
        Base64Bytes(Cow::Borrowed(s.as_bytes()))
    }
}

impl fmt::Display for Base64Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.0.as_ref()))
    }
}
