//! `3nK` obfuscated text.
//!
//! ```text
//! "3nK" | 2 bytes | seed | payload ...
//! ```
//!
//! Each payload byte is XORed with a key derived from a running u8 seed.

use std::borrow::Cow;

use crate::{Error, Result};

pub const MAGIC: &[u8; 3] = b"3nK";

const SEED_OFFSET: usize = 5;
const PAYLOAD_OFFSET: usize = 6;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Whether `data` carries the `3nK` prefix.
pub fn is_encrypted(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

#[inline]
fn key(seed: u8) -> u8 {
    (((seed << 2) ^ !seed) << 3) ^ seed
}

/// Decode a `3nK` buffer into its plain bytes.
pub fn decrypt_3nk(data: &[u8]) -> Result<Vec<u8>> {
    if !is_encrypted(data) {
        return Err(Error::Decrypt("missing 3nK magic".into()));
    }
    let Some(&seed) = data.get(SEED_OFFSET) else {
        return Err(Error::Decrypt(format!(
            "3nK header needs {PAYLOAD_OFFSET} bytes, got {}",
            data.len()
        )));
    };

    let mut seed = seed;
    let out = data[PAYLOAD_OFFSET..]
        .iter()
        .map(|&b| {
            let plain = b ^ key(seed);
            seed = seed.wrapping_add(1);
            plain
        })
        .collect();
    Ok(out)
}

/// Turn file bytes into SII source text, decrypting and dropping a BOM if present.
pub fn decode_text(data: &[u8]) -> Result<String> {
    let plain: Cow<'_, [u8]> = if is_encrypted(data) {
        tracing::debug!(len = data.len(), "decrypting 3nK text");
        Cow::Owned(decrypt_3nk(data)?)
    } else {
        Cow::Borrowed(data)
    };
    let body = plain.strip_prefix(UTF8_BOM).unwrap_or(&plain[..]);
    Ok(String::from_utf8_lossy(body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obfuscate(text: &[u8], seed: u8) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&[1, 0, seed]);
        let mut s = seed;
        for &b in text {
            out.push(b ^ key(s));
            s = s.wrapping_add(1);
        }
        out
    }

    #[test]
    fn test_key_stream() {
        assert_eq!(key(0), 0xF8);
        assert_eq!(key(1), 0xD1);
        assert_eq!(key(255), 0x1F);
    }

    #[test]
    fn test_first_byte() {
        let data = [b'3', b'n', b'K', 1, 0, 0, 0xF8 ^ b'S'];
        assert_eq!(decrypt_3nk(&data).unwrap(), b"S");
    }

    #[test]
    fn test_seed_wraps() {
        let text = b"SiiNunit { }";
        let data = obfuscate(text, 250);
        assert_eq!(decrypt_3nk(&data).unwrap(), text);
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFSiiNunit{}").unwrap(), "SiiNunit{}");
        assert_eq!(decode_text(&obfuscate(b"a : b {}", 7)).unwrap(), "a : b {}");
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(decrypt_3nk(b"3nK\x01"), Err(Error::Decrypt(_))));
    }
}
