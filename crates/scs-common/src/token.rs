//! Base-38 packed identifiers.
//!
//! Game data refers to most named things (road looks, prefab names, cities)
//! through a "token": up to 12 characters from `[0-9a-z_]` packed into a
//! little-endian u64. Symbol 0 is NUL padding, the first character is the
//! least significant digit.

use std::fmt;

use crate::{Error, Result};

const ALPHABET: &[u8; 38] = b"\x000123456789abcdefghijklmnopqrstuvwxyz_";

/// Maximum number of characters a token can hold (38^12 < 2^64 < 38^13).
pub const MAX_TOKEN_LEN: usize = 12;

/// A packed base-38 identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token(pub u64);

impl Token {
    /// The empty token.
    pub const EMPTY: Token = Token(0);

    /// Wrap a raw packed value.
    #[inline]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The raw packed value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Whether this is the empty token.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Pack a string into a token.
    pub fn encode(text: &str) -> Result<Self> {
        if text.len() > MAX_TOKEN_LEN {
            return Err(Error::InvalidToken(text.to_string()));
        }
        let mut value: u64 = 0;
        for &c in text.as_bytes().iter().rev() {
            let index = symbol_index(c).ok_or_else(|| Error::InvalidToken(text.to_string()))?;
            value = value * 38 + index;
        }
        Ok(Self(value))
    }

    /// Unpack the token into its text form.
    pub fn decode(&self) -> String {
        let mut value = self.0;
        let mut out = String::with_capacity(MAX_TOKEN_LEN);
        while value > 0 {
            let symbol = ALPHABET[(value % 38) as usize];
            value /= 38;
            if symbol != 0 {
                out.push(symbol as char);
            }
        }
        out
    }
}

fn symbol_index(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u64 + 1),
        b'a'..=b'z' => Some((c - b'a') as u64 + 11),
        b'_' => Some(37),
        _ => None,
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decode())
    }
}

impl std::str::FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::encode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_values() {
        assert_eq!(Token::encode("").unwrap().value(), 0);
        assert_eq!(Token::encode("a").unwrap().value(), 11);
        assert_eq!(Token::encode("0a").unwrap().value(), 1 + 11 * 38);
        assert_eq!(Token(1 + 11 * 38).decode(), "0a");
    }

    #[test]
    fn test_roundtrip_names() {
        for name in ["road", "ger_border", "us_tx_01", "zzzzzzzzzzzz"] {
            assert_eq!(Token::encode(name).unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(Token::encode("Road").is_err());
        assert!(Token::encode("thirteen_long").is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_stays_in_alphabet(value in any::<u64>()) {
            let text = Token(value).decode();
            prop_assert!(text.len() <= MAX_TOKEN_LEN + 1);
            prop_assert!(text.bytes().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == b'_'));
        }

        #[test]
        fn prop_valid_tokens_roundtrip(name in "[0-9a-z_]{1,12}") {
            let token = Token::encode(&name).unwrap();
            prop_assert_eq!(token.decode(), name);
        }
    }
}
