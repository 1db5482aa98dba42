//! Pins and the tokens derived from them.
//!
//! A pin is what a person reads off the headset and types into the
//! controller. It is short, easy to type, and not unique over time. The
//! token is the SHA-256 of the pin text and is what actually addresses the
//! session document, so both sides reach the same document without ever
//! exchanging anything but the pin.
//!
//! ```text
//! "4821" ──sha256──→ "a388f562…0fa2" ──→ sessions/a388f562…0fa2
//! ```

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ProtocolError;

/// Prefix of every session document path.
const SESSIONS_PREFIX: &str = "sessions/";

// ---------------------------------------------------------------------------
// Pin
// ---------------------------------------------------------------------------

/// A 4-digit pairing code in the range 1000–9999.
///
/// Construction always validates, so holding a `Pin` means holding a
/// well-formed one. On the wire it is a plain JSON string (`"4821"`);
/// `#[serde(try_from = "String")]` routes deserialization through
/// [`Pin::parse`] so a malformed pin in a document is a decode error rather
/// than a silently accepted value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(String);

impl Pin {
    /// Smallest pin value (no leading zeros, so always 4 digits).
    pub const MIN: u16 = 1000;
    /// Largest pin value.
    pub const MAX: u16 = 9999;

    /// Parses a human-entered pin. Surrounding whitespace is ignored.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidPin`] unless the input is exactly
    /// four ASCII digits with a value in `MIN..=MAX`.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let trimmed = input.trim();
        if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidPin(input.to_string()));
        }
        let value: u16 = trimmed
            .parse()
            .map_err(|_| ProtocolError::InvalidPin(input.to_string()))?;
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ProtocolError::InvalidPin(input.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Picks a uniformly random pin using the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Picks a uniformly random pin from the given RNG.
    ///
    /// Split out from [`generate`](Self::generate) so tests can use a
    /// seeded RNG.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value: u16 = rng.random_range(Self::MIN..=Self::MAX);
        Self(value.to_string())
    }

    /// The pin text, e.g. `"4821"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Pin {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// The durable key of a session document.
///
/// Normally the lowercase hex SHA-256 of a pin (64 characters). When no
/// pin is available, [`Token::from_pin`] yields the sentinel
/// [`Token::unknown`]: a valid key that no freshly generated pin will ever
/// hash to, so nothing meaningful lives under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    const UNKNOWN: &'static str = "unknown";
    const MAX_LEN: usize = 128;

    /// Derives the token for a pin. Deterministic: the same pin always
    /// yields the same token.
    pub fn derive(pin: &Pin) -> Self {
        let digest = Sha256::digest(pin.as_str().as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Derives the token for an optional pin, falling back to the
    /// sentinel when there is none.
    pub fn from_pin(pin: Option<&Pin>) -> Self {
        match pin {
            Some(pin) => Self::derive(pin),
            None => {
                tracing::warn!("no pin available, using sentinel token");
                Self::unknown()
            }
        }
    }

    /// The sentinel token used when no pin exists.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// `true` for the sentinel token.
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    /// Validates a token received from elsewhere (a wire message, a path).
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidToken`] for empty, overlong, or
    /// non-alphanumeric input.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let ok = !input.is_empty()
            && input.len() <= Self::MAX_LEN
            && input.bytes().all(|b| b.is_ascii_alphanumeric());
        if ok {
            Ok(Self(input.to_string()))
        } else {
            Err(ProtocolError::InvalidToken(input.to_string()))
        }
    }

    /// The document path this token addresses: `sessions/<token>`.
    pub fn path(&self) -> String {
        format!("{SESSIONS_PREFIX}{}", self.0)
    }

    /// Recovers the token from a `sessions/<token>` path.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidPath`] if the prefix is missing,
    /// [`ProtocolError::InvalidToken`] if the remainder is not a token.
    pub fn from_path(path: &str) -> Result<Self, ProtocolError> {
        let rest = path
            .strip_prefix(SESSIONS_PREFIX)
            .ok_or_else(|| ProtocolError::InvalidPath(path.to_string()))?;
        Self::parse(rest)
    }

    /// The raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens are long; logs only need enough to tell them apart.
        let short = self.0.get(..12).unwrap_or(&self.0);
        f.write_str(short)
    }
}

impl TryFrom<String> for Token {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}
