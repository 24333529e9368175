//! Order identifiers and short codes.
//!
//! A group order is addressed by its canonical identifier (the backend's
//! 24-hex-digit object id, embedded verbatim in the checkout QR code).  People
//! who cannot scan can type a short code instead, which the backend resolves
//! to the canonical identifier.
//!
//! ```text
//! QR payload      665f1c2ab3e4d5f6a7b8c9d0   → OrderCode::Full
//! typed by hand   a1b2-7ya3                  → OrderCode::Short("A1B2-7YA3")
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while validating an order identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderIdError {
    /// The identifier was empty (or only whitespace).
    #[error("order id must not be empty")]
    Empty,

    /// The identifier contains a character that cannot be placed verbatim in
    /// a URL query string.
    #[error("order id contains unsupported character {ch:?} at position {position}")]
    InvalidCharacter { ch: char, position: usize },
}

/// Opaque, validated order identifier.
///
/// Guaranteed non-empty and made only of URL-unreserved characters
/// (`A-Z a-z 0-9 - _ . ~`), so it can be embedded in the session URL as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    /// Validates `raw` (after trimming surrounding whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`OrderIdError::Empty`] for blank input and
    /// [`OrderIdError::InvalidCharacter`] for the first character outside the
    /// unreserved set.
    pub fn parse(raw: &str) -> Result<Self, OrderIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OrderIdError::Empty);
        }
        if let Some((position, ch)) = trimmed.char_indices().find(|(_, c)| !is_unreserved(*c)) {
            return Err(OrderIdError::InvalidCharacter { ch, position });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `true` for the URL-unreserved characters `A-Z a-z 0-9 - _ . ~`, which can
/// appear in a query string without escaping.
pub fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderId {
    type Error = OrderIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderId> for String {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

// ── Short codes ───────────────────────────────────────────────────────────────

/// Total length of a short code, separator included.
pub const SHORT_CODE_LEN: usize = 9;

/// Character separating the two halves of a short code.
pub const SHORT_CODE_SEPARATOR: char = '-';

/// A human-typed proxy for an order identifier, e.g. `A1B2-7YA3`.
///
/// Always stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    /// Recognises a short code: four alphanumerics, `-`, four alphanumerics.
    ///
    /// Input is trimmed and upper-cased first.  Returns `None` if the input
    /// does not have the short-code shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.len() != SHORT_CODE_LEN {
            return None;
        }
        let (head, tail) = normalized.split_once(SHORT_CODE_SEPARATOR)?;
        let half_ok = |s: &str| s.len() == 4 && s.chars().all(|c| c.is_ascii_alphanumeric());
        if half_ok(head) && half_ok(tail) {
            Some(Self(normalized))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the user scanned or typed on the join screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCode {
    /// A full order identifier (QR payload).
    Full(OrderId),
    /// A short code that must be resolved before joining.
    Short(ShortCode),
}

impl OrderCode {
    /// Classifies raw join-screen input.
    ///
    /// Short-code shape wins; anything else is validated as a full order id.
    ///
    /// # Errors
    ///
    /// Returns [`OrderIdError`] when the input is neither a short code nor a
    /// valid order identifier.
    pub fn parse(raw: &str) -> Result<Self, OrderIdError> {
        if let Some(code) = ShortCode::parse(raw) {
            return Ok(OrderCode::Short(code));
        }
        OrderId::parse(raw).map(OrderCode::Full)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
