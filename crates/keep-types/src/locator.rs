//! # Locator
//!
//! Parsing and formatting of the canonical textual block identity:
//!
//! ```text
//! <hash32hex> ("+" <hint>)*
//! ```
//!
//! ## Hint ordering
//!
//! The size hint, if present, MUST come immediately after the hash and
//! before any other hint. All other hints follow in the order they were
//! parsed (or appended by `sign`). Locators that place a non-size hint
//! before the size hint are rejected.

use std::fmt;

/// Length of the hex-encoded MD5 digest that names a block.
pub const HASH_HEX_LEN: usize = 32;

/// A single hint token following the hash in a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    /// `+K@<region>` — a short-form region/datacenter tag.
    Region(String),
    /// `+A<hmac>@<ts_hex>` — a permission signature.
    Signature {
        /// 40 lowercase hex characters.
        hmac: String,
        /// Unix expiry timestamp, lowercase hex.
        expiry_hex: String,
    },
    /// Any other `+`-prefixed token, preserved verbatim but otherwise
    /// ignored.
    Other(String),
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::Region(region) => write!(f, "K@{region}"),
            Hint::Signature { hmac, expiry_hex } => write!(f, "A{hmac}@{expiry_hex}"),
            Hint::Other(token) => write!(f, "{token}"),
        }
    }
}

/// A parsed block locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Lowercase hex MD5 digest, exactly [`HASH_HEX_LEN`] characters.
    pub hash: String,
    /// Declared size in bytes, if the locator carried a size hint.
    pub size: Option<u64>,
    /// All hints other than the size hint, in their original order.
    pub hints: Vec<Hint>,
}

/// Errors returned by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The hash portion was not exactly 32 lowercase hex characters.
    #[error("invalid hash: expected {HASH_HEX_LEN} lowercase hex chars, got {0:?}")]
    InvalidHash(String),
    /// A hint other than the size hint appeared before the size hint.
    #[error("hint {0:?} precedes the size hint")]
    HintBeforeSize(String),
    /// More than one size hint was present.
    #[error("duplicate size hint")]
    DuplicateSize,
    /// A size hint did not parse as a non-negative decimal integer.
    #[error("invalid size hint: {0:?}")]
    InvalidSize(String),
    /// A signature hint did not match `A<40 hex>@<hex>`.
    #[error("malformed signature hint: {0:?}")]
    MalformedSignature(String),
}

fn is_lowercase_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a locator from its wire representation.
pub fn parse(text: &str) -> Result<Locator, ParseError> {
    let mut parts = text.split('+');
    let hash = parts.next().unwrap_or_default();
    if hash.len() != HASH_HEX_LEN || !is_lowercase_hex(hash) {
        return Err(ParseError::InvalidHash(hash.to_string()));
    }

    let mut size = None;
    let mut hints = Vec::new();
    let mut seen_non_size = false;

    for token in parts {
        if is_decimal(token) {
            if seen_non_size {
                return Err(ParseError::HintBeforeSize(token.to_string()));
            }
            if size.is_some() {
                return Err(ParseError::DuplicateSize);
            }
            size = Some(token.parse::<u64>().map_err(|_| ParseError::InvalidSize(token.to_string()))?);
            continue;
        }

        seen_non_size = true;
        hints.push(parse_hint(token)?);
    }

    Ok(Locator {
        hash: hash.to_string(),
        size,
        hints,
    })
}

fn parse_hint(token: &str) -> Result<Hint, ParseError> {
    if let Some(rest) = token.strip_prefix("K@") {
        return Ok(Hint::Region(rest.to_string()));
    }
    if let Some(rest) = token.strip_prefix('A') {
        let (hmac, expiry_hex) = rest
            .split_once('@')
            .ok_or_else(|| ParseError::MalformedSignature(token.to_string()))?;
        if hmac.len() != 40 || !is_lowercase_hex(hmac) || expiry_hex.is_empty() || !is_lowercase_hex(expiry_hex) {
            return Err(ParseError::MalformedSignature(token.to_string()));
        }
        return Ok(Hint::Signature {
            hmac: hmac.to_string(),
            expiry_hex: expiry_hex.to_string(),
        });
    }
    Ok(Hint::Other(token.to_string()))
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)?;
        if let Some(size) = self.size {
            write!(f, "+{size}")?;
        }
        for hint in &self.hints {
            write!(f, "+{hint}")?;
        }
        Ok(())
    }
}

/// A short-form region tag: exactly 5 lowercase alphanumeric characters,
/// e.g. `zzzzz`. The long form is an Arvados-style uuid (`zzzzz-zzzzz-`
/// followed by 15 more characters) and is never stripped.
fn is_short_region_tag(region: &str) -> bool {
    region.len() == 5 && region.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'z').contains(&b))
}

impl Locator {
    /// Return a copy of this locator with its short-form `+K@<region>` hint
    /// removed, if present. Every other hint — the size hint, a long-form
    /// (uuid) `+K@` region tag, and in particular the `+A<mac>@<ts>`
    /// signature hint — survives untouched.
    ///
    /// This is the canonical `removeHint` recognizer
    /// (`\+K@[a-z0-9]{5}(-[a-z0-9]{5}-[a-z0-9]{15})?`) restricted to its
    /// short-form branch: it strips a datacenter/region tag so locators
    /// from different regions compare equal, without touching anything
    /// that changes the block's identity or its access capability.
    pub fn strip_hints(&self) -> Locator {
        Locator {
            hash: self.hash.clone(),
            size: self.size,
            hints: self
                .hints
                .iter()
                .filter(|h| !matches!(h, Hint::Region(region) if is_short_region_tag(region)))
                .cloned()
                .collect(),
        }
    }

    /// Find the signature hint, if any.
    pub fn signature(&self) -> Option<(&str, &str)> {
        self.hints.iter().find_map(|h| match h {
            Hint::Signature { hmac, expiry_hex } => Some((hmac.as_str(), expiry_hex.as_str())),
            _ => None,
        })
    }
}
