//! Key signatures and the keyboard-event seam.
//!
//! A key signature is the canonical form of a binding: an ordered list of key
//! tokens. A single key `"f1"` and the one-element sequence `["f1"]` produce the
//! same signature, so both index and match identically. Chords like `g g` are
//! written as sequences and displayed space-separated.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Canonical, ordered key sequence used for indexing and matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeySignature(Vec<String>);

impl KeySignature {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_chord(&self) -> bool {
        self.0.len() > 1
    }

    /// True when `self` is shorter than `other` and matches its leading tokens.
    pub fn is_strict_prefix_of(&self, other: &KeySignature) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// True when `tokens` equals this signature exactly.
    pub fn matches(&self, tokens: &[String]) -> bool {
        self.0.as_slice() == tokens
    }

    /// True when `tokens` is a strict prefix of this signature.
    pub fn extends(&self, tokens: &[String]) -> bool {
        tokens.len() < self.0.len() && self.0.starts_with(tokens)
    }

    /// Position of the first empty token, if any. `" "` is the space bar
    /// and counts as a key.
    pub(crate) fn first_blank(&self) -> Option<usize> {
        self.0.iter().position(|t| t.is_empty())
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl FromStr for KeySignature {
    type Err = std::convert::Infallible;

    /// Whitespace separates chord steps: `"g g"` is a two-key chord.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.split_whitespace()))
    }
}

impl From<&str> for KeySignature {
    /// A literal single key. Use [`KeySignature::new`] or `parse` for chords.
    fn from(key: &str) -> Self {
        Self(vec![key.to_string()])
    }
}

impl From<String> for KeySignature {
    fn from(key: String) -> Self {
        Self(vec![key])
    }
}

impl<const N: usize> From<[&str; N]> for KeySignature {
    fn from(keys: [&str; N]) -> Self {
        Self::new(keys)
    }
}

impl From<Vec<String>> for KeySignature {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

impl From<&[&str]> for KeySignature {
    fn from(keys: &[&str]) -> Self {
        Self::new(keys.iter().copied())
    }
}

impl Serialize for KeySignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeySignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw.split_whitespace()))
    }
}

/// The slice of a platform keyboard event the dispatcher needs.
pub trait KeyEvent {
    fn prevent_default(&mut self);
    fn stop_propagation(&mut self);
}

/// Key event that records which default actions were suppressed.
///
/// Used by the CLI and by tests; GUI shells implement [`KeyEvent`] on their
/// own event type instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPress {
    pub key: String,
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

impl KeyEvent for KeyPress {
    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}
