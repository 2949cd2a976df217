//! Strongly-typed identifiers carried inside command payloads.

use std::fmt;

/// Identifies a simulated object across the state, physics and
/// presentation stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Symbolic key name as reported by the input device, e.g. `"SPACE"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub String);

impl Key {
    /// The escape key. Pressing it asks the state stage to exit.
    pub const ESCAPE: &'static str = "ESCAPE";
    /// The space bar.
    pub const SPACE: &'static str = "SPACE";

    /// Create a key from its symbolic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The symbolic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Self(v.to_owned())
    }
}

/// Modifier key bitmask accompanying a key event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(pub u32);

impl Modifiers {
    /// No modifier held.
    pub const NONE: Self = Self(0);
    /// Shift held.
    pub const SHIFT: Self = Self(1 << 0);
    /// Control held.
    pub const CTRL: Self = Self(1 << 1);
    /// Alt held.
    pub const ALT: Self = Self(1 << 2);

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_combine() {
        let m = Modifiers::SHIFT | Modifiers::CTRL;
        assert!(m.contains(Modifiers::SHIFT));
        assert!(m.contains(Modifiers::CTRL));
        assert!(!m.contains(Modifiers::ALT));
        assert!(m.contains(Modifiers::NONE));
    }
}
