//! The wire-level message format shared by every queue.
//!
//! A [`Command`] is a tag plus an ordered, heterogeneous argument list.
//! [`encode`] is the only place command shape is validated: it checks that
//! the name is a tag and never looks at the arguments. Argument counts and
//! types are checked later, at dispatch time, by
//! [`Payload::from_command`](crate::Payload::from_command).

use std::fmt;

use smallvec::SmallVec;

use crate::error::ProtocolError;

/// Ordered argument list of a [`Command`]. Four inline slots cover every
/// built-in command kind without a heap allocation.
pub type Args = SmallVec<[Arg; 4]>;

/// A single self-contained command argument.
///
/// Arguments are plain values so that a command crossing a queue never
/// refers back into the producing stage's state.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Signed integer (ids, modifier masks).
    Int(i64),
    /// Floating point number (coordinates, timestamps).
    Float(f64),
    /// Text (key names).
    Text(String),
}

/// The variant of an [`Arg`], used in dispatch error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// [`Arg::Int`].
    Int,
    /// [`Arg::Float`] or [`Arg::Int`], coerced.
    Number,
    /// [`Arg::Text`].
    Text,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl Arg {
    /// Integer value, if this is an [`Arg::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value. Integers are widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Text value, if this is an [`Arg::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// An immutable, tagged message.
///
/// Fields are private: a command is built once by [`encode`] (or by
/// [`Payload::into_command`](crate::Payload::into_command)) and is never
/// modified afterwards. Cloning yields an independent value.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    name: String,
    args: Args,
}

impl Command {
    /// Build a command whose name is statically known to be a valid tag.
    pub(crate) fn from_static(name: &'static str, args: Args) -> Self {
        debug_assert!(is_tag(name), "built-in command name {name:?} is not a tag");
        Self {
            name: name.to_owned(),
            args,
        }
    }

    /// The command tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered argument list. May be empty.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A tag is a non-empty run of ASCII letters, digits and underscores.
fn is_tag(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Build a [`Command`] from a name and arguments.
///
/// Structural validation only: the name must be a tag. The arguments are
/// not inspected, so a command with the wrong number of arguments for its
/// kind is accepted here and rejected at dispatch.
///
/// # Examples
///
/// ```
/// use tristage_core::{encode, decode, Arg};
///
/// let cmd = encode("USER_KEY_PRESS", [Arg::from("SPACE"), Arg::Int(0), Arg::Float(1.5)]).unwrap();
/// let (name, args) = decode(&cmd);
/// assert_eq!(name, "USER_KEY_PRESS");
/// assert_eq!(args.len(), 3);
///
/// assert!(encode("not a tag", []).is_err());
/// ```
pub fn encode(
    name: impl Into<String>,
    args: impl IntoIterator<Item = Arg>,
) -> Result<Command, ProtocolError> {
    let name = name.into();
    if !is_tag(&name) {
        return Err(ProtocolError::InvalidCommandShape { name });
    }
    Ok(Command {
        name,
        args: args.into_iter().collect(),
    })
}

/// Split a [`Command`] back into its name and arguments. Never fails.
pub fn decode(command: &Command) -> (&str, &[Arg]) {
    (command.name(), command.args())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_accepts_tags() {
        for name in ["EXIT", "USER_KEY_PRESS", "debug_2", "X"] {
            assert!(encode(name, []).is_ok(), "{name} should be a tag");
        }
    }

    #[test]
    fn encode_rejects_non_tags() {
        for name in ["", "USER KEY", "EXIT\n", "DEBUG-TIME", "ÉXIT"] {
            let err = encode(name, []).unwrap_err();
            assert_eq!(
                err,
                ProtocolError::InvalidCommandShape {
                    name: name.to_owned()
                }
            );
        }
    }

    #[test]
    fn encode_does_not_inspect_args() {
        let cmd = encode("USER_KEY_PRESS", [Arg::from("SPACE")]).unwrap();
        assert_eq!(cmd.args().len(), 1);
    }

    #[test]
    fn int_coerces_to_number_but_not_back() {
        assert_eq!(Arg::Int(3).as_f64(), Some(3.0));
        assert_eq!(Arg::Float(3.0).as_i64(), None);
        assert_eq!(Arg::from("a").as_f64(), None);
    }

    #[test]
    fn display_lists_args() {
        let cmd = encode("DEBUG_DOT_SCREEN", [Arg::Int(10), Arg::Int(20), Arg::Int(15)]).unwrap();
        assert_eq!(cmd.to_string(), "DEBUG_DOT_SCREEN(10, 20, 15)");
    }

    fn arb_arg() -> impl Strategy<Value = Arg> {
        prop_oneof![
            any::<i64>().prop_map(Arg::Int),
            (-1e9f64..1e9).prop_map(Arg::Float),
            "[a-zA-Z ]{0,8}".prop_map(Arg::Text),
        ]
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            name in "[A-Z_][A-Z0-9_]{0,15}",
            args in proptest::collection::vec(arb_arg(), 0..8),
        ) {
            let cmd = encode(name.clone(), args.clone()).unwrap();
            let (n, a) = decode(&cmd);
            prop_assert_eq!(n, name.as_str());
            prop_assert_eq!(a, args.as_slice());
        }
    }
}
