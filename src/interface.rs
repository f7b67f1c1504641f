use std::fmt;

/// Minimal protocol interface metadata.
///
/// The source this table was distilled from stores an opaque `const struct
/// wl_interface *` in a zombified slot, purely so that a dispatcher elsewhere can
/// still parse (and discard) a late-arriving message naming a destroyed object.
/// This crate has no dispatcher to hand that pointer to, so it defines just enough
/// of the shape — name and version — to be a useful, testable default for the
/// table's zombie payload type; see [`Map`](crate::Map)'s `I` type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interface {
    /// Protocol interface name, e.g. `"wl_surface"`.
    pub name: &'static str,
    /// Interface version this object was bound at.
    pub version: u32,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}
