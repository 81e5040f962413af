//! Identifier management using string interning.
//!
//! Kind names, slot names, and attribute names are compared constantly
//! during equation resolution and dependency tracking, so they are stored
//! as interned [`Id`] symbols rather than owned strings.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for identifier storage.
///
/// Guarded by a `Mutex`; the engine itself is single-threaded but `Id`
/// construction may happen from any thread.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> &'static Mutex<DefaultStringInterner> {
    INTERNER.get_or_init(|| Mutex::new(DefaultStringInterner::new()))
}

/// Interned identifier for kind, slot, and attribute names.
///
/// `Id` is `Copy` and compares in O(1), which keeps attribute cache keys
/// and grammar tables cheap.
///
/// # Examples
///
/// ```
/// use ragtime_core::identifier::Id;
///
/// let kind = Id::new("AddExp");
/// let slot = Id::new("A");
/// assert_eq!(kind, Id::new("AddExp"));
/// assert_eq!(slot.to_string(), "A");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Intern `name` and return its symbol.
    pub fn new(name: &str) -> Self {
        let mut interner = interner().lock().expect("identifier interner poisoned");
        Self(interner.get_or_intern(name))
    }

    /// Resolve the symbol back to an owned string.
    pub fn resolve(&self) -> String {
        let interner = interner().lock().expect("identifier interner poisoned");
        interner
            .resolve(self.0)
            .expect("symbol missing from interner")
            .to_owned()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = interner().lock().expect("identifier interner poisoned");
        let name = interner
            .resolve(self.0)
            .expect("symbol missing from interner");
        write!(f, "{name}")
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Id::new(name)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        *self == Id::new(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = Id::new("Root");
        let b = Id::new("Root");
        assert_eq!(a, b);
        assert_eq!(a.resolve(), "Root");
    }

    #[test]
    fn distinct_names_are_distinct() {
        assert_ne!(Id::new("Defs"), Id::new("Exp"));
    }

    #[test]
    fn compares_against_str() {
        assert_eq!(Id::new("value"), "value");
    }
}
