use serde::{Deserialize, Deserializer, Serialize, Serializer};
use symbol_table::GlobalSymbol;

/// An interned, globally shared string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GSym(GlobalSymbol);

impl GSym {
    pub fn new(s: &str) -> Self {
        GSym(GlobalSymbol::from(s))
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

/// Represents an identifier in a dataflow program: a variable, a node, a
/// machine instance, a type or a module.
///
/// Identifiers are interned so that copying and comparing them for equality
/// is cheap. Ordering is lexicographic over the underlying string so that any
/// ordering derived from identifiers is reproducible across runs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id {
    pub id: GSym,
}

impl Id {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Id {
            id: GSym::new(id.as_ref()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.id.as_str()
    }
}

/// A trait representing something in the IR that has a name.
pub trait GetName {
    /// Return a reference to the object's name
    fn name(&self) -> Id;
}

/* =================== Impls for Id to make them easier to use ============== */

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Id::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::Id;

    #[test]
    fn ordering_follows_strings() {
        let mut ids = vec![Id::from("b"), Id::from("a10"), Id::from("a2")];
        ids.sort();
        assert_eq!(ids, vec!["a10", "a2", "b"]);
    }

    #[test]
    fn interning_is_stable() {
        let a = Id::from("counter");
        let b = Id::new(String::from("counter"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "counter");
    }
}
