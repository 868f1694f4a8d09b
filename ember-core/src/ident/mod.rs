//! Identifier interning
//!
//! Interns text into small comparable tokens. The same spelling always maps to
//! the same [`Identifier`] within one [`IdentifierTable`]; spellings that differ
//! only by case share a case-insensitive identifier.
//!
//! Raw ids are table-local. Anything that crosses a table boundary goes by text
//! (see the serde impls, which resolve on the way out and re-intern on the way in).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;

/// An interned name
///
/// Equality and hashing use the raw id only. There is deliberately no `Ord`
/// impl: ordering shown to users must go through [`IdentifierTable::compare`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier {
    id: u32,
    ci_id: u32,
}

impl Identifier {
    /// "No name"; resolves to the empty string
    pub const EMPTY: Identifier = Identifier { id: 0, ci_id: 0 };

    /// "Not a real identifier"; never resolves
    pub const INVALID: Identifier = Identifier {
        id: u32::MAX,
        ci_id: u32::MAX,
    };

    /// Raw table-local id
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Raw id shared by all case variants of this spelling
    #[inline]
    pub fn case_insensitive_id(&self) -> u32 {
        self.ci_id
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            return write!(f, "Identifier(<invalid>)");
        }
        match global().resolve(*self) {
            Some(text) => write!(f, "Identifier({:?}#{})", text, self.id),
            None => write!(f, "Identifier(#{})", self.id),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match global().resolve(*self) {
            Some(text) => f.write_str(&text),
            None => f.write_str("<invalid>"),
        }
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match global().resolve(*self) {
            Some(text) => serializer.serialize_some(&*text),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        Ok(match text {
            Some(text) => intern(&text),
            None => Identifier::INVALID,
        })
    }
}

struct TableInner {
    by_text: HashMap<Arc<str>, Identifier>,
    texts: Vec<Arc<str>>,
}

/// Append-only interning table
pub struct IdentifierTable {
    inner: RwLock<TableInner>,
}

impl IdentifierTable {
    /// Create a table holding only the empty spelling
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let mut by_text = HashMap::new();
        by_text.insert(empty.clone(), Identifier::EMPTY);
        Self {
            inner: RwLock::new(TableInner {
                by_text,
                texts: vec![empty],
            }),
        }
    }

    /// Intern `text`, returning the existing identifier when already known
    pub fn intern(&self, text: &str) -> Identifier {
        if let Some(ident) = self.inner.read().by_text.get(text) {
            return *ident;
        }

        let mut inner = self.inner.write();
        Self::intern_locked(&mut inner, text)
    }

    fn intern_locked(inner: &mut TableInner, text: &str) -> Identifier {
        if let Some(ident) = inner.by_text.get(text) {
            return *ident;
        }

        // Uppercase first so expanding mappings ("ß" -> "SS") fold alike
        let folded = text.to_uppercase().to_lowercase();
        let ci_id = if folded == text {
            inner.texts.len() as u32
        } else {
            Self::intern_locked(inner, &folded).ci_id
        };

        let id = inner.texts.len() as u32;
        let ident = Identifier { id, ci_id };
        let shared: Arc<str> = Arc::from(text);
        inner.texts.push(shared.clone());
        inner.by_text.insert(shared, ident);
        trace!(target: "ember::ident", id, ci_id, text, "interned new identifier");
        ident
    }

    /// Look up an identifier that is already interned, without adding it
    pub fn lookup(&self, text: &str) -> Option<Identifier> {
        self.inner.read().by_text.get(text).copied()
    }

    /// Resolve an identifier back to its text
    pub fn resolve(&self, ident: Identifier) -> Option<Arc<str>> {
        if ident.is_invalid() {
            return None;
        }
        self.inner.read().texts.get(ident.id as usize).cloned()
    }

    /// The identifier shared by every case variant of `ident`'s spelling
    pub fn case_insensitive(&self, ident: Identifier) -> Identifier {
        if ident.is_invalid() {
            return ident;
        }
        Identifier {
            id: ident.ci_id,
            ci_id: ident.ci_id,
        }
    }

    /// Order two identifiers by their resolved text
    pub fn compare(&self, a: Identifier, b: Identifier) -> Ordering {
        let inner = self.inner.read();
        let text = |ident: Identifier| -> Option<Arc<str>> {
            if ident.is_invalid() {
                None
            } else {
                inner.texts.get(ident.id as usize).cloned()
            }
        };
        // Invalid sorts last
        match (text(a), text(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Sort identifiers for user-visible output
    pub fn sort_by_text(&self, idents: &mut [Identifier]) {
        idents.sort_by(|a, b| self.compare(*a, *b));
    }

    /// Number of distinct spellings, including the empty one
    pub fn len(&self) -> usize {
        self.inner.read().texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdentifierTable {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_TABLE: Lazy<IdentifierTable> = Lazy::new(IdentifierTable::new);

/// The process-wide table
pub fn global() -> &'static IdentifierTable {
    &GLOBAL_TABLE
}

/// Intern into the process-wide table
pub fn intern(text: &str) -> Identifier {
    global().intern(text)
}

/// Resolve against the process-wide table
pub fn resolve(ident: Identifier) -> Option<Arc<str>> {
    global().resolve(ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let table = IdentifierTable::new();
        let a = table.intern("foo");
        let b = table.intern("foo");
        assert_eq!(a, b);
        assert_ne!(a, table.intern("bar"));
        assert_ne!(a, table.intern("Foo"));
    }

    #[test]
    fn test_resolve_roundtrip() {
        let table = IdentifierTable::new();
        let ident = table.intern("length");
        assert_eq!(table.resolve(ident).as_deref(), Some("length"));
        assert_eq!(table.lookup("length"), Some(ident));
        assert_eq!(table.lookup("missing"), None);
    }

    #[test]
    fn test_case_insensitive_shared() {
        let table = IdentifierTable::new();
        for text in ["value", "Äpfel", "MiXeD_case", "x", "straße", "ﬁle", "ŉ"] {
            let lower = table.case_insensitive(table.intern(text));
            let upper = table.case_insensitive(table.intern(&text.to_uppercase()));
            assert_eq!(lower, upper, "case variants of {text:?}");
        }
    }

    #[test]
    fn test_case_insensitive_does_not_touch_original() {
        let table = IdentifierTable::new();
        let original = table.intern("Name");
        let folded = table.case_insensitive(original);
        assert_ne!(original, folded);
        assert_eq!(table.resolve(original).as_deref(), Some("Name"));
        assert_eq!(table.resolve(folded).as_deref(), Some("name"));
    }

    #[test]
    fn test_sentinels() {
        let table = IdentifierTable::new();
        assert_eq!(table.intern(""), Identifier::EMPTY);
        assert_ne!(Identifier::EMPTY, Identifier::INVALID);
        assert_eq!(table.resolve(Identifier::EMPTY).as_deref(), Some(""));
        assert_eq!(table.resolve(Identifier::INVALID), None);
        assert!(Identifier::INVALID.is_invalid());
        assert!(Identifier::EMPTY.is_empty());
    }

    #[test]
    fn test_tables_are_independent() {
        let first = IdentifierTable::new();
        let second = IdentifierTable::new();
        first.intern("a");
        let b1 = first.intern("b");
        let b2 = second.intern("b");
        assert_eq!(first.resolve(b1), second.resolve(b2));
        assert_ne!(b1.id(), b2.id());
    }

    #[test]
    fn test_sort_by_text_ignores_ids() {
        let table = IdentifierTable::new();
        let zeta = table.intern("zeta");
        let alpha = table.intern("alpha");
        let mid = table.intern("mid");
        let mut idents = vec![zeta, Identifier::INVALID, mid, alpha];
        table.sort_by_text(&mut idents);
        assert_eq!(idents, vec![alpha, mid, zeta, Identifier::INVALID]);
    }

    #[test]
    fn test_serde_goes_by_text() {
        let ident = intern("serialized_name");
        let json = serde_json::to_string(&ident).unwrap();
        assert_eq!(json, "\"serialized_name\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ident);
    }

    #[test]
    fn test_concurrent_interning_agrees() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| intern("shared_across_threads")))
            .collect();
        let idents: Vec<Identifier> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(idents.windows(2).all(|w| w[0] == w[1]));
    }
}
