//! Surrogate key catalog.
//!
//! Long, externally meaningful strings (code system URIs, unit codes,
//! resource type names, search parameter URIs) are stored in the physical
//! schema as small integer ids. The catalog maps those strings to ids so the
//! query generators can emit cheap integer equality checks.
//!
//! The catalog is populated out-of-band. Readers take an immutable
//! [`CatalogSnapshot`] and a publisher replaces the whole snapshot in one
//! step, so a reader never sees a half-written mapping. A lookup is a pure,
//! synchronous read that may be stale; absence is a normal outcome.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Namespace of a surrogate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyNamespace {
    /// Code system URIs (`System` table).
    System,
    /// Quantity unit codes (`QuantityCode` table).
    QuantityCode,
    /// Resource type names (`ResourceType` table).
    ResourceType,
    /// Search parameter canonical URLs (`SearchParam` table).
    SearchParam,
}

impl fmt::Display for KeyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyNamespace::System => write!(f, "system"),
            KeyNamespace::QuantityCode => write!(f, "quantity-code"),
            KeyNamespace::ResourceType => write!(f, "resource-type"),
            KeyNamespace::SearchParam => write!(f, "search-param"),
        }
    }
}

/// Read-only view of the surrogate key mappings used during query generation.
pub trait SurrogateKeyLookup: Send + Sync {
    /// Returns the id for `value` in `namespace`, or `None` when not (yet) known.
    fn lookup(&self, namespace: KeyNamespace, value: &str) -> Option<i64>;
}

/// An immutable set of surrogate key mappings.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    entries: HashMap<KeyNamespace, HashMap<String, i64>>,
}

impl CatalogSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping, replacing any previous id for the same value.
    pub fn with_entry(mut self, namespace: KeyNamespace, value: impl Into<String>, id: i64) -> Self {
        self.insert(namespace, value, id);
        self
    }

    /// Adds a mapping in place. Only used while building a snapshot, before it
    /// is published.
    pub fn insert(&mut self, namespace: KeyNamespace, value: impl Into<String>, id: i64) {
        self.entries
            .entry(namespace)
            .or_default()
            .insert(value.into(), id);
    }

    /// Returns the number of mappings in a namespace.
    pub fn len(&self, namespace: KeyNamespace) -> usize {
        self.entries.get(&namespace).map_or(0, HashMap::len)
    }

    /// Returns true if the snapshot holds no mappings at all.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }
}

impl SurrogateKeyLookup for CatalogSnapshot {
    fn lookup(&self, namespace: KeyNamespace, value: &str) -> Option<i64> {
        self.entries.get(&namespace)?.get(value).copied()
    }
}

/// Shared catalog that publishes snapshots by atomic swap.
#[derive(Debug, Default)]
pub struct SurrogateKeyCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl SurrogateKeyCatalog {
    /// Creates a catalog with an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog that starts from the given snapshot.
    pub fn with_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Returns the current snapshot. The returned snapshot stays valid and
    /// unchanged even if a newer one is published afterwards.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.read().clone()
    }

    /// Replaces the current snapshot.
    pub fn publish(&self, snapshot: CatalogSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}

impl SurrogateKeyLookup for SurrogateKeyCatalog {
    fn lookup(&self, namespace: KeyNamespace, value: &str) -> Option<i64> {
        self.current.read().lookup(namespace, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_hit_and_miss() {
        let snapshot = CatalogSnapshot::new()
            .with_entry(KeyNamespace::System, "http://loinc.org", 7)
            .with_entry(KeyNamespace::QuantityCode, "mg", 3);

        assert_eq!(snapshot.lookup(KeyNamespace::System, "http://loinc.org"), Some(7));
        assert_eq!(snapshot.lookup(KeyNamespace::QuantityCode, "mg"), Some(3));
        assert_eq!(snapshot.lookup(KeyNamespace::QuantityCode, "kg"), None);
        // namespaces are independent
        assert_eq!(snapshot.lookup(KeyNamespace::System, "mg"), None);
    }

    #[test]
    fn test_publish_does_not_affect_held_snapshot() {
        let catalog = SurrogateKeyCatalog::with_snapshot(
            CatalogSnapshot::new().with_entry(KeyNamespace::QuantityCode, "mg", 1),
        );
        let held = catalog.snapshot();

        catalog.publish(CatalogSnapshot::new().with_entry(KeyNamespace::QuantityCode, "kg", 2));

        assert_eq!(held.lookup(KeyNamespace::QuantityCode, "mg"), Some(1));
        assert_eq!(catalog.lookup(KeyNamespace::QuantityCode, "mg"), None);
        assert_eq!(catalog.lookup(KeyNamespace::QuantityCode, "kg"), Some(2));
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let catalog = Arc::new(SurrogateKeyCatalog::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = catalog.snapshot();
                        let a = snap.lookup(KeyNamespace::System, "a");
                        let b = snap.lookup(KeyNamespace::System, "b");
                        // both entries are always published together
                        assert_eq!(a.is_some(), b.is_some());
                        if let (Some(a), Some(b)) = (a, b) {
                            assert_eq!(a + 1, b);
                        }
                    }
                })
            })
            .collect();

        for i in 0..200 {
            catalog.publish(
                CatalogSnapshot::new()
                    .with_entry(KeyNamespace::System, "a", i)
                    .with_entry(KeyNamespace::System, "b", i + 1),
            );
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_snapshot_len() {
        let snapshot = CatalogSnapshot::new();
        assert!(snapshot.is_empty());
        let snapshot = snapshot.with_entry(KeyNamespace::ResourceType, "Patient", 1);
        assert_eq!(snapshot.len(KeyNamespace::ResourceType), 1);
        assert_eq!(snapshot.len(KeyNamespace::System), 0);
        assert!(!snapshot.is_empty());
    }
}
