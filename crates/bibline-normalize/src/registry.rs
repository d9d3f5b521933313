//! Entity Registry: first-wins identity tables for authors, institutions, funders

use rustc_hash::FxHashMap;

/// A deduplicated entity keyed by its source-assigned identifier
pub trait Entity: Clone {
    fn id(&self) -> &str;
}

/// Outcome of [`EntityRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// Id already present; stored attributes kept
    Duplicate,
    /// Empty or blank id; nothing stored
    MissingId,
}

/// Insert-if-absent store, one entry per distinct id.
///
/// Entries keep first-registration order until [`export`](Self::export)
/// sorts them by id.
#[derive(Debug, Clone)]
pub struct EntityRegistry<E> {
    entries: Vec<E>,
    index: FxHashMap<String, usize>,
}

impl<E> Default for EntityRegistry<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<E: Entity> EntityRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are keyed exactly as stored, so `get` and `export` agree
    pub fn register(&mut self, entity: E) -> Registration {
        let id = entity.id();
        if id.trim().is_empty() {
            return Registration::MissingId;
        }
        if self.index.contains_key(id) {
            return Registration::Duplicate;
        }
        self.index.insert(id.to_string(), self.entries.len());
        self.entries.push(entity);
        Registration::Inserted
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.index.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-registration order
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }

    /// Fold in a registry built from records that come later in input order.
    /// Ids already present here keep their attributes.
    pub fn merge(&mut self, later: EntityRegistry<E>) {
        for entity in later.entries {
            self.register(entity);
        }
    }

    /// Unique entities sorted by id
    pub fn export(&self) -> Vec<E> {
        let mut out = self.entries.clone();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        id: String,
        name: &'static str,
    }

    impl Entity for Person {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn person(id: &str, name: &'static str) -> Person {
        Person {
            id: id.to_string(),
            name,
        }
    }

    #[test]
    fn first_registration_wins() {
        let mut reg = EntityRegistry::new();
        assert_eq!(reg.register(person("A123", "Jane Doe")), Registration::Inserted);
        assert_eq!(reg.register(person("A123", "JANE DOE")), Registration::Duplicate);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("A123").unwrap().name, "Jane Doe");
    }

    #[test]
    fn missing_id_is_noop() {
        let mut reg = EntityRegistry::new();
        assert_eq!(reg.register(person("", "Nobody")), Registration::MissingId);
        assert_eq!(reg.register(person("  ", "Nobody")), Registration::MissingId);
        assert!(reg.is_empty());
    }

    #[test]
    fn lookup_matches_exported_id() {
        let mut reg = EntityRegistry::new();
        assert_eq!(reg.register(person(" A1", "Padded")), Registration::Inserted);
        let exported = reg.export();
        assert_eq!(exported[0].id, " A1");
        assert_eq!(reg.get(&exported[0].id).unwrap().name, "Padded");
        assert!(!reg.contains("A1"));
    }

    #[test]
    fn export_is_sorted_and_unique() {
        let mut reg = EntityRegistry::new();
        for (id, name) in [("b", "B"), ("a", "A"), ("c", "C"), ("a", "A2")] {
            reg.register(person(id, name));
        }
        let ids: Vec<_> = reg.export().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let order: Vec<_> = reg.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn merge_keeps_earlier_attributes() {
        let mut early = EntityRegistry::new();
        early.register(person("x", "early"));
        let mut late = EntityRegistry::new();
        late.register(person("x", "late"));
        late.register(person("y", "late"));

        early.merge(late);
        assert_eq!(early.len(), 2);
        assert_eq!(early.get("x").unwrap().name, "early");
        assert_eq!(early.get("y").unwrap().name, "late");
        assert!(early.contains("y"));
    }
}
