//! Per-run memoization of reference lookups.
//!
//! One cache belongs to one pipeline run (or to one logical request when the
//! caller passes it explicitly). It is never global, so authorization-dependent
//! results cannot leak between requests.

use std::collections::HashMap;

use crate::types::{Entity, EntityRef, ReferenceType, ScopePath};

/// Memo key: reference type, scope and raw token.
type LookupKey = (ReferenceType, ScopePath, String);

/// Memoized `(type, scope, token) -> entity` results, including misses.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    /// Batched backend lookups made through this cache.
    backend_calls: usize,
    /// Every entity a lookup returned, by identity.
    entities: HashMap<EntityRef, Entity>,
    /// Hits and misses per token.
    lookups: HashMap<LookupKey, Option<EntityRef>>,
}

impl ResolutionCache {
    /// An empty cache.
    pub fn new() -> Self {
        return Self::default();
    }

    /// The memoized result for a token: `None` if never looked up,
    /// `Some(None)` if looked up and not found.
    pub fn lookup(&self, kind: ReferenceType, scope: &ScopePath, token: &str) -> Option<Option<&Entity>> {
        let key = (kind, scope.clone(), token.to_string());
        let hit = self.lookups.get(&key)?;
        return Some(hit.as_ref().and_then(|r| self.entities.get(r)));
    }

    /// Whether the token has a memoized result, found or not.
    pub fn contains(&self, kind: ReferenceType, scope: &ScopePath, token: &str) -> bool {
        return self.lookups.contains_key(&(kind, scope.clone(), token.to_string()));
    }

    /// Memoize one lookup result.
    pub fn store(&mut self, kind: ReferenceType, scope: &ScopePath, token: &str, entity: Option<Entity>) {
        let reference = entity.as_ref().map(Entity::reference);
        if let Some(entity) = entity {
            self.entities.insert(entity.reference(), entity);
        }
        self.lookups.insert((kind, scope.clone(), token.to_string()), reference);
    }

    /// An entity seen by any lookup in this run.
    pub fn entity(&self, reference: &EntityRef) -> Option<&Entity> {
        return self.entities.get(reference);
    }

    /// Remember an entity loaded by identity.
    pub fn insert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.reference(), entity);
    }

    /// Count one batched backend call.
    pub fn note_backend_call(&mut self) {
        self.backend_calls = self.backend_calls.saturating_add(1);
    }

    /// Backend calls made through this cache.
    pub const fn backend_calls(&self) -> usize {
        return self.backend_calls;
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests fail by panicking"
)]
mod tests {
    use super::*;

    fn issue(id: u64) -> Entity {
        Entity {
            assignees: Vec::new(),
            author: None,
            color: None,
            confidential: false,
            id,
            key: id.to_string(),
            kind: ReferenceType::Issue,
            scope: ScopePath::new("a/b"),
            scope_id: 1,
            scope_kind: crate::types::ScopeKind::Project,
            title: String::new(),
        }
    }

    #[test]
    fn misses_are_cached() {
        let mut cache = ResolutionCache::new();
        let scope = ScopePath::new("a/b");
        assert!(cache.lookup(ReferenceType::Issue, &scope, "9").is_none());
        cache.store(ReferenceType::Issue, &scope, "9", None);
        assert_eq!(cache.lookup(ReferenceType::Issue, &scope, "9"), Some(None));
    }

    #[test]
    fn hits_resolve_to_entities() {
        let mut cache = ResolutionCache::new();
        let scope = ScopePath::new("a/b");
        cache.store(ReferenceType::Issue, &scope, "1", Some(issue(1)));
        let hit = cache.lookup(ReferenceType::Issue, &scope, "1").flatten().unwrap();
        assert_eq!(hit.id, 1);
        assert!(!cache.contains(ReferenceType::MergeRequest, &scope, "1"));
    }
}
