//! TOML-backed entity store: an in-memory reference backend and ability
//! oracle for the command line and tests.
//!
//! ```toml
//! admins = ["root"]
//!
//! [[scopes]]
//! full_path = "acme/app"
//! id = 10
//! kind = "project"
//! visibility = "private"
//! members = ["alice"]
//!
//! [[entities]]
//! kind = "issue"
//! id = 501
//! key = "123"
//! scope = "acme/app"
//! title = "Crash on start"
//! confidential = true
//! author = "alice"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::backend::{AbilityOracle, ReferenceBackend};
use crate::context::UserRef;
use crate::error::Error;
use crate::types::{Entity, EntityRef, ReferenceType, ScopeKind, ScopePath};

/// Shortest commit prefix the store will match.
const MIN_SHA_PREFIX: usize = 7;

/// Who can see a scope's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Members only (membership is inherited from enclosing groups).
    Private,
    /// Everyone, including anonymous readers.
    #[default]
    Public,
}

/// A project or group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scope {
    /// Full slash-separated path.
    pub full_path: ScopePath,
    /// Opaque id.
    pub id: u64,
    /// Project or group.
    pub kind: ScopeKind,
    /// Usernames with access.
    #[serde(default)]
    pub members: Vec<String>,
    /// Defaults to public.
    #[serde(default)]
    pub visibility: Visibility,
}

/// The store as a whole. Constructed only via `parse()` or `read()`,
/// which reject duplicates and dangling scopes.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityStore {
    /// Usernames that can read everything.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Issues, merge requests, labels, users and the rest.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Projects and groups.
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl EntityStore {
    /// Parse a store from TOML content and link entities to their scopes.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the content is not valid TOML, or
    /// `Error::StoreCorrupt` on duplicate scopes or entities, or an entity
    /// whose scope is not declared.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let mut store: Self = toml::from_str(content)?;
        store.link_scopes()?;
        return Ok(store);
    }

    /// Read and parse a store from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreNotFound` if the file doesn't exist,
    /// `Error::Io` for other read failures, and the errors of [`Self::parse`].
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::StoreNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Validate uniqueness and fill each entity's scope id and kind.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreCorrupt` describing the first inconsistency.
    fn link_scopes(&mut self) -> Result<(), Error> {
        let mut paths = HashSet::new();
        for scope in &self.scopes {
            if !paths.insert(scope.full_path.clone()) {
                return Err(Error::StoreCorrupt {
                    reason: format!("scope `{}` declared twice", scope.full_path),
                });
            }
        }

        let mut seen = HashSet::new();
        for entity in &mut self.entities {
            if !seen.insert(entity.reference()) {
                return Err(Error::StoreCorrupt {
                    reason: format!("{} {} declared twice", entity.kind, entity.id),
                });
            }
            if entity.kind == ReferenceType::User {
                if !entity.scope.is_global() {
                    return Err(Error::StoreCorrupt {
                        reason: format!("user `{}` must not have a scope", entity.key),
                    });
                }
                continue;
            }
            let Some(scope) = self.scopes.iter().find(|s| s.full_path == entity.scope) else {
                return Err(Error::StoreCorrupt {
                    reason: format!("{} {} names unknown scope `{}`", entity.kind, entity.id, entity.scope),
                });
            };
            entity.scope_id = scope.id;
            entity.scope_kind = scope.kind;
        }
        return Ok(());
    }

    /// The declared scope at `path`.
    fn scope(&self, path: &ScopePath) -> Option<&Scope> {
        return self.scopes.iter().find(|s| &s.full_path == path);
    }

    /// The scope and its declared ancestors, nearest first.
    fn scope_chain<'s>(&'s self, path: &'s ScopePath) -> impl Iterator<Item = &'s Scope> + 's {
        return std::iter::once(path.clone())
            .chain(path.ancestors())
            .filter_map(move |p| self.scope(&p));
    }

    /// Whether `username` is a member of `path` or any declared ancestor.
    fn is_member(&self, username: &str, path: &ScopePath) -> bool {
        return self.scope_chain(path).any(|s| s.members.iter().any(|m| m == username));
    }

    /// Entities of `kind` in exactly `scope` matching `token`.
    fn find_in(&self, kind: ReferenceType, scope: &ScopePath, token: &str) -> Option<&Entity> {
        let mut candidates = self
            .entities
            .iter()
            .filter(|e| e.kind == kind && &e.scope == scope);
        return match kind {
            ReferenceType::Commit => {
                if token.len() < MIN_SHA_PREFIX {
                    return None;
                }
                let matches: Vec<&Entity> = candidates.filter(|e| e.key.starts_with(token)).collect();
                // Ambiguous prefixes resolve to nothing.
                match matches.as_slice() {
                    [only] => Some(*only),
                    _ => None,
                }
            },
            ReferenceType::Label => candidates.find(|e| e.title == token || e.key == token || e.id.to_string() == token),
            ReferenceType::Milestone => candidates.find(|e| e.key == token || e.title == token),
            ReferenceType::Issue | ReferenceType::MergeRequest | ReferenceType::Snippet => {
                candidates.find(|e| e.key == token)
            },
            ReferenceType::User => None,
        };
    }

    /// Resolve one token. Labels and milestones are inherited from
    /// enclosing groups; users are global and matched case-insensitively.
    fn find(&self, kind: ReferenceType, scope: &ScopePath, token: &str) -> Option<&Entity> {
        return match kind {
            ReferenceType::User => self
                .entities
                .iter()
                .find(|e| e.kind == ReferenceType::User && e.key.eq_ignore_ascii_case(token)),
            ReferenceType::Label | ReferenceType::Milestone => std::iter::once(scope.clone())
                .chain(scope.ancestors())
                .find_map(|s| self.find_in(kind, &s, token)),
            _ => self.find_in(kind, scope, token),
        };
    }
}

impl ReferenceBackend for EntityStore {
    fn resolve_entities(
        &self,
        kind: ReferenceType,
        scope: &ScopePath,
        tokens: &[String],
    ) -> HashMap<String, Option<Entity>> {
        return tokens
            .iter()
            .map(|token| (token.clone(), self.find(kind, scope, token).cloned()))
            .collect();
    }

    fn entities_by_ref(&self, refs: &[EntityRef]) -> Vec<Entity> {
        return self
            .entities
            .iter()
            .filter(|e| refs.contains(&e.reference()))
            .cloned()
            .collect();
    }
}

impl AbilityOracle for EntityStore {
    fn can_read_reference(&self, user: Option<&UserRef>, entity: &Entity) -> bool {
        let username = user.map(|u| u.username.as_str());
        if username.is_some_and(|name| self.admins.iter().any(|a| a == name)) {
            return true;
        }
        if entity.kind == ReferenceType::User {
            return true;
        }
        if self.scope(&entity.scope).is_none() {
            return false;
        }

        let member = username.is_some_and(|name| self.is_member(name, &entity.scope));
        let private = self.scope_chain(&entity.scope).any(|s| s.visibility == Visibility::Private);
        if private && !member {
            return false;
        }
        if !entity.confidential {
            return true;
        }
        let Some(name) = username else {
            return false;
        };
        return member
            || entity.author.as_deref() == Some(name)
            || entity.assignees.iter().any(|a| a == name);
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

    const STORE: &str = r##"
admins = ["root"]

[[scopes]]
full_path = "acme"
id = 1
kind = "group"
members = ["mallory"]

[[scopes]]
full_path = "acme/app"
id = 10
kind = "project"
members = ["carol"]

[[scopes]]
full_path = "acme/secret"
id = 11
kind = "project"
visibility = "private"

[[entities]]
kind = "issue"
id = 501
key = "123"
scope = "acme/app"
title = "Crash on start"
confidential = true
author = "alice"
assignees = ["bob"]

[[entities]]
kind = "label"
id = 7
key = "bug"
title = "bug"
color = "#ff0000"
scope = "acme"

[[entities]]
kind = "commit"
id = 9
key = "0123456789abcdef0123456789abcdef01234567"
scope = "acme/app"

[[entities]]
kind = "commit"
id = 10
key = "0123456fffffffff0123456789abcdef01234567"
scope = "acme/app"

[[entities]]
kind = "issue"
id = 600
key = "1"
scope = "acme/secret"

[[entities]]
kind = "user"
id = 2
key = "Alice"
"##;

    fn user(name: &str) -> UserRef {
        UserRef {
            id: 0,
            username: name.to_string(),
        }
    }

    fn store() -> EntityStore {
        return EntityStore::parse(STORE).unwrap();
    }

    fn resolve(store: &EntityStore, kind: ReferenceType, scope: &str, token: &str) -> Option<u64> {
        let tokens = vec![token.to_string()];
        return store.resolve_entities(kind, &ScopePath::new(scope), &tokens)[token]
            .as_ref()
            .map(|e| e.id);
    }

    #[test]
    fn entities_take_their_scope_ids() {
        let store = store();
        let issue = store.entities.iter().find(|e| e.id == 501).unwrap();
        assert_eq!(issue.scope_id, 10);
        assert_eq!(issue.scope_kind, ScopeKind::Project);
    }

    #[test]
    fn labels_inherit_from_groups() {
        assert_eq!(resolve(&store(), ReferenceType::Label, "acme/app", "bug"), Some(7));
        assert_eq!(resolve(&store(), ReferenceType::Label, "acme/app", "7"), Some(7));
        assert_eq!(resolve(&store(), ReferenceType::Label, "other/app", "bug"), None);
    }

    #[test]
    fn commits_match_unique_prefixes() {
        let store = store();
        assert_eq!(resolve(&store, ReferenceType::Commit, "acme/app", "01234567"), Some(9));
        assert_eq!(resolve(&store, ReferenceType::Commit, "acme/app", "0123456"), None);
        assert_eq!(resolve(&store, ReferenceType::Commit, "acme/app", "012345"), None);
    }

    #[test]
    fn users_match_case_insensitively() {
        assert_eq!(resolve(&store(), ReferenceType::User, "", "alice"), Some(2));
    }

    #[test]
    fn confidential_issue_visibility() {
        let store = store();
        let issue = store.entities.iter().find(|e| e.id == 501).unwrap().clone();
        for reader in ["alice", "bob", "carol", "mallory", "root"] {
            assert!(store.can_read_reference(Some(&user(reader)), &issue), "{reader}");
        }
        assert!(!store.can_read_reference(Some(&user("eve")), &issue));
        assert!(!store.can_read_reference(None, &issue));
    }

    #[test]
    fn private_projects_need_membership() {
        let store = store();
        let issue = store.entities.iter().find(|e| e.id == 600).unwrap().clone();
        assert!(!store.can_read_reference(Some(&user("carol")), &issue));
        assert!(store.can_read_reference(Some(&user("mallory")), &issue));
    }

    #[test]
    fn duplicate_entities_are_rejected() {
        let doubled = format!("{STORE}\n[[entities]]\nkind = \"issue\"\nid = 501\nkey = \"9\"\nscope = \"acme/app\"\n");
        assert!(matches!(EntityStore::parse(&doubled), Err(Error::StoreCorrupt { .. })));
    }

    #[test]
    fn dangling_scopes_are_rejected() {
        let content = "[[entities]]\nkind = \"issue\"\nid = 1\nkey = \"1\"\nscope = \"nowhere/x\"\n";
        assert!(matches!(EntityStore::parse(content), Err(Error::StoreCorrupt { .. })));
    }

    #[test]
    fn missing_file_is_store_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = EntityStore::read(&dir.path().join("store.toml")).unwrap_err();
        assert!(matches!(err, Error::StoreNotFound { .. }));
    }
}
