use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;

use kg_core::ID;
use kg_core::Unique;

use crate::AuthError;
use crate::Role;
use crate::RoleGroup;
use crate::User;

/// Typed identity resolution.
///
/// Each variant states which attribute resolves the identity and what
/// that resolution means for erased records: lookups by id include
/// erased identities (their tombstones must stay addressable so gates
/// can reject them), while lookups by username or email skip erased
/// identities so their attributes read as free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    ById(ID<User>),
    ByUsername(&'a str),
    ByEmail(&'a str),
}

/// Storage contract for identities and their role memberships.
/// Abstracts persistence from domain modules; uniqueness violations
/// surface as [`AuthError::Conflict`] already translated.
#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    /// Resolve one identity, or `None`, per [`Lookup`] semantics.
    async fn find(&self, lookup: Lookup<'_>) -> Result<Option<User>, AuthError>;
    /// Persist a new identity. Duplicate username or email is a conflict.
    async fn create(&self, user: &User) -> Result<(), AuthError>;
    /// Persist updated fields of an existing identity. An update that
    /// collides with another identity's username or email is a conflict.
    async fn save(&self, user: &User) -> Result<(), AuthError>;
    /// Resolve a role definition by name.
    async fn role_of(&self, name: &str) -> Result<Option<Role>, AuthError>;
    /// The identity's current role names, read live from storage.
    async fn roles_of(&self, user: ID<User>) -> Result<HashSet<String>, AuthError>;
    /// Grant a role by name. Unknown role is [`AuthError::NotFound`];
    /// a role already held is a conflict.
    async fn grant(&self, user: ID<User>, role: &str) -> Result<(), AuthError>;
    /// Revoke a role by name. A role not held is a bad request; removing
    /// the identity's last role is an invalid state.
    async fn revoke(&self, user: ID<User>, role: &str) -> Result<(), AuthError>;
    /// Define a new role within a group.
    async fn create_role(&self, role: &Role) -> Result<(), AuthError>;
    /// Define a new role group.
    async fn create_group(&self, group: &RoleGroup) -> Result<(), AuthError>;
}

/// In-memory [`IdentityStore`] for tests and single-process use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<ID<User>, User>,
    groups: HashMap<String, RoleGroup>,
    roles: HashMap<String, Role>,
    members: HashMap<ID<User>, HashSet<String>>,
}

impl Inner {
    fn taken(&self, user: &User) -> bool {
        self.users
            .values()
            .filter(|u| u.id() != user.id())
            .filter(|u| !u.erased())
            .any(|u| u.username() == user.username() || u.email() == user.email())
    }
}

impl IdentityStore for MemoryStore {
    async fn find(&self, lookup: Lookup<'_>) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(match lookup {
            Lookup::ById(id) => inner.users.get(&id).cloned(),
            Lookup::ByUsername(name) => inner
                .users
                .values()
                .filter(|u| !u.erased())
                .find(|u| u.username() == name)
                .cloned(),
            Lookup::ByEmail(email) => inner
                .users
                .values()
                .filter(|u| !u.erased())
                .find(|u| u.email() == email)
                .cloned(),
        })
    }

    async fn create(&self, user: &User) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.taken(user) {
            return Err(AuthError::Conflict);
        }
        inner.users.insert(user.id(), user.clone());
        inner.members.entry(user.id()).or_default();
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("store lock");
        if !inner.users.contains_key(&user.id()) {
            return Err(AuthError::NotFound);
        }
        if inner.taken(user) {
            return Err(AuthError::Conflict);
        }
        inner.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn role_of(&self, name: &str) -> Result<Option<Role>, AuthError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.roles.get(name).cloned())
    }

    async fn roles_of(&self, user: ID<User>) -> Result<HashSet<String>, AuthError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.members.get(&user).cloned().unwrap_or_default())
    }

    async fn grant(&self, user: ID<User>, role: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("store lock");
        if !inner.roles.contains_key(role) {
            return Err(AuthError::NotFound);
        }
        let held = inner.members.entry(user).or_default();
        if !held.insert(role.to_string()) {
            return Err(AuthError::Conflict);
        }
        Ok(())
    }

    async fn revoke(&self, user: ID<User>, role: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("store lock");
        let held = inner.members.entry(user).or_default();
        if !held.contains(role) {
            return Err(AuthError::bad("role not assigned"));
        }
        if held.len() == 1 {
            return Err(AuthError::InvalidState("cannot remove last role"));
        }
        held.remove(role);
        Ok(())
    }

    async fn create_role(&self, role: &Role) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.roles.contains_key(role.name()) {
            return Err(AuthError::Conflict);
        }
        inner.roles.insert(role.name().to_string(), role.clone());
        Ok(())
    }

    async fn create_group(&self, group: &RoleGroup) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.groups.contains_key(group.name()) {
            return Err(AuthError::Conflict);
        }
        inner.groups.insert(group.name().to_string(), group.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Password;

    fn user(name: &str, email: &str) -> User {
        User::new(name, email, Password::new("hunter22").unwrap())
    }

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::default();
        let group = RoleGroup::new("general");
        store.create_group(&group).await.unwrap();
        store.create_role(&Role::new("user", group.id())).await.unwrap();
        store.create_role(&Role::new("admin", group.id())).await.unwrap();
        let alice = user("alice", "alice@example.com");
        store.create(&alice).await.unwrap();
        (store, alice)
    }

    #[tokio::test]
    async fn erased_users_hide_from_attribute_lookups() {
        let (store, mut alice) = seeded().await;
        alice.set_erased();
        store.save(&alice).await.unwrap();
        assert!(store.find(Lookup::ByUsername("alice")).await.unwrap().is_none());
        assert!(store.find(Lookup::ByEmail("alice@example.com")).await.unwrap().is_none());
        let found = store.find(Lookup::ById(alice.id())).await.unwrap().unwrap();
        assert!(found.erased());
    }

    #[tokio::test]
    async fn duplicate_identity_conflicts() {
        let (store, _) = seeded().await;
        let dup = user("alice", "other@example.com");
        assert_eq!(store.create(&dup).await, Err(AuthError::Conflict));
        let dup = user("other", "alice@example.com");
        assert_eq!(store.create(&dup).await, Err(AuthError::Conflict));
    }

    #[tokio::test]
    async fn save_collision_conflicts() {
        let (store, _) = seeded().await;
        let mut bob = user("bob", "bob@example.com");
        store.create(&bob).await.unwrap();
        bob.set_email("alice@example.com");
        assert_eq!(store.save(&bob).await, Err(AuthError::Conflict));
    }

    #[tokio::test]
    async fn grant_and_revoke_enforce_membership_rules() {
        let (store, alice) = seeded().await;
        store.grant(alice.id(), "user").await.unwrap();
        assert_eq!(store.grant(alice.id(), "user").await, Err(AuthError::Conflict));
        assert_eq!(store.grant(alice.id(), "nosuch").await, Err(AuthError::NotFound));
        assert_eq!(
            store.revoke(alice.id(), "user").await,
            Err(AuthError::InvalidState("cannot remove last role")),
        );
        store.grant(alice.id(), "admin").await.unwrap();
        store.revoke(alice.id(), "user").await.unwrap();
        assert_eq!(
            store.revoke(alice.id(), "user").await,
            Err(AuthError::bad("role not assigned")),
        );
        let roles = store.roles_of(alice.id()).await.unwrap();
        assert_eq!(roles, HashSet::from(["admin".to_string()]));
    }
}
