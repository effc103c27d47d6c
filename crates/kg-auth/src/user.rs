use kg_core::Epoch;
use kg_core::ID;
use kg_core::Unique;

use crate::Password;

/// Administrative grouping of roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleGroup {
    id: ID<Self>,
    name: String,
}

impl RoleGroup {
    pub fn new(name: &str) -> Self {
        Self {
            id: ID::default(),
            name: name.to_string(),
        }
    }
    pub fn hydrate(id: ID<Self>, name: String) -> Self {
        Self { id, name }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Unique for RoleGroup {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

/// Named permission. Role names are the unit of authorization; policies
/// match on them by exact string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role {
    id: ID<Self>,
    name: String,
    group: ID<RoleGroup>,
}

impl Role {
    pub fn new(name: &str, group: ID<RoleGroup>) -> Self {
        Self {
            id: ID::default(),
            name: name.to_string(),
            group,
        }
    }
    pub fn hydrate(id: ID<Self>, name: String, group: ID<RoleGroup>) -> Self {
        Self { id, name, group }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn group(&self) -> ID<RoleGroup> {
        self.group
    }
}

impl Unique for Role {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

/// Registered identity with credentials, account flags, and login
/// bookkeeping.
///
/// Fields are private; state transitions go through the mutators below
/// so flag pairs stay coherent (confirmation always carries its
/// timestamp, erasure never resurrects credentials).
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: ID<Self>,
    username: String,
    email: String,
    password: Password,
    active: bool,
    confirmed: bool,
    confirmed_at: Option<Epoch>,
    last_login_at: Option<Epoch>,
    last_login_ip: Option<String>,
    login_count: i64,
    erased: bool,
}

impl User {
    /// A fresh identity: active, unconfirmed, never logged in.
    pub fn new(username: &str, email: &str, password: Password) -> Self {
        Self {
            id: ID::default(),
            username: username.to_string(),
            email: email.to_string(),
            password,
            active: true,
            confirmed: false,
            confirmed_at: None,
            last_login_at: None,
            last_login_ip: None,
            login_count: 0,
            erased: false,
        }
    }
    /// Rehydrate a persisted identity, field for field.
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: ID<Self>,
        username: String,
        email: String,
        password: Password,
        active: bool,
        confirmed: bool,
        confirmed_at: Option<Epoch>,
        last_login_at: Option<Epoch>,
        last_login_ip: Option<String>,
        login_count: i64,
        erased: bool,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password,
            active,
            confirmed,
            confirmed_at,
            last_login_at,
            last_login_ip,
            login_count,
            erased,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn password(&self) -> &Password {
        &self.password
    }
    pub fn active(&self) -> bool {
        self.active
    }
    pub fn confirmed(&self) -> bool {
        self.confirmed
    }
    pub fn confirmed_at(&self) -> Option<Epoch> {
        self.confirmed_at
    }
    pub fn last_login_at(&self) -> Option<Epoch> {
        self.last_login_at
    }
    pub fn last_login_ip(&self) -> Option<&str> {
        self.last_login_ip.as_deref()
    }
    pub fn login_count(&self) -> i64 {
        self.login_count
    }
    pub fn erased(&self) -> bool {
        self.erased
    }

    /// Record a successful password login.
    pub fn logged_in(&mut self, ip: Option<&str>) {
        self.last_login_at = Some(kg_core::now());
        self.last_login_ip = ip.map(str::to_string);
        self.login_count += 1;
    }
    pub fn set_active(&mut self) {
        self.active = true;
    }
    pub fn set_inactive(&mut self) {
        self.active = false;
    }
    pub fn set_confirmed(&mut self) {
        self.confirmed = true;
        self.confirmed_at = Some(kg_core::now());
    }
    pub fn set_not_confirmed(&mut self) {
        self.confirmed = false;
        self.confirmed_at = None;
    }
    /// Tombstone the identity. Erased users keep their row for audit but
    /// can never authenticate again.
    pub fn set_erased(&mut self) {
        self.erased = true;
        self.active = false;
    }
    pub fn set_email(&mut self, email: &str) {
        self.email = email.to_string();
    }
    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_string();
    }
    pub fn set_password(&mut self, password: Password) {
        self.password = password;
    }
}

impl Unique for User {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use kg_pg::*;

    /// Membership rows have no domain type of their own; this marker
    /// exists to carry the join table's schema.
    pub struct Membership;

    impl Schema for User {
        fn name() -> &'static str {
            USERS
        }
        fn columns() -> &'static [tokio_postgres::types::Type] {
            &[
                tokio_postgres::types::Type::UUID,
                tokio_postgres::types::Type::VARCHAR,
                tokio_postgres::types::Type::VARCHAR,
                tokio_postgres::types::Type::TEXT,
                tokio_postgres::types::Type::BOOL,
                tokio_postgres::types::Type::BOOL,
                tokio_postgres::types::Type::INT8,
                tokio_postgres::types::Type::INT8,
                tokio_postgres::types::Type::VARCHAR,
                tokio_postgres::types::Type::INT8,
                tokio_postgres::types::Type::BOOL,
            ]
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                USERS,
                " (
                    id              UUID PRIMARY KEY,
                    username        VARCHAR(32) UNIQUE NOT NULL,
                    email           VARCHAR(255) UNIQUE NOT NULL,
                    hashword        TEXT NOT NULL,
                    active          BOOLEAN NOT NULL DEFAULT TRUE,
                    confirmed       BOOLEAN NOT NULL DEFAULT FALSE,
                    confirmed_at    BIGINT,
                    last_login_at   BIGINT,
                    last_login_ip   VARCHAR(64),
                    login_count     BIGINT NOT NULL DEFAULT 0,
                    erased          BOOLEAN NOT NULL DEFAULT FALSE
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_users_username ON ",
                USERS,
                " (username);
                 CREATE INDEX IF NOT EXISTS idx_users_email ON ",
                USERS,
                " (email);"
            )
        }
    }

    impl Schema for RoleGroup {
        fn name() -> &'static str {
            ROLE_GROUPS
        }
        fn columns() -> &'static [tokio_postgres::types::Type] {
            &[
                tokio_postgres::types::Type::UUID,
                tokio_postgres::types::Type::VARCHAR,
            ]
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                ROLE_GROUPS,
                " (
                    id      UUID PRIMARY KEY,
                    name    VARCHAR(64) UNIQUE NOT NULL
                );"
            )
        }
        fn indices() -> &'static str {
            ""
        }
    }

    impl Schema for Role {
        fn name() -> &'static str {
            ROLES
        }
        fn columns() -> &'static [tokio_postgres::types::Type] {
            &[
                tokio_postgres::types::Type::UUID,
                tokio_postgres::types::Type::VARCHAR,
                tokio_postgres::types::Type::UUID,
            ]
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                ROLES,
                " (
                    id          UUID PRIMARY KEY,
                    name        VARCHAR(64) UNIQUE NOT NULL,
                    group_id    UUID NOT NULL REFERENCES ",
                ROLE_GROUPS,
                " (id)
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_roles_name ON ",
                ROLES,
                " (name);"
            )
        }
    }

    impl Schema for Membership {
        fn name() -> &'static str {
            USERS_ROLES
        }
        fn columns() -> &'static [tokio_postgres::types::Type] {
            &[
                tokio_postgres::types::Type::UUID,
                tokio_postgres::types::Type::UUID,
            ]
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                USERS_ROLES,
                " (
                    user_id    UUID NOT NULL REFERENCES ",
                USERS,
                " (id),
                    role_id    UUID NOT NULL REFERENCES ",
                ROLES,
                " (id),
                    PRIMARY KEY (user_id, role_id)
                );"
            )
        }
        fn indices() -> &'static str {
            ""
        }
    }
}

#[cfg(feature = "database")]
pub use schema::Membership;

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn new_user_is_active_and_unconfirmed() {
        let user = User::new("alice", "alice@example.com", Password::new("hunter22").unwrap());
        assert!(user.active());
        assert!(!user.confirmed());
        assert!(!user.erased());
        assert_eq!(user.login_count(), 0);
    }
    #[test]
    fn confirmation_carries_timestamp() {
        let mut user = User::new("alice", "a@b.c", Password::new("hunter22").unwrap());
        user.set_confirmed();
        assert!(user.confirmed());
        assert!(user.confirmed_at().is_some());
        user.set_not_confirmed();
        assert!(!user.confirmed());
        assert!(user.confirmed_at().is_none());
    }
    #[test]
    fn login_bookkeeping_accumulates() {
        let mut user = User::new("alice", "a@b.c", Password::new("hunter22").unwrap());
        user.logged_in(Some("10.0.0.1"));
        user.logged_in(None);
        assert_eq!(user.login_count(), 2);
        assert_eq!(user.last_login_ip(), None);
        assert!(user.last_login_at().is_some());
    }
    #[test]
    fn erasure_deactivates() {
        let mut user = User::new("alice", "a@b.c", Password::new("hunter22").unwrap());
        user.set_erased();
        assert!(user.erased());
        assert!(!user.active());
    }
}
