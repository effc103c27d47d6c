use std::collections::HashSet;
use std::sync::Arc;

use kg_core::ID;
use kg_core::Unique;
use kg_pg::*;
use tokio_postgres::Client;
use tokio_postgres::Row;

use crate::AuthError;
use crate::IdentityStore;
use crate::Lookup;
use crate::Membership;
use crate::Password;
use crate::Role;
use crate::RoleGroup;
use crate::User;

/// Translate a persistence fault into the domain taxonomy. Uniqueness
/// violations are the one database error callers can act on.
fn translate(e: PgErr) -> AuthError {
    match e.code() {
        Some(code) if code.code() == UNIQUE_VIOLATION => AuthError::Conflict,
        _ => AuthError::Store(e.to_string()),
    }
}

fn hydrate(row: &Row) -> User {
    User::hydrate(
        ID::from(row.get::<_, uuid::Uuid>(0)),
        row.get(1),
        row.get(2),
        Password::from_hash(row.get(3)),
        row.get(4),
        row.get(5),
        row.get(6),
        row.get(7),
        row.get(8),
        row.get(9),
        row.get(10),
    )
}

const USER_COLUMNS: &str = "id, username, email, hashword, active, confirmed, \
    confirmed_at, last_login_at, last_login_ip, login_count, erased";

/// Create the auth tables and indices if absent.
pub async fn migrate(client: &Client) -> Result<(), AuthError> {
    for ddl in [
        <RoleGroup as Schema>::creates(),
        <Role as Schema>::creates(),
        <User as Schema>::creates(),
        <Membership as Schema>::creates(),
        <Role as Schema>::indices(),
        <User as Schema>::indices(),
    ] {
        client.batch_execute(ddl).await.map_err(translate)?;
    }
    log::info!("auth schema ready");
    Ok(())
}

impl IdentityStore for Arc<Client> {
    async fn find(&self, lookup: Lookup<'_>) -> Result<Option<User>, AuthError> {
        let row = match lookup {
            Lookup::ById(id) => {
                self.query_opt(
                    const_format::concatcp!(
                        "SELECT ",
                        USER_COLUMNS,
                        " FROM ",
                        USERS,
                        " WHERE id = $1"
                    ),
                    &[&id.inner()],
                )
                .await
            }
            Lookup::ByUsername(username) => {
                self.query_opt(
                    const_format::concatcp!(
                        "SELECT ",
                        USER_COLUMNS,
                        " FROM ",
                        USERS,
                        " WHERE username = $1 AND erased = FALSE"
                    ),
                    &[&username],
                )
                .await
            }
            Lookup::ByEmail(email) => {
                self.query_opt(
                    const_format::concatcp!(
                        "SELECT ",
                        USER_COLUMNS,
                        " FROM ",
                        USERS,
                        " WHERE email = $1 AND erased = FALSE"
                    ),
                    &[&email],
                )
                .await
            }
        };
        row.map(|opt| opt.as_ref().map(hydrate)).map_err(translate)
    }

    async fn create(&self, user: &User) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                USERS,
                " (",
                USER_COLUMNS,
                ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            ),
            &[
                &user.id().inner(),
                &user.username(),
                &user.email(),
                &user.password().hash(),
                &user.active(),
                &user.confirmed(),
                &user.confirmed_at(),
                &user.last_login_at(),
                &user.last_login_ip(),
                &user.login_count(),
                &user.erased(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(translate)
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        let updated = self
            .execute(
                const_format::concatcp!(
                    "UPDATE ",
                    USERS,
                    " SET username = $2, email = $3, hashword = $4, active = $5, \
                       confirmed = $6, confirmed_at = $7, last_login_at = $8, \
                       last_login_ip = $9, login_count = $10, erased = $11 \
                     WHERE id = $1"
                ),
                &[
                    &user.id().inner(),
                    &user.username(),
                    &user.email(),
                    &user.password().hash(),
                    &user.active(),
                    &user.confirmed(),
                    &user.confirmed_at(),
                    &user.last_login_at(),
                    &user.last_login_ip(),
                    &user.login_count(),
                    &user.erased(),
                ],
            )
            .await
            .map_err(translate)?;
        match updated {
            0 => Err(AuthError::NotFound),
            _ => Ok(()),
        }
    }

    async fn role_of(&self, name: &str) -> Result<Option<Role>, AuthError> {
        self.query_opt(
            const_format::concatcp!("SELECT id, name, group_id FROM ", ROLES, " WHERE name = $1"),
            &[&name],
        )
        .await
        .map(|opt| {
            opt.map(|row| {
                Role::hydrate(
                    ID::from(row.get::<_, uuid::Uuid>(0)),
                    row.get(1),
                    ID::from(row.get::<_, uuid::Uuid>(2)),
                )
            })
        })
        .map_err(translate)
    }

    async fn roles_of(&self, user: ID<User>) -> Result<HashSet<String>, AuthError> {
        self.query(
            const_format::concatcp!(
                "SELECT r.name FROM ",
                ROLES,
                " r JOIN ",
                USERS_ROLES,
                " ur ON ur.role_id = r.id WHERE ur.user_id = $1"
            ),
            &[&user.inner()],
        )
        .await
        .map(|rows| rows.iter().map(|row| row.get(0)).collect())
        .map_err(translate)
    }

    async fn grant(&self, user: ID<User>, role: &str) -> Result<(), AuthError> {
        let role = self.role_of(role).await?.ok_or(AuthError::NotFound)?;
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                USERS_ROLES,
                " (user_id, role_id) VALUES ($1, $2)"
            ),
            &[&user.inner(), &role.id().inner()],
        )
        .await
        .map(|_| ())
        .map_err(translate)
    }

    async fn revoke(&self, user: ID<User>, role: &str) -> Result<(), AuthError> {
        let held = self.roles_of(user).await?;
        if !held.contains(role) {
            return Err(AuthError::bad("role not assigned"));
        }
        if held.len() == 1 {
            return Err(AuthError::InvalidState("cannot remove last role"));
        }
        self.execute(
            const_format::concatcp!(
                "DELETE FROM ",
                USERS_ROLES,
                " WHERE user_id = $1 AND role_id = (SELECT id FROM ",
                ROLES,
                " WHERE name = $2)"
            ),
            &[&user.inner(), &role],
        )
        .await
        .map(|_| ())
        .map_err(translate)
    }

    async fn create_role(&self, role: &Role) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                ROLES,
                " (id, name, group_id) VALUES ($1, $2, $3)"
            ),
            &[&role.id().inner(), &role.name(), &role.group().inner()],
        )
        .await
        .map(|_| ())
        .map_err(translate)
    }

    async fn create_group(&self, group: &RoleGroup) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!("INSERT INTO ", ROLE_GROUPS, " (id, name) VALUES ($1, $2)"),
            &[&group.id().inner(), &group.name()],
        )
        .await
        .map(|_| ())
        .map_err(translate)
    }
}
