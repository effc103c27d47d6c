use std::collections::HashSet;

use kg_core::Unique;

use crate::AuthConfig;
use crate::AuthError;
use crate::Claim;
use crate::Crypto;
use crate::IdentityStore;
use crate::Lookup;
use crate::User;

/// Inbound credential, already extracted from the transport layer.
#[derive(Debug, Clone)]
pub enum Credential {
    /// A bearer session token.
    Token(String),
    /// Password login by email or username. Email takes precedence when
    /// both are present.
    Password {
        username: Option<String>,
        email: Option<String>,
        password: String,
    },
}

/// The product of successful authentication: the resolved identity, its
/// role names read live from storage, and how it authenticated.
///
/// Carried explicitly through request handling; nothing here lives in
/// ambient global state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    user: User,
    roles: HashSet<String>,
    token_used: bool,
    ip: Option<String>,
}

impl AuthContext {
    pub fn user(&self) -> &User {
        &self.user
    }
    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }
    /// Whether this context came from a token rather than a password.
    pub fn token_used(&self) -> bool {
        self.token_used
    }
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }
    pub fn into_user(self) -> User {
        self.user
    }
}

/// Resolves credentials to an [`AuthContext`]: extract, resolve, gate,
/// bind. All rejections on this path are [`AuthError::Unauthorized`];
/// the specific token failure is logged but never returned.
pub struct Authenticator<'c> {
    crypto: &'c Crypto,
    config: &'c AuthConfig,
}

impl<'c> Authenticator<'c> {
    pub fn new(crypto: &'c Crypto, config: &'c AuthConfig) -> Self {
        Self { crypto, config }
    }

    pub async fn authenticate<S>(
        &self,
        store: &S,
        credential: Credential,
        ip: Option<&str>,
    ) -> Result<AuthContext, AuthError>
    where
        S: IdentityStore,
    {
        let token_used = matches!(credential, Credential::Token(_));
        let mut user = match credential {
            Credential::Token(token) => self.resolve_token(store, &token).await?,
            Credential::Password {
                username,
                email,
                password,
            } => {
                self.resolve_password(store, username.as_deref(), email.as_deref(), &password)
                    .await?
            }
        };
        self.gate(&user)?;
        if !token_used {
            user.logged_in(ip);
            store.save(&user).await?;
            log::info!("{} logged in", user.username());
        }
        let roles = store.roles_of(user.id()).await?;
        Ok(AuthContext {
            user,
            roles,
            token_used,
            ip: ip.map(str::to_string),
        })
    }

    async fn resolve_token<S>(&self, store: &S, token: &str) -> Result<User, AuthError>
    where
        S: IdentityStore,
    {
        let claims = self.crypto.verify(token).map_err(|e| {
            log::warn!("token rejected ({}): {}", e, Crypto::digest(token));
            e.public()
        })?;
        let id = match claims.claim {
            Claim::Session { id } => id.into(),
            _ => {
                log::warn!("non-session token presented as credential");
                return Err(AuthError::Unauthorized);
            }
        };
        store
            .find(Lookup::ById(id))
            .await?
            .ok_or(AuthError::IdentityNotFound.public())
    }

    /// Lookup by email first, falling back to username on a miss.
    /// Resolution only; login bookkeeping happens after the gates pass.
    async fn resolve_password<S>(
        &self,
        store: &S,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<User, AuthError>
    where
        S: IdentityStore,
    {
        if email.is_none() && username.is_none() {
            return Err(AuthError::Unauthorized);
        }
        let mut found = None;
        if let Some(email) = email {
            found = store.find(Lookup::ByEmail(email)).await?;
        }
        if found.is_none() {
            if let Some(username) = username {
                found = store.find(Lookup::ByUsername(username)).await?;
            }
        }
        let user = found.ok_or(AuthError::Unauthorized)?;
        if !user.password().verify(password) {
            log::warn!("password rejected for {}", user.username());
            return Err(AuthError::Unauthorized);
        }
        Ok(user)
    }

    /// Account-state gates applied to both credential paths.
    fn gate(&self, user: &User) -> Result<(), AuthError> {
        if user.erased() || !user.active() {
            log::warn!("rejected disabled account {}", user.username());
            return Err(AuthError::Unauthorized);
        }
        if self.config.confirm_required && !user.confirmed() {
            log::warn!("rejected unconfirmed account {}", user.username());
            return Err(AuthError::Unauthorized);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use crate::Password;
    use kg_core::ID;

    fn fixtures() -> (Crypto, AuthConfig, MemoryStore) {
        (Crypto::new(b"test-secret"), AuthConfig::default(), MemoryStore::default())
    }

    async fn alice(store: &MemoryStore) -> User {
        let user = User::new("alice", "alice@example.com", Password::new("hunter22").unwrap());
        store.create(&user).await.unwrap();
        user
    }

    fn password(username: Option<&str>, email: Option<&str>, password: &str) -> Credential {
        Credential::Password {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn password_login_binds_and_bookkeeps() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        alice(&store).await;
        let credential = password(Some("alice"), None, "hunter22");
        let context = auth.authenticate(&store, credential, Some("10.0.0.1")).await.unwrap();
        assert!(!context.token_used());
        assert_eq!(context.user().login_count(), 1);
        assert_eq!(context.user().last_login_ip(), Some("10.0.0.1"));
        let saved = store
            .find(Lookup::ByUsername("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.login_count(), 1);
    }

    #[tokio::test]
    async fn email_takes_precedence_over_username() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        alice(&store).await;
        let bob = User::new("bob", "bob@example.com", Password::new("letmein8").unwrap());
        store.create(&bob).await.unwrap();
        let credential = password(Some("alice"), Some("bob@example.com"), "letmein8");
        let context = auth.authenticate(&store, credential, None).await.unwrap();
        assert_eq!(context.user().username(), "bob");
    }

    #[tokio::test]
    async fn email_miss_falls_back_to_username() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        alice(&store).await;
        let credential = password(Some("alice"), Some("stale@example.com"), "hunter22");
        let context = auth.authenticate(&store, credential, None).await.unwrap();
        assert_eq!(context.user().username(), "alice");
        let credential = password(None, Some("stale@example.com"), "hunter22");
        assert_eq!(
            auth.authenticate(&store, credential, None).await.unwrap_err(),
            AuthError::Unauthorized,
        );
    }

    #[tokio::test]
    async fn gated_rejection_persists_no_bookkeeping() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        let mut user = alice(&store).await;
        user.set_inactive();
        store.save(&user).await.unwrap();
        let credential = password(Some("alice"), None, "hunter22");
        let err = auth
            .authenticate(&store, credential, Some("10.0.0.1"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized);
        let saved = store.find(Lookup::ById(user.id())).await.unwrap().unwrap();
        assert_eq!(saved.login_count(), 0);
        assert!(saved.last_login_at().is_none());
    }

    #[tokio::test]
    async fn token_login_skips_bookkeeping() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        let user = alice(&store).await;
        let token = crypto.sign(Claim::session(user.id()), 60).unwrap();
        let context = auth
            .authenticate(&store, Credential::Token(token), None)
            .await
            .unwrap();
        assert!(context.token_used());
        assert_eq!(context.user().login_count(), 0);
    }

    #[tokio::test]
    async fn wrong_purpose_token_is_unauthorized() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        let user = alice(&store).await;
        let token = crypto.sign(Claim::reset(user.id()), 60).unwrap();
        let err = auth
            .authenticate(&store, Credential::Token(token), None)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized);
    }

    #[tokio::test]
    async fn failures_are_uniform() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        alice(&store).await;
        let cases = [
            password(Some("alice"), None, "wrong-password"),
            password(Some("nobody"), None, "hunter22"),
            password(None, None, "hunter22"),
            Credential::Token("garbage".to_string()),
            Credential::Token(
                crypto
                    .sign(Claim::session(ID::default()), 60)
                    .unwrap(),
            ),
        ];
        for credential in cases {
            let err = auth.authenticate(&store, credential, None).await.unwrap_err();
            assert_eq!(err, AuthError::Unauthorized);
        }
    }

    #[tokio::test]
    async fn gates_apply_to_both_paths() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        let mut user = alice(&store).await;
        user.set_inactive();
        store.save(&user).await.unwrap();
        let token = crypto.sign(Claim::session(user.id()), 60).unwrap();
        for credential in [
            password(Some("alice"), None, "hunter22"),
            Credential::Token(token),
        ] {
            let err = auth.authenticate(&store, credential, None).await.unwrap_err();
            assert_eq!(err, AuthError::Unauthorized);
        }
    }

    #[tokio::test]
    async fn confirmation_gate_is_configurable() {
        let (crypto, mut config, store) = fixtures();
        config.confirm_required = true;
        let auth = Authenticator::new(&crypto, &config);
        let mut user = alice(&store).await;
        let credential = password(Some("alice"), None, "hunter22");
        let err = auth
            .authenticate(&store, credential.clone(), None)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Unauthorized);
        user.set_confirmed();
        store.save(&user).await.unwrap();
        assert!(auth.authenticate(&store, credential, None).await.is_ok());
    }

    #[tokio::test]
    async fn roles_are_read_live() {
        let (crypto, config, store) = fixtures();
        let auth = Authenticator::new(&crypto, &config);
        let user = alice(&store).await;
        let group = crate::RoleGroup::new("general");
        store.create_group(&group).await.unwrap();
        store
            .create_role(&crate::Role::new("admin", group.id()))
            .await
            .unwrap();
        let token = crypto.sign(Claim::session(user.id()), 60).unwrap();
        let before = auth
            .authenticate(&store, Credential::Token(token.clone()), None)
            .await
            .unwrap();
        assert!(before.roles().is_empty());
        store.grant(user.id(), "admin").await.unwrap();
        let after = auth
            .authenticate(&store, Credential::Token(token), None)
            .await
            .unwrap();
        assert!(after.roles().contains("admin"));
    }
}
