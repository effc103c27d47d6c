use kg_core::CHANGE_EMAIL_TTL;
use kg_core::CONFIRM_TTL_FACTOR;
use kg_core::ID;
use kg_core::PASSWORD_MIN;
use kg_core::RESET_TTL;
use kg_core::Ttl;
use kg_core::USERNAME_MAX;
use kg_core::USERNAME_MIN;
use kg_core::Unique;

use crate::AuthConfig;
use crate::AuthContext;
use crate::AuthError;
use crate::Authenticator;
use crate::Credential;
use crate::Crypto;
use crate::EmailRequest;
use crate::IdentityStore;
use crate::Issuer;
use crate::LoginRequest;
use crate::Lookup;
use crate::Mailer;
use crate::RegisterRequest;
use crate::RegisterResponse;
use crate::TokenResponse;
use crate::User;
use crate::mailer;

/// The account management surface, composed from the authenticator,
/// issuer, store, and mailer.
///
/// Authorization is the caller's concern: operations here assume any
/// role policy was already checked against the caller's [`AuthContext`],
/// and act on whatever identity they are handed.
pub struct Keygate<'a, S, M> {
    store: &'a S,
    crypto: &'a Crypto,
    config: &'a AuthConfig,
    mailer: &'a M,
}

impl<'a, S, M> Keygate<'a, S, M>
where
    S: IdentityStore,
    M: Mailer,
{
    pub fn new(store: &'a S, crypto: &'a Crypto, config: &'a AuthConfig, mailer: &'a M) -> Self {
        Self {
            store,
            crypto,
            config,
            mailer,
        }
    }

    fn issuer(&self) -> Issuer<'a> {
        Issuer::new(self.crypto)
    }

    fn authenticator(&self) -> Authenticator<'_> {
        Authenticator::new(self.crypto, self.config)
    }

    fn session_response(&self, user: &User) -> Result<TokenResponse, AuthError> {
        Ok(TokenResponse {
            token: self.issuer().session(user, self.config.session_ttl)?,
            expiration: kg_core::now() + self.config.session_ttl as i64,
        })
    }

    fn mail(&self, recipient: &str, template: &'static str, token: String, username: &str) {
        self.mailer.send(EmailRequest {
            recipient: recipient.to_string(),
            template,
            token,
            username: username.to_string(),
            application: self.config.application.clone(),
        });
    }

    /// Resolve inbound credentials to a context. All boundary layers
    /// funnel through here.
    pub async fn authenticate(
        &self,
        credential: Credential,
        ip: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        self.authenticator().authenticate(self.store, credential, ip).await
    }

    /// Password login, returning a fresh session token.
    pub async fn login(
        &self,
        request: LoginRequest,
        ip: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let credential = Credential::Password {
            username: request.username,
            email: request.email,
            password: request.password,
        };
        let context = self.authenticate(credential, ip).await?;
        self.session_response(context.user())
    }

    /// Issue a fresh session token for an already-authenticated caller.
    pub fn token(&self, context: &AuthContext) -> Result<TokenResponse, AuthError> {
        self.session_response(context.user())
    }

    /// Create an identity with the named roles and send its confirmation
    /// email. Every identity holds at least one role from creation on,
    /// so registration without a role is rejected. The confirmation
    /// token outlives a session by a fixed factor so it survives a
    /// reasonable inbox delay.
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AuthError> {
        valid_username(&request.username)?;
        valid_email(&request.email)?;
        valid_password(&request.password)?;
        if request.roles.is_empty() {
            return Err(AuthError::bad("missing role"));
        }
        for role in &request.roles {
            if self.store.role_of(role).await?.is_none() {
                return Err(AuthError::bad(format!("unknown role {role}")));
            }
        }
        let user = User::new(
            &request.username,
            &request.email,
            crate::Password::new(&request.password)?,
        );
        self.store.create(&user).await?;
        for role in &request.roles {
            self.store.grant(user.id(), role).await?;
        }
        let confirm_ttl = self.config.session_ttl * CONFIRM_TTL_FACTOR;
        let confirm_token = self.issuer().confirm(&user, confirm_ttl)?;
        self.mail(
            user.email(),
            mailer::CONFIRM_ACCOUNT,
            confirm_token.clone(),
            user.username(),
        );
        let session = self.session_response(&user)?;
        log::info!("registered {}", user.username());
        Ok(RegisterResponse {
            token: session.token,
            confirm_token,
            expiration: session.expiration,
        })
    }

    /// Spend a confirmation token.
    pub async fn confirm_email(&self, token: &str) -> Result<User, AuthError> {
        self.issuer().verify_confirm(self.store, token).await
    }

    /// Re-send the confirmation email for an unconfirmed caller, with a
    /// caller-chosen token lifetime.
    pub async fn send_confirmation(
        &self,
        context: &AuthContext,
        ttl: Option<Ttl>,
    ) -> Result<(), AuthError> {
        let user = self.fetch(context.user().id()).await?;
        if user.confirmed() {
            return Err(AuthError::AlreadyConfirmed);
        }
        let ttl = ttl.unwrap_or(self.config.session_ttl);
        let token = self.issuer().confirm(&user, ttl)?;
        self.mail(user.email(), mailer::CONFIRM_ACCOUNT, token, user.username());
        Ok(())
    }

    /// Begin an email change: claim the new address and mail a change
    /// token to it.
    ///
    /// The new address is written immediately and the identity drops to
    /// unconfirmed, so the account stays locked behind the confirmation
    /// gate until the token is spent. An abandoned change leaves the
    /// account on the unverified address; the change token is the only
    /// way forward.
    pub async fn change_email_request(
        &self,
        context: &AuthContext,
        new_email: &str,
        ttl: Option<Ttl>,
    ) -> Result<(), AuthError> {
        valid_email(new_email)?;
        let mut user = self.fetch(context.user().id()).await?;
        if self.store.find(Lookup::ByEmail(new_email)).await?.is_some() {
            return Err(AuthError::bad("email already registered"));
        }
        let ttl = ttl.unwrap_or(CHANGE_EMAIL_TTL);
        let token = self.issuer().change_email(&user, new_email, ttl)?;
        user.set_email(new_email);
        user.set_not_confirmed();
        self.store.save(&user).await?;
        self.mail(
            new_email,
            mailer::CONFIRM_CHANGE_EMAIL,
            token,
            user.username(),
        );
        Ok(())
    }

    /// Spend an email-change token.
    pub async fn change_email(&self, token: &str) -> Result<User, AuthError> {
        self.issuer().verify_change_email(self.store, token).await
    }

    /// Begin a password reset for the account matching this email or
    /// username, email taking precedence. Disabled and erased accounts
    /// cannot start a reset.
    pub async fn reset_request(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        ttl: Option<Ttl>,
    ) -> Result<(), AuthError> {
        let lookup = match (email, username) {
            (Some(email), _) => Lookup::ByEmail(email),
            (None, Some(username)) => Lookup::ByUsername(username),
            (None, None) => return Err(AuthError::bad("missing email or username")),
        };
        let user = self
            .store
            .find(lookup)
            .await?
            .filter(|u| u.active() && !u.erased())
            .ok_or_else(|| AuthError::bad("no account for that email or username"))?;
        let token = self.issuer().reset(&user, ttl.unwrap_or(RESET_TTL))?;
        self.mail(user.email(), mailer::RESET_PASSWORD, token, user.username());
        Ok(())
    }

    /// Spend a reset token, returning a fresh session so the caller is
    /// logged in on the new password immediately.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<TokenResponse, AuthError> {
        valid_password(new_password)?;
        let mut user = self.issuer().verify_reset(self.store, token).await?;
        user.set_password(crate::Password::new(new_password)?);
        self.store.save(&user).await?;
        log::info!("{} reset password", user.username());
        self.session_response(&user)
    }

    /// Change the caller's password, re-checking the current one.
    /// The identity is re-read from the store so the write carries any
    /// changes made since the context was bound.
    pub async fn change_password(
        &self,
        context: &AuthContext,
        current: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        valid_password(new_password)?;
        let mut user = self.fetch(context.user().id()).await?;
        if !user.password().verify(current) {
            return Err(AuthError::Unauthorized);
        }
        user.set_password(crate::Password::new(new_password)?);
        self.store.save(&user).await
    }

    /// Change the caller's username. Collisions surface as conflicts.
    pub async fn change_username(
        &self,
        context: &AuthContext,
        new_username: &str,
    ) -> Result<(), AuthError> {
        valid_username(new_username)?;
        let mut user = self.fetch(context.user().id()).await?;
        user.set_username(new_username);
        self.store.save(&user).await
    }

    pub async fn add_role(&self, user: ID<User>, role: &str) -> Result<(), AuthError> {
        let user = self.fetch(user).await?;
        self.store.grant(user.id(), role).await
    }

    pub async fn remove_role(&self, user: ID<User>, role: &str) -> Result<(), AuthError> {
        let user = self.fetch(user).await?;
        self.store.revoke(user.id(), role).await
    }

    pub async fn activate(&self, user: ID<User>) -> Result<(), AuthError> {
        let mut user = self.fetch(user).await?;
        user.set_active();
        self.store.save(&user).await
    }

    pub async fn deactivate(&self, user: ID<User>) -> Result<(), AuthError> {
        let mut user = self.fetch(user).await?;
        user.set_inactive();
        self.store.save(&user).await
    }

    /// Tombstone an identity. The row stays for audit; authentication is
    /// permanently closed and the username and email become reusable.
    pub async fn erase(&self, user: ID<User>) -> Result<(), AuthError> {
        let mut user = self.fetch(user).await?;
        user.set_erased();
        self.store.save(&user).await?;
        log::info!("erased {}", user.username());
        Ok(())
    }

    async fn fetch(&self, user: ID<User>) -> Result<User, AuthError> {
        self.store
            .find(Lookup::ById(user))
            .await?
            .ok_or(AuthError::NotFound)
    }
}

fn valid_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::bad("missing username"));
    }
    if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
        return Err(AuthError::bad("username must be 3 to 32 characters"));
    }
    Ok(())
}

fn valid_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::bad("missing or invalid email"));
    }
    Ok(())
}

fn valid_password(password: &str) -> Result<(), AuthError> {
    if password.len() < PASSWORD_MIN {
        return Err(AuthError::bad("password must be at least 8 characters"));
    }
    Ok(())
}
