use kg_core::Ttl;
use kg_core::Unique;

use crate::AuthError;
use crate::Claim;
use crate::Crypto;
use crate::IdentityStore;
use crate::Lookup;
use crate::User;

/// Per-purpose token issuance and resolution.
///
/// Issuance signs a purpose-specific [`Claim`]; resolution verifies the
/// envelope and then insists on the expected claim shape, so a token can
/// only ever be spent on the flow it was issued for. Presenting a token
/// to the wrong verifier reads as [`AuthError::Malformed`].
pub struct Issuer<'c> {
    crypto: &'c Crypto,
}

impl<'c> Issuer<'c> {
    pub fn new(crypto: &'c Crypto) -> Self {
        Self { crypto }
    }

    pub fn session(&self, user: &User, ttl: Ttl) -> Result<String, AuthError> {
        self.crypto.sign(Claim::session(user.id()), ttl)
    }
    pub fn confirm(&self, user: &User, ttl: Ttl) -> Result<String, AuthError> {
        self.crypto.sign(Claim::confirm(user.email()), ttl)
    }
    pub fn reset(&self, user: &User, ttl: Ttl) -> Result<String, AuthError> {
        self.crypto.sign(Claim::reset(user.id()), ttl)
    }
    pub fn change_email(
        &self,
        user: &User,
        new_email: &str,
        ttl: Ttl,
    ) -> Result<String, AuthError> {
        self.crypto
            .sign(Claim::change_email(user.id(), new_email), ttl)
    }

    /// Resolve a session token to its identity. No side effects.
    pub async fn verify_session<S>(&self, store: &S, token: &str) -> Result<User, AuthError>
    where
        S: IdentityStore,
    {
        match self.crypto.verify(token)?.claim {
            Claim::Session { id } => store
                .find(Lookup::ById(id.into()))
                .await?
                .ok_or(AuthError::IdentityNotFound),
            _ => Err(AuthError::Malformed),
        }
    }

    /// Spend a confirmation token: flips the identity to confirmed and
    /// persists it. Confirming twice is rejected, not repeated.
    pub async fn verify_confirm<S>(&self, store: &S, token: &str) -> Result<User, AuthError>
    where
        S: IdentityStore,
    {
        let email = match self.crypto.verify(token)?.claim {
            Claim::Confirm { email } => email,
            _ => return Err(AuthError::Malformed),
        };
        let mut user = store
            .find(Lookup::ByEmail(&email))
            .await?
            .ok_or(AuthError::IdentityNotFound)?;
        if user.confirmed() {
            return Err(AuthError::AlreadyConfirmed);
        }
        user.set_confirmed();
        store.save(&user).await?;
        log::info!("{} confirmed", user.username());
        Ok(user)
    }

    /// Resolve a reset token to its identity. The token itself carries no
    /// single-use state; expiry is its only bound.
    pub async fn verify_reset<S>(&self, store: &S, token: &str) -> Result<User, AuthError>
    where
        S: IdentityStore,
    {
        match self.crypto.verify(token)?.claim {
            Claim::Reset { reset } => store
                .find(Lookup::ById(reset.into()))
                .await?
                .ok_or(AuthError::IdentityNotFound),
            _ => Err(AuthError::Malformed),
        }
    }

    /// Spend an email-change token: confirms the address written at
    /// request time. The identity is resolved by the new address, since
    /// the speculative write already moved it there.
    pub async fn verify_change_email<S>(&self, store: &S, token: &str) -> Result<User, AuthError>
    where
        S: IdentityStore,
    {
        let (id, new_email) = match self.crypto.verify(token)?.claim {
            Claim::ChangeEmail {
                change_email,
                new_email,
            } => (change_email, new_email),
            _ => return Err(AuthError::Malformed),
        };
        let mut user = store
            .find(Lookup::ByEmail(&new_email))
            .await?
            .filter(|u| u.id().inner() == id)
            .ok_or(AuthError::IdentityNotFound)?;
        if user.confirmed() {
            return Err(AuthError::AlreadyConfirmed);
        }
        user.set_confirmed();
        store.save(&user).await?;
        log::info!("{} confirmed changed email", user.username());
        Ok(user)
    }
}
