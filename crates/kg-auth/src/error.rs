/// Failure taxonomy for authentication and authorization.
///
/// Every variant is recoverable at the call boundary; none is fatal to
/// the process. Store-level faults arrive already translated, so raw
/// persistence errors never cross this boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Token signature does not match its payload.
    #[error("token signature is invalid")]
    SignatureInvalid,
    /// Token was validly signed but its expiry has passed.
    #[error("token has expired")]
    SignatureExpired,
    /// Token could not be parsed at all.
    #[error("token is malformed")]
    Malformed,
    /// A token claim referenced an identity that no longer exists.
    #[error("identity not found")]
    IdentityNotFound,
    /// Confirmation attempted on an already-confirmed identity.
    #[error("account is already confirmed")]
    AlreadyConfirmed,
    /// Username or email uniqueness violation, or duplicate membership.
    #[error("already in use")]
    Conflict,
    /// The caller is authenticated but its role set fails the policy.
    #[error("not enough permissions")]
    Forbidden,
    /// No valid credential was presented.
    #[error("invalid credentials")]
    Unauthorized,
    /// The operation would break a structural invariant.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// The request is missing or carries unusable parameters.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The referenced record does not exist.
    #[error("not found")]
    NotFound,
    /// The operation is never permitted (e.g. reading a password back).
    #[error("operation not permitted")]
    InvalidOperation,
    /// Translated persistence fault.
    #[error("store error: {0}")]
    Store(String),
}

impl AuthError {
    /// Collapse all token-resolution failures into one externally visible
    /// rejection. Callers must not be able to distinguish an expired
    /// token from a tampered or unparseable one.
    pub fn public(self) -> Self {
        match self {
            Self::SignatureInvalid
            | Self::SignatureExpired
            | Self::Malformed
            | Self::IdentityNotFound => Self::Unauthorized,
            other => other,
        }
    }
    /// Shorthand for [`AuthError::BadRequest`].
    pub fn bad(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn token_failures_are_indistinguishable() {
        assert_eq!(AuthError::SignatureInvalid.public(), AuthError::Unauthorized);
        assert_eq!(AuthError::SignatureExpired.public(), AuthError::Unauthorized);
        assert_eq!(AuthError::Malformed.public(), AuthError::Unauthorized);
        assert_eq!(AuthError::IdentityNotFound.public(), AuthError::Unauthorized);
    }
    #[test]
    fn policy_failures_stay_distinct() {
        assert_eq!(AuthError::Forbidden.public(), AuthError::Forbidden);
        assert_eq!(AuthError::Conflict.public(), AuthError::Conflict);
        assert_eq!(
            AuthError::InvalidState("last role").public(),
            AuthError::InvalidState("last role"),
        );
    }
}
