use std::collections::HashSet;

use crate::AuthContext;
use crate::AuthError;

/// Role requirement over a set of held role names.
///
/// Guards compose explicitly at the call site: authenticate first, then
/// check one or more policies against the resulting context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Every named role must be held.
    RequireAll(Vec<String>),
    /// At least one named role must be held.
    AcceptAny(Vec<String>),
}

impl Policy {
    pub fn all<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RequireAll(roles.into_iter().map(Into::into).collect())
    }
    pub fn any<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AcceptAny(roles.into_iter().map(Into::into).collect())
    }
    /// Whether the held role set meets this requirement. An empty
    /// RequireAll is vacuously satisfied; an empty AcceptAny never is.
    pub fn satisfied_by(&self, held: &HashSet<String>) -> bool {
        match self {
            Self::RequireAll(roles) => roles.iter().all(|r| held.contains(r)),
            Self::AcceptAny(roles) => roles.iter().any(|r| held.contains(r)),
        }
    }
}

/// Gate an authenticated context on a role policy.
///
/// Reaching this point means authentication already succeeded, so the
/// only possible rejection is [`AuthError::Forbidden`].
pub fn authorize(context: &AuthContext, policy: &Policy) -> Result<(), AuthError> {
    if policy.satisfied_by(context.roles()) {
        Ok(())
    } else {
        log::warn!("authorization denied for {}", context.user().username());
        Err(AuthError::Forbidden)
    }
}
