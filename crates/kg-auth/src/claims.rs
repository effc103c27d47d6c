use kg_core::Epoch;
use kg_core::ID;
use kg_core::Ttl;

use crate::User;

/// Purpose-specific claim payloads.
///
/// One signing primitive serves four security-sensitive flows; the claim
/// shape is what distinguishes them on the wire. Serialization is
/// untagged so each purpose keeps its field names as the wire format,
/// and the key sets are disjoint, so decoding stays unambiguous and a
/// token issued for one purpose can never resolve as another.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Claim {
    /// Email change: the identity id plus the address awaiting confirmation.
    ChangeEmail {
        change_email: uuid::Uuid,
        new_email: String,
    },
    /// Password reset for an identity id.
    Reset { reset: uuid::Uuid },
    /// Email confirmation for a target address.
    Confirm { email: String },
    /// Session authentication for an identity id.
    Session { id: uuid::Uuid },
}

impl Claim {
    pub fn session(user: ID<User>) -> Self {
        Self::Session { id: user.inner() }
    }
    pub fn confirm(email: &str) -> Self {
        Self::Confirm {
            email: email.to_string(),
        }
    }
    pub fn reset(user: ID<User>) -> Self {
        Self::Reset {
            reset: user.inner(),
        }
    }
    pub fn change_email(user: ID<User>, new_email: &str) -> Self {
        Self::ChangeEmail {
            change_email: user.inner(),
            new_email: new_email.to_string(),
        }
    }
}

/// Signed token envelope: one claim plus issuance and expiry timestamps.
/// The signature covers the whole envelope, so tampering with either the
/// claim or the expiry invalidates the token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub claim: Claim,
    pub iat: Epoch,
    pub exp: Epoch,
}

impl Claims {
    pub fn new(claim: Claim, expires_in: Ttl) -> Self {
        let now = kg_core::now();
        Self {
            claim,
            iat: now,
            exp: now + expires_in as Epoch,
        }
    }
    pub fn expired(&self) -> bool {
        self.exp < kg_core::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn each_purpose_decodes_to_its_own_claim() {
        let id = uuid::Uuid::now_v7();
        let cases = [
            (format!(r#"{{"id":"{id}","iat":0,"exp":1}}"#), "session"),
            (r#"{"email":"a@b.c","iat":0,"exp":1}"#.to_string(), "confirm"),
            (format!(r#"{{"reset":"{id}","iat":0,"exp":1}}"#), "reset"),
            (
                format!(r#"{{"change_email":"{id}","new_email":"a@b.c","iat":0,"exp":1}}"#),
                "change",
            ),
        ];
        for (json, purpose) in cases {
            let claims: Claims = serde_json::from_str(&json).unwrap();
            let matched = match (&claims.claim, purpose) {
                (Claim::Session { .. }, "session") => true,
                (Claim::Confirm { .. }, "confirm") => true,
                (Claim::Reset { .. }, "reset") => true,
                (Claim::ChangeEmail { .. }, "change") => true,
                _ => false,
            };
            assert!(matched, "claim {purpose} decoded as {:?}", claims.claim);
        }
    }
    #[test]
    fn claim_fields_are_the_wire_format() {
        let user = ID::<User>::default();
        let claims = Claims::new(Claim::reset(user), 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["reset"], serde_json::json!(user.inner()));
        assert!(json.get("iat").is_some());
        assert!(json.get("exp").is_some());
    }
    #[test]
    fn expiry_is_absolute() {
        let claims = Claims::new(Claim::confirm("a@b.c"), 3600);
        assert!(!claims.expired());
        assert_eq!(claims.exp - claims.iat, 3600);
        let stale = Claims {
            exp: kg_core::now() - 1,
            ..claims
        };
        assert!(stale.expired());
    }
}
