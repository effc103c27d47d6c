use kg_core::Ttl;

use crate::AuthError;
use crate::Claim;
use crate::Claims;

/// Token signing and verification over a single shared secret.
///
/// Every purpose (session, confirmation, reset, email change) passes
/// through this one boundary; the [`Claim`] shape inside the envelope is
/// what scopes a token to its purpose.
pub struct Crypto {
    encoding: jsonwebtoken::EncodingKey,
    decoding: jsonwebtoken::DecodingKey,
}

impl Crypto {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
        }
    }
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("KEYGATE_SECRET")
                .unwrap_or_else(|_| String::default())
                .as_bytes(),
        )
    }
    /// Sign a claim into a compact token expiring `ttl` seconds from now.
    pub fn sign(&self, claim: Claim, ttl: Ttl) -> Result<String, AuthError> {
        let claims = Claims::new(claim, ttl);
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Store(e.to_string()))
    }
    /// Verify a token's signature and expiry, returning its envelope.
    /// Expiry is exact, with no clock leeway.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = jsonwebtoken::Validation::default();
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::SignatureExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
                _ => AuthError::Malformed,
            })
    }
    /// SHA-256 digest of a token, safe to log in place of the token itself.
    pub fn digest(token: &str) -> String {
        use sha2::Digest;
        let hash = sha2::Sha256::digest(token.as_bytes());
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::User;
    use kg_core::ID;

    fn crypto() -> Crypto {
        Crypto::new(b"test-secret")
    }

    #[test]
    fn sign_then_verify_each_purpose() {
        let crypto = crypto();
        let user = ID::<User>::default();
        for claim in [
            Claim::session(user),
            Claim::confirm("a@b.c"),
            Claim::reset(user),
            Claim::change_email(user, "new@b.c"),
        ] {
            let token = crypto.sign(claim.clone(), 60).unwrap();
            let claims = crypto.verify(&token).unwrap();
            assert_eq!(claims.claim, claim);
        }
    }
    #[test]
    fn expired_token_is_rejected() {
        let crypto = crypto();
        let stale = Claims {
            claim: Claim::session(ID::default()),
            iat: kg_core::now() - 120,
            exp: kg_core::now() - 60,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &stale,
            &jsonwebtoken::EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        let err = crypto.verify(&token).unwrap_err();
        assert_eq!(err, AuthError::SignatureExpired);
        assert_eq!(err.public(), AuthError::Unauthorized);
    }
    #[test]
    fn wrong_secret_is_rejected() {
        let token = crypto().sign(Claim::confirm("a@b.c"), 60).unwrap();
        let err = Crypto::new(b"other-secret").verify(&token).unwrap_err();
        assert_eq!(err, AuthError::SignatureInvalid);
        assert_eq!(err.public(), AuthError::Unauthorized);
    }
    #[test]
    fn tampered_payload_fails_the_signature() {
        let crypto = crypto();
        let token = crypto.sign(Claim::reset(ID::default()), 60).unwrap();
        let dots = token.match_indices('.').map(|(i, _)| i).collect::<Vec<_>>();
        let middle = (dots[0] + dots[1]) / 2;
        let mut bytes = token.clone().into_bytes();
        bytes[middle] = if bytes[middle] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_ne!(tampered, token);
        let err = crypto.verify(&tampered).unwrap_err();
        assert_eq!(err, AuthError::SignatureInvalid);
        assert_eq!(err.public(), AuthError::Unauthorized);
    }
    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            crypto().verify("not-a-token").unwrap_err(),
            AuthError::Malformed,
        );
    }
    #[test]
    fn digest_is_stable_hex() {
        let a = Crypto::digest("token");
        let b = Crypto::digest("token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, Crypto::digest("other"));
    }
}
