use kg_core::SESSION_TTL;
use kg_core::Ttl;

/// Process-wide authentication configuration, loaded once at startup.
///
/// The boundary layer reads bearer tokens from the header named by
/// `token_header`, falling back to the JSON body field named by
/// `token_field`. `confirm_required` gates unconfirmed identities out of
/// every operation that is not itself part of the confirmation flow.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session token lifetime in seconds.
    pub session_ttl: Ttl,
    /// Whether unconfirmed identities are rejected at authentication.
    pub confirm_required: bool,
    /// Request header carrying the bearer token.
    pub token_header: String,
    /// JSON body field carrying the bearer token when no header is set.
    pub token_field: String,
    /// Display name interpolated into outbound email templates.
    pub application: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: SESSION_TTL,
            confirm_required: false,
            token_header: "X-Auth-Token".to_string(),
            token_field: "token".to_string(),
            application: "keygate".to_string(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from the environment, with defaults for any
    /// unset variable: `SESSION_TTL` (seconds), `CONFIRM_REQUIRED`
    /// (`1`/`true`), `AUTH_TOKEN_HEADER`, `AUTH_TOKEN_KEY`, `APP_NAME`.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            session_ttl: std::env::var("SESSION_TTL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.session_ttl),
            confirm_required: std::env::var("CONFIRM_REQUIRED")
                .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
                .unwrap_or(default.confirm_required),
            token_header: std::env::var("AUTH_TOKEN_HEADER").unwrap_or(default.token_header),
            token_field: std::env::var("AUTH_TOKEN_KEY").unwrap_or(default.token_field),
            application: std::env::var("APP_NAME").unwrap_or(default.application),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn default_ttl_matches_core_constant() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl, SESSION_TTL);
        assert!(!config.confirm_required);
    }
}
