//! Token authentication and role-based authorization.
//!
//! Purpose-scoped signed tokens (session login, email confirmation,
//! password reset, email change) over one JWT signing primitive, with
//! Argon2 password credentials and live role-set enforcement.
//!
//! ## Identity
//!
//! - [`User`] — Registered identity with credentials and account flags
//! - [`Role`] / [`RoleGroup`] — Named permissions and their admin groupings
//! - [`IdentityStore`] — Storage contract resolved through typed [`Lookup`]
//!
//! ## Security
//!
//! - [`Crypto`] — Token signing and verification
//! - [`Claim`] / [`Claims`] — Purpose-tagged payloads and their envelope
//! - [`Issuer`] — Per-purpose token issuance and resolution
//! - [`password`] — Argon2 hashing and verification
//!
//! ## Enforcement
//!
//! - [`Authenticator`] — Resolves inbound credentials to an [`AuthContext`]
//! - [`Policy`] / [`authorize`] — All-of / any-of role guards
//! - [`Keygate`] — The operation surface composed from the above
mod authenticate;
mod authorize;
mod claims;
mod config;
mod crypto;
mod dto;
mod error;
mod flows;
mod mailer;
pub mod password;
mod store;
mod tokens;
mod user;

pub use authenticate::*;
pub use authorize::*;
pub use claims::*;
pub use config::*;
pub use crypto::*;
pub use dto::*;
pub use error::*;
pub use flows::*;
pub use mailer::*;
pub use password::Password;
pub use store::*;
pub use tokens::*;
pub use user::*;

#[cfg(feature = "database")]
mod repository;
#[cfg(feature = "database")]
pub use repository::*;
