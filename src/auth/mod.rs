//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Login:
//!     provider.rs (authorization code → ExternalIdentity)
//!     → rotation.rs (find/create user, replace secret hash)
//!     → token.rs (sign JWT embedding the new plaintext)
//!
//! Every request:
//!     token.rs (signature, expiry)
//!     → session.rs (load user, compare plaintext against stored hash)
//!     → AuthenticatedUser { id, email }
//! ```
//!
//! # Design Decisions
//! - Rotation is the only revocation; no token blacklist
//! - All verification failures collapse into one `AuthFailure`
//! - Slow hashing runs on the blocking pool, never on a runtime worker

pub mod provider;
pub mod rotation;
pub mod secret;
pub mod session;
pub mod token;

pub use provider::{ExternalIdentity, GoogleProvider, IdentityProvider, ProviderError};
pub use rotation::{LoginOutcome, RotationError, SessionRotation};
pub use secret::{HashError, SecretHasher, SecretPlaintext};
pub use session::{bearer_token, AuthFailure, AuthenticatedUser, Authenticator};
pub use token::{SessionClaims, TokenError, TokenInvalid, TokenService};
