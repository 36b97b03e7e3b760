pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod policy;
pub mod roles;
pub mod signer;
pub mod verifier;

pub use claims::Claims;
pub use config::TokenConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, OptionalIdentity};
pub use policy::{allowed_roles, check, Operation, PolicyError};
pub use roles::Role;
pub use signer::{IssuedToken, TokenSigner};
pub use verifier::TokenVerifier;
