//! `stockbook-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. It turns a
//! verified token into a principal, answers permission checks, and computes
//! the `LedgerScope` every ledger query runs under.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod scope;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize, permissions_for_roles};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
pub use scope::LedgerScope;
