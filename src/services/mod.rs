pub mod claims;
pub mod staff_registry;

pub use claims::{issue_role_claims, ClaimsError};
