//! Credential candidates and the per-operation cascade that serves them.

pub mod candidate;
pub mod cascade;

pub use candidate::Credential;
pub use cascade::{CredentialCascade, DefaultCredentialPolicy};
