//! Local credential lifecycle and token renewal.

pub mod credentials;
pub mod guard;
pub mod token;

pub use credentials::{CredentialStore, LocalCredential};
pub use guard::AuthGuard;
