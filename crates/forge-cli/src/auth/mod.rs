//! OAuth/credential cache for model providers.
//!
//! Runner orchestration step 9 (`forge_runtime::runner`) prefers a provider's
//! OAuth path over an API key when no API key is configured and stored
//! credentials exist. This module owns that credential cache; it does not
//! implement the browser-based OAuth dance itself (out of scope, §1) — it
//! only stores/refreshes/retrieves tokens a collaborator obtained.

pub mod provider;
pub mod token_store;

pub use provider::{AuthProvider, AuthResult, AuthType, Credentials, CredentialType};
pub use token_store::TokenStore;
