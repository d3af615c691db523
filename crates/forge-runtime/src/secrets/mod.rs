//! The secrets core (§4.6): a composable provider chain terminating, in the
//! default configuration, in an AES-256-GCM + Argon2id encrypted file.

pub mod encrypted_file;
pub mod env_provider;
pub mod provider;

pub use encrypted_file::EncryptedFileProvider;
pub use env_provider::EnvProvider;
pub use provider::{ChainProvider, SecretsProvider};
