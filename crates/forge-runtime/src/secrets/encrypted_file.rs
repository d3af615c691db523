//! `EncryptedFileProvider`: an at-rest `salt(16) || nonce(12) || AES-256-GCM`
//! encrypted JSON map, keyed by an Argon2id-derived key (§4.6.3).
//!
//! Grounded in the pack's AES-GCM usage (`shadow_store.rs`'s
//! nonce-then-ciphertext layout, `Aes256Gcm::new_from_slice`) generalized to
//! a file instead of a `sled` tree, and in `argon2`'s builder API for the
//! password-hashing parameters spec.md pins exactly (t=1, m=64MiB, p=4).

use crate::errors::{Result, RuntimeError};
use crate::secrets::provider::SecretsProvider;
use aes_gcm::aead::rand_core::{OsRng, RngCore};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Produces the decryption passphrase on demand. The core never reads a
/// terminal itself — a CLI front-end supplies this callback.
pub type PassphraseFn = Box<dyn Fn() -> Result<String> + Send + Sync>;

/// The decrypted map, held only in memory. Values are `SecretString` so a
/// stray `Debug`/clone of the cache can't put plaintext into a log line; the
/// file on disk still round-trips through plain `String` since the ciphertext
/// itself is already the secrecy boundary.
struct Cache {
    secrets: HashMap<String, SecretString>,
}

/// A `SecretsProvider` backed by a single encrypted file, loaded lazily on
/// first access and cached in memory for the provider's lifetime.
pub struct EncryptedFileProvider {
    path: PathBuf,
    passphrase: PassphraseFn,
    cache: Mutex<Option<Cache>>,
}

impl EncryptedFileProvider {
    pub fn new(path: impl Into<PathBuf>, passphrase: PassphraseFn) -> Self {
        Self { path: path.into(), passphrase, cache: Mutex::new(None) }
    }

    fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let params = Params::new(64 * 1024, 1, 4, Some(KEY_LEN))
            .map_err(|e| RuntimeError::SecretProvider(format!("invalid argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| RuntimeError::SecretProvider(format!("key derivation failed: {e}")))?;
        Ok(key)
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read(&self.path)?;
        if raw.len() < SALT_LEN + NONCE_LEN {
            return Err(RuntimeError::SecretDecryption("secrets file is truncated".into()));
        }
        let (salt, rest) = raw.split_at(SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let passphrase = (self.passphrase)()?;
        let key_bytes = Self::derive_key(&passphrase, salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| RuntimeError::SecretDecryption("AES-GCM tag mismatch: wrong passphrase or corrupted file".into()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| RuntimeError::SecretDecryption(format!("decrypted payload is not valid JSON: {e}")))
    }

    fn ensure_loaded(&self) -> Result<()> {
        let mut guard = self.cache.lock().expect("secrets cache mutex poisoned");
        if guard.is_none() {
            let secrets = self.load()?.into_iter().map(|(k, v)| (k, SecretString::from(v))).collect();
            *guard = Some(Cache { secrets });
        }
        Ok(())
    }

    /// Re-encrypt the whole map with a fresh salt and nonce, then atomically
    /// replace the file: tempfile in the same directory, write, fsync, chmod
    /// 0600, rename over the target.
    fn persist(&self, secrets: &HashMap<String, String>) -> Result<()> {
        let passphrase = (self.passphrase)()?;

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key_bytes = Self::derive_key(&passphrase, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = serde_json::to_vec(secrets)?;
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|e| RuntimeError::SecretProvider(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);

        atomic_write(&self.path, &out)?;
        Ok(())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_batch(&[(key.to_string(), value.to_string())])
    }

    /// Performs a single key derivation and a single encrypted write for a
    /// whole map of pairs.
    pub fn set_batch(&self, pairs: &[(String, String)]) -> Result<()> {
        self.ensure_loaded()?;
        let mut guard = self.cache.lock().expect("secrets cache mutex poisoned");
        let cache = guard.as_mut().expect("ensure_loaded just populated the cache");
        for (key, value) in pairs {
            cache.secrets.insert(key.clone(), SecretString::from(value.clone()));
        }
        self.persist(&plaintext_snapshot(&cache.secrets))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.ensure_loaded()?;
        let mut guard = self.cache.lock().expect("secrets cache mutex poisoned");
        let cache = guard.as_mut().expect("ensure_loaded just populated the cache");
        cache.secrets.remove(key);
        self.persist(&plaintext_snapshot(&cache.secrets))
    }
}

impl SecretsProvider for EncryptedFileProvider {
    fn name(&self) -> &str {
        "encrypted-file"
    }

    fn get(&self, key: &str) -> Result<SecretString> {
        self.ensure_loaded()?;
        let guard = self.cache.lock().expect("secrets cache mutex poisoned");
        guard
            .as_ref()
            .expect("ensure_loaded just populated the cache")
            .secrets
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::SecretNotFound(key.to_string()))
    }

    fn list(&self) -> Result<Vec<String>> {
        self.ensure_loaded()?;
        let guard = self.cache.lock().expect("secrets cache mutex poisoned");
        Ok(guard.as_ref().expect("ensure_loaded just populated the cache").secrets.keys().cloned().collect())
    }
}

/// Exposes the cache's `SecretString` values just long enough to serialize
/// them into the ciphertext; the plaintext map isn't retained past `persist`.
fn plaintext_snapshot(secrets: &HashMap<String, SecretString>) -> HashMap<String, String> {
    secrets.iter().map(|(k, v)| (k.clone(), v.expose_secret().to_string())).collect()
}

/// The shared atomic-write helper plus the owner-read-write-only chmod §4.6.3
/// requires for the secrets file specifically.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    crate::util::atomic_write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    fn fixed_passphrase(p: &'static str) -> PassphraseFn {
        Box::new(move || Ok(p.to_string()))
    }

    #[test]
    fn set_batch_then_reopen_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.enc");

        let provider = EncryptedFileProvider::new(&path, fixed_passphrase("pw"));
        provider
            .set_batch(&[("A".to_string(), "1".to_string()), ("B".to_string(), "2".to_string())])
            .unwrap();

        let reopened = EncryptedFileProvider::new(&path, fixed_passphrase("pw"));
        let mut keys = reopened.list().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(reopened.get("A").unwrap().expose_secret(), "1");
    }

    #[test]
    fn wrong_passphrase_yields_decryption_error_not_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.enc");
        EncryptedFileProvider::new(&path, fixed_passphrase("pw")).set("A", "1").unwrap();

        let wrong = EncryptedFileProvider::new(&path, fixed_passphrase("pw2"));
        let err = wrong.get("A").unwrap_err();
        assert!(matches!(err, RuntimeError::SecretDecryption(_)));
    }

    #[test]
    fn delete_removes_key_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.enc");
        let provider = EncryptedFileProvider::new(&path, fixed_passphrase("pw"));
        provider.set("A", "1").unwrap();
        provider.delete("A").unwrap();

        let reopened = EncryptedFileProvider::new(&path, fixed_passphrase("pw"));
        assert!(matches!(reopened.get("A").unwrap_err(), RuntimeError::SecretNotFound(_)));
    }

    #[test]
    fn file_permissions_are_owner_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.enc");
        EncryptedFileProvider::new(&path, fixed_passphrase("pw")).set("A", "1").unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn cache_serves_repeated_gets_without_rereading_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.enc");
        let provider = EncryptedFileProvider::new(&path, fixed_passphrase("pw"));
        provider.set("A", "1").unwrap();
        assert_eq!(provider.get("A").unwrap().expose_secret(), "1");
        std::fs::remove_file(&path).unwrap();
        // Cache already populated; removing the backing file must not affect reads.
        assert_eq!(provider.get("A").unwrap().expose_secret(), "1");
    }
}
