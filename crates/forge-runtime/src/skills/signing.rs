//! Content-addressed integrity and supply-chain signing for skills.
//!
//! Checksums are SHA-256 hex-encoded as `sha256:<hex>`. Signatures are
//! Ed25519 over the raw content bytes. A [`Keyring`] holds trusted public
//! keys loaded from a directory of base64-encoded `*.pub` files.

use crate::errors::{Result, RuntimeError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

pub fn compute_checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("sha256:{}", hex_encode(&digest))
}

pub fn verify_checksum(bytes: &[u8], expected: &str) -> bool {
    compute_checksum(bytes) == expected
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let mut csprng = rand_core_compat::OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// `rand_core` version pinning lives here so the rest of the module doesn't
/// need to know which generation `ed25519-dalek` pulls in.
mod rand_core_compat {
    pub use ed25519_dalek::rand_core::OsRng;
}

pub fn sign(bytes: &[u8], signing_key: &SigningKey) -> Signature {
    signing_key.sign(bytes)
}

pub fn verify(bytes: &[u8], signature: &Signature, verifying_key: &VerifyingKey) -> bool {
    verifying_key.verify(bytes, signature).is_ok()
}

/// Trusted public keys loaded from `*.pub` files (base64-encoded raw
/// Ed25519 keys, one per file); key id = filename stem.
#[derive(Default)]
pub struct Keyring {
    keys: BTreeMap<String, VerifyingKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut ring = Self::new();
        if !dir.is_dir() {
            return Ok(ring);
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pub") {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let encoded = std::fs::read_to_string(&path)?;
            ring.add(&stem, encoded.trim())?;
        }
        Ok(ring)
    }

    pub fn add(&mut self, key_id: &str, base64_key: &str) -> Result<()> {
        let raw = BASE64
            .decode(base64_key)
            .map_err(|e| RuntimeError::SignatureVerification(format!("invalid base64 key {key_id}: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| RuntimeError::SignatureVerification(format!("key {key_id} is not 32 bytes")))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| RuntimeError::SignatureVerification(format!("invalid key {key_id}: {e}")))?;
        self.keys.insert(key_id.to_string(), key);
        Ok(())
    }

    /// Verify a specific signature against every key in the ring. Returns
    /// `(key_id, true)` on first match, `("", false)` otherwise.
    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> (String, bool) {
        for (id, key) in &self.keys {
            if verify(bytes, signature, key) {
                return (id.clone(), true);
            }
        }
        (String::new(), false)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A manifest mapping skill-name to checksum, as produced by the build
/// pipeline's signing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumManifest {
    pub version: String,
    pub checksums: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl ChecksumManifest {
    pub fn new(checksums: BTreeMap<String, String>) -> Self {
        Self { version: "1".to_string(), checksums, timestamp: Utc::now(), signature: None, key_id: None }
    }

    /// Signatures cover the canonical JSON encoding of `checksums` alone, so
    /// adding a timestamp never invalidates a previously computed signature.
    pub fn canonical_checksums_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.checksums).expect("BTreeMap<String,String> serialization is infallible")
    }

    pub fn sign_with(&mut self, signing_key: &SigningKey, key_id: &str) {
        let sig = sign(&self.canonical_checksums_bytes(), signing_key);
        self.signature = Some(BASE64.encode(sig.to_bytes()));
        self.key_id = Some(key_id.to_string());
    }

    pub fn verify_signature(&self, keyring: &Keyring) -> Result<()> {
        let Some(signature) = &self.signature else {
            return Err(RuntimeError::SignatureVerification("manifest has no signature".into()));
        };
        let raw = BASE64
            .decode(signature)
            .map_err(|e| RuntimeError::SignatureVerification(format!("invalid base64 signature: {e}")))?;
        let bytes: [u8; 64] = raw
            .try_into()
            .map_err(|_| RuntimeError::SignatureVerification("signature is not 64 bytes".into()))?;
        let sig = Signature::from_bytes(&bytes);
        let (_, ok) = keyring.verify(&self.canonical_checksums_bytes(), &sig);
        if ok {
            Ok(())
        } else {
            Err(RuntimeError::SignatureVerification("no trusted key verified the manifest signature".into()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ManifestDiff {
    Mismatch { path: String },
    MissingInManifest { path: String },
    MissingInRegistry { path: String },
}

/// Compare a manifest against the live checksums discovered in a registry.
pub fn diff_manifest(manifest: &BTreeMap<String, String>, registry: &BTreeMap<String, String>) -> Vec<ManifestDiff> {
    let mut diffs = Vec::new();
    for (path, checksum) in manifest {
        match registry.get(path) {
            Some(actual) if actual == checksum => {}
            Some(_) => diffs.push(ManifestDiff::Mismatch { path: path.clone() }),
            None => diffs.push(ManifestDiff::MissingInRegistry { path: path.clone() }),
        }
    }
    for path in registry.keys() {
        if !manifest.contains_key(path) {
            diffs.push(ManifestDiff::MissingInManifest { path: path.clone() });
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_round_trips_and_detects_mutation() {
        let bytes = b"skill content";
        let checksum = compute_checksum(bytes);
        assert!(verify_checksum(bytes, &checksum));
        assert!(!verify_checksum(b"skill Content", &checksum));
    }

    #[test]
    fn signature_soundness() {
        let (sk1, pk1) = generate_keypair();
        let (_, pk2) = generate_keypair();
        let bytes = b"payload";
        let sig = sign(bytes, &sk1);
        assert!(verify(bytes, &sig, &pk1));
        assert!(!verify(bytes, &sig, &pk2));
        assert!(!verify(b"other payload", &sig, &pk1));
    }

    #[test]
    fn keyring_finds_matching_key() {
        let (sk, pk) = generate_keypair();
        let mut ring = Keyring::new();
        ring.add("key-a", &BASE64.encode(pk.to_bytes())).unwrap();
        let sig = sign(b"hello", &sk);
        let (id, ok) = ring.verify(b"hello", &sig);
        assert!(ok);
        assert_eq!(id, "key-a");

        let (_, not_ok) = ring.verify(b"goodbye", &sig);
        assert!(!not_ok);
    }

    #[test]
    fn manifest_signature_covers_checksums_only() {
        let (sk, pk) = generate_keypair();
        let mut manifest = ChecksumManifest::new(BTreeMap::from([("a.md".to_string(), "sha256:abc".to_string())]));
        manifest.sign_with(&sk, "key-a");

        let mut ring = Keyring::new();
        ring.add("key-a", &BASE64.encode(pk.to_bytes())).unwrap();
        assert!(manifest.verify_signature(&ring).is_ok());

        // Mutating the timestamp must not invalidate the signature.
        manifest.timestamp = Utc::now();
        assert!(manifest.verify_signature(&ring).is_ok());
    }

    #[test]
    fn diff_manifest_reports_all_three_classes() {
        let manifest = BTreeMap::from([
            ("a.md".to_string(), "sha256:aaa".to_string()),
            ("b.md".to_string(), "sha256:bbb".to_string()),
        ]);
        let registry = BTreeMap::from([
            ("a.md".to_string(), "sha256:aaa".to_string()),
            ("b.md".to_string(), "sha256:changed".to_string()),
            ("c.md".to_string(), "sha256:ccc".to_string()),
        ]);
        let diffs = diff_manifest(&manifest, &registry);
        assert_eq!(diffs.len(), 2);
    }
}
