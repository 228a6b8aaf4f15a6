//! Replay hashing for audit reproducibility.
//!
//! A decision carries the SHA-256 of the exact policy text and retrieved
//! context it was produced from, so a third party holding the same inputs
//! can recompute the digests and confirm the trace was not altered.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the UTF-8 bytes of `text`. Always 64 characters.
pub fn compute_text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of a policy document's full text.
pub fn compute_policy_hash(policy_text: &str) -> String {
    compute_text_hash(policy_text)
}

/// Digests attached to every decision payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayHashes {
    pub policy_text_hash: String,
    pub retrieved_context_hash: String,
}

impl ReplayHashes {
    /// Hash the policy text and retrieved context used for one decision.
    pub fn compute(policy_text: &str, retrieved_context: &str) -> Self {
        Self {
            policy_text_hash: compute_policy_hash(policy_text),
            retrieved_context_hash: compute_text_hash(retrieved_context),
        }
    }

    /// Recompute from candidate inputs and compare.
    pub fn verify(&self, policy_text: &str, retrieved_context: &str) -> bool {
        *self == Self::compute(policy_text, retrieved_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "SAFEGUARD INSURANCE POLICY\n\n2.3 WATER DAMAGE\nBurst pipes are covered.\n";

    #[test]
    fn test_policy_hash_stable() {
        let first = compute_policy_hash(POLICY);
        let second = compute_policy_hash(POLICY);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_appending_changes_hash() {
        let base = compute_policy_hash(POLICY);
        let extended = compute_policy_hash(&format!("{}.", POLICY));
        assert_ne!(base, extended);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            compute_text_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            compute_text_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_replay_hashes_verify() {
        let hashes = ReplayHashes::compute(POLICY, "2.3 WATER DAMAGE");
        assert!(hashes.verify(POLICY, "2.3 WATER DAMAGE"));
        assert!(!hashes.verify(POLICY, "2.3 WATER DAMAGE "));
        assert_ne!(hashes.policy_text_hash, hashes.retrieved_context_hash);
    }
}
