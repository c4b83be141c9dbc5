use alloy_core::primitives::keccak256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Inputs that, when changed, require deploying a new contract instance.
///
/// Only the creation bytecode and the encoded constructor arguments are taken into
/// account. The signer, network settings and verification checks are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFingerprint {
    /// Keccak-256 of the creation bytecode, hex encoded.
    pub bytecode_hash: String,
    /// ABI-encoded constructor arguments, hex encoded.
    pub constructor_args: String,
}

impl DeploymentFingerprint {
    pub fn new(bytecode: &[u8], encoded_args: &[u8]) -> Self {
        Self {
            bytecode_hash: hex::encode(keccak256(bytecode)),
            constructor_args: hex::encode(encoded_args),
        }
    }

    /// Compute a SHA-256 hash of this fingerprint.
    ///
    /// The hash is deterministic: the same inputs always produce the same hash.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.bytecode_hash.as_bytes());
        hasher.update(b":");
        hasher.update(self.constructor_args.as_bytes());
        hex::encode(hasher.finalize())
    }
}
