//! Content hashes for step DAG fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// blake3 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Hash256(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First 12 hex chars, for log lines.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash the JSON form of `v`. Map-typed fields must have a deterministic
/// order (steps only hold sorted collections).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256> {
    let bytes = serde_json::to_vec(v).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(Hash256::of_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_is_a_hex_prefix() {
        let h = Hash256::of_bytes(b"cube");
        assert_eq!(h.to_hex().len(), 64);
        assert!(h.to_hex().starts_with(&h.short()));
        assert_eq!(hash_serde(&["a", "b"]).unwrap(), hash_serde(&["a", "b"]).unwrap());
        assert_ne!(hash_serde(&["a", "b"]).unwrap(), hash_serde(&["b", "a"]).unwrap());
    }
}
