//! Merkle batching of receipt checksums.
//!
//! Leaves are padded to a power of two by repeating the last leaf. A padded
//! leaf has the same hash as the leaf it copies, so its path is a valid proof
//! for that leaf too; only proofs for the original leaves are handed out.
//! Siblings are combined smaller-hash-first, so a proof is just the list of
//! sibling hashes with no left/right flags.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ReceiptError;

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Hash of two siblings, lexicographically smaller one first.
pub fn hash_pair(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` are the padded leaves, the last level is the root alone.
    levels: Vec<Vec<String>>,
    leaf_count: usize,
}

impl MerkleTree {
    pub fn build<S: AsRef<str>>(leaves: &[S]) -> Result<Self, ReceiptError> {
        let last = leaves.last().ok_or(ReceiptError::EmptyBatch)?;
        let leaf_count = leaves.len();
        let mut level: Vec<String> = leaves.iter().map(|l| l.as_ref().to_string()).collect();
        level.resize(leaf_count.next_power_of_two(), last.as_ref().to_string());

        let mut levels = vec![level];
        while let Some(current) = levels.last().filter(|l| l.len() > 1) {
            let next = current
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }
        Ok(Self { levels, leaf_count })
    }

    pub fn root(&self) -> &str {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Number of leaves before padding.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Sibling hashes from leaf `index` up to the root. `None` for padding.
    pub fn proof(&self, index: usize) -> Option<Vec<String>> {
        if index >= self.leaf_count {
            return None;
        }
        let mut position = index;
        let siblings = self.levels[..self.levels.len() - 1]
            .iter()
            .map(|level| {
                let sibling = level[position ^ 1].clone();
                position /= 2;
                sibling
            })
            .collect();
        Some(siblings)
    }
}

/// Inclusion proof of one receipt in an anchored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    pub receipt_id: String,
    pub merkle_root: String,
    pub sibling_hashes: Vec<String>,
}

pub fn verify_merkle_proof(leaf_hash: &str, proof: &MerkleProof) -> bool {
    let folded = proof
        .sibling_hashes
        .iter()
        .fold(leaf_hash.to_string(), |acc, sibling| hash_pair(&acc, sibling));
    folded == proof.merkle_root
}
