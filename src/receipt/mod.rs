//! Tamper-evident receipts for settled operations.
//!
//! A receipt's `checksum` covers every field except the anchoring fields
//! (`checksum`, `merkleRoot`, `blockNumber`, `blockTimestamp`, `verified`), so
//! anchoring a receipt into a Merkle batch never invalidates it.
//!
//! Batches are anchored by their Merkle root: [`batch_for_anchoring`] builds the
//! tree over receipt checksums and returns one [`MerkleProof`] per receipt.
//! Scheduling of anchoring runs is left to the caller.

mod merkle;

pub use merkle::{MerkleProof, MerkleTree, hash_pair, sha256_hex, verify_merkle_proof};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};

/// Fields left out of the checksum input.
pub const ANCHORING_FIELDS: [&str; 5] = [
    "checksum",
    "merkleRoot",
    "blockNumber",
    "blockTimestamp",
    "verified",
];

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("Can not anchor an empty batch")]
    EmptyBatch,
    #[error("Failed to serialize receipt: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReceiptError {
    /// Receipt errors come from the input, so repeating the call can not help.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_id: String,
    pub agent_id: String,
    pub operation_type: String,
    pub operation_id: String,
    /// Atomic units, as settled.
    pub amount_paid: String,
    pub network_id: String,
    pub tx_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
    pub checksum: String,
    pub merkle_root: Option<String>,
    pub block_number: Option<u64>,
    pub block_timestamp: Option<DateTime<Utc>>,
    pub verified: bool,
}

/// What a receipt records about one settled operation.
#[derive(Debug, Clone, Default)]
pub struct ReceiptParams {
    pub agent_id: String,
    pub operation_type: String,
    pub operation_id: String,
    pub amount_paid: String,
    pub network_id: String,
    pub tx_hash: Option<String>,
    pub metadata: Value,
}

/// `rcpt_<unix millis>_<9 random lowercase alphanumerics>`
fn new_receipt_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("rcpt_{}_{}", now.timestamp_millis(), suffix)
}

/// Serializes `value` with object keys sorted at every depth.
fn write_canonical(value: &Value, out: &mut String) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(value, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

/// SHA-256 over the canonical JSON of the receipt without its anchoring fields.
pub fn compute_checksum(receipt: &Receipt) -> Result<String, ReceiptError> {
    let mut value = serde_json::to_value(receipt)?;
    if let Value::Object(map) = &mut value {
        for field in ANCHORING_FIELDS {
            map.remove(field);
        }
    }
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)?;
    Ok(sha256_hex(canonical))
}

pub fn generate_receipt(params: ReceiptParams) -> Result<Receipt, ReceiptError> {
    generate_receipt_at(params, Utc::now())
}

pub fn generate_receipt_at(
    params: ReceiptParams,
    now: DateTime<Utc>,
) -> Result<Receipt, ReceiptError> {
    let mut receipt = Receipt {
        receipt_id: new_receipt_id(now),
        agent_id: params.agent_id,
        operation_type: params.operation_type,
        operation_id: params.operation_id,
        amount_paid: params.amount_paid,
        network_id: params.network_id,
        tx_hash: params.tx_hash,
        timestamp: now,
        metadata: params.metadata,
        checksum: String::new(),
        merkle_root: None,
        block_number: None,
        block_timestamp: None,
        verified: false,
    };
    receipt.checksum = compute_checksum(&receipt)?;
    Ok(receipt)
}

/// Whether the stored checksum still matches the receipt's contents.
pub fn verify_checksum(receipt: &Receipt) -> bool {
    compute_checksum(receipt).is_ok_and(|checksum| checksum == receipt.checksum)
}

/// Records where the receipt was anchored and marks it verified.
pub fn anchor_receipt(
    receipt: Receipt,
    merkle_root: impl Into<String>,
    block_number: u64,
    block_timestamp: DateTime<Utc>,
) -> Receipt {
    Receipt {
        merkle_root: Some(merkle_root.into()),
        block_number: Some(block_number),
        block_timestamp: Some(block_timestamp),
        verified: true,
        ..receipt
    }
}

/// A Merkle root to anchor and the proof of each receipt under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorBatch {
    pub merkle_root: String,
    pub proofs: Vec<MerkleProof>,
}

/// Folds the receipts' checksums into one Merkle tree.
pub fn batch_for_anchoring(receipts: &[Receipt]) -> Result<AnchorBatch, ReceiptError> {
    let leaves: Vec<&str> = receipts.iter().map(|r| r.checksum.as_str()).collect();
    let tree = MerkleTree::build(&leaves)?;
    let proofs = receipts
        .iter()
        .enumerate()
        .map(|(i, receipt)| MerkleProof {
            receipt_id: receipt.receipt_id.clone(),
            merkle_root: tree.root().to_string(),
            sibling_hashes: tree.proof(i).unwrap_or_default(),
        })
        .collect();
    Ok(AnchorBatch {
        merkle_root: tree.root().to_string(),
        proofs,
    })
}

/// Append-only in-memory receipt store.
///
/// Receipts are never removed; anchoring only fills in their anchoring fields.
#[derive(Debug, Default)]
pub struct ReceiptLedger {
    receipts: RwLock<Vec<Receipt>>,
}

impl ReceiptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a receipt and appends it.
    pub fn issue(&self, params: ReceiptParams) -> Result<Receipt, ReceiptError> {
        let receipt = generate_receipt(params)?;
        self.receipts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(receipt.clone());
        tracing::debug!(receipt_id = %receipt.receipt_id, "Receipt issued");
        Ok(receipt)
    }

    pub fn get(&self, receipt_id: &str) -> Option<Receipt> {
        self.receipts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.receipt_id == receipt_id)
            .cloned()
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn unanchored(&self) -> Vec<Receipt> {
        self.receipts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.merkle_root.is_none())
            .cloned()
            .collect()
    }

    /// Anchors every not-yet-anchored receipt under a single Merkle root.
    ///
    /// Fails with [`ReceiptError::EmptyBatch`] when there is nothing to anchor.
    pub fn anchor_pending(
        &self,
        block_number: u64,
        block_timestamp: DateTime<Utc>,
    ) -> Result<AnchorBatch, ReceiptError> {
        let mut receipts = self
            .receipts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let pending: Vec<Receipt> = receipts
            .iter()
            .filter(|r| r.merkle_root.is_none())
            .cloned()
            .collect();
        let batch = batch_for_anchoring(&pending)?;
        for receipt in receipts.iter_mut().filter(|r| r.merkle_root.is_none()) {
            *receipt = anchor_receipt(
                receipt.clone(),
                batch.merkle_root.clone(),
                block_number,
                block_timestamp,
            );
        }
        tracing::info!(
            merkle_root = %batch.merkle_root,
            receipts = batch.proofs.len(),
            block_number,
            "Anchored receipt batch"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(operation_id: &str) -> ReceiptParams {
        ReceiptParams {
            agent_id: "agent-7".into(),
            operation_type: "inference".into(),
            operation_id: operation_id.into(),
            amount_paid: "10000".into(),
            network_id: "eip155:8453".into(),
            tx_hash: Some("0xabc".into()),
            metadata: json!({"model": "m-1", "tokens": 512}),
        }
    }

    #[test]
    fn test_receipt_id_format() {
        let receipt = generate_receipt(params("op-1")).unwrap();
        let parts: Vec<&str> = receipt.receipt_id.splitn(3, '_').collect();
        assert_eq!(parts[0], "rcpt");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_checksum_survives_anchoring() {
        let receipt = generate_receipt(params("op-1")).unwrap();
        assert!(verify_checksum(&receipt));
        assert!(!receipt.verified);

        let anchored = anchor_receipt(receipt.clone(), "root", 42, Utc::now());
        assert!(anchored.verified);
        assert_eq!(anchored.block_number, Some(42));
        assert_eq!(anchored.checksum, receipt.checksum);
        assert!(verify_checksum(&anchored));
    }

    #[test]
    fn test_tampering_breaks_checksum() {
        let mut receipt = generate_receipt(params("op-1")).unwrap();
        receipt.amount_paid = "20000".into();
        assert!(!verify_checksum(&receipt));

        let mut receipt = generate_receipt(params("op-1")).unwrap();
        receipt.metadata["tokens"] = json!(513);
        assert!(!verify_checksum(&receipt));
    }

    #[test]
    fn test_checksum_ignores_key_order() {
        let receipt = generate_receipt(params("op-1")).unwrap();
        let mut reordered = receipt.clone();
        reordered.metadata = json!({"tokens": 512, "model": "m-1"});
        assert_eq!(
            compute_checksum(&receipt).unwrap(),
            compute_checksum(&reordered).unwrap()
        );
    }

    #[test]
    fn test_receipt_json_is_camel_case() {
        let receipt = generate_receipt(params("op-1")).unwrap();
        let value = serde_json::to_value(&receipt).unwrap();
        for key in [
            "receiptId",
            "agentId",
            "operationType",
            "operationId",
            "amountPaid",
            "networkId",
            "txHash",
            "merkleRoot",
            "blockNumber",
            "blockTimestamp",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_batch_proofs_verify() {
        let receipts: Vec<Receipt> = (0..3)
            .map(|i| generate_receipt(params(&format!("op-{i}"))).unwrap())
            .collect();
        let batch = batch_for_anchoring(&receipts).unwrap();
        assert_eq!(batch.proofs.len(), 3);
        for (receipt, proof) in receipts.iter().zip(&batch.proofs) {
            assert_eq!(proof.receipt_id, receipt.receipt_id);
            assert!(verify_merkle_proof(&receipt.checksum, proof));
        }
    }

    #[test]
    fn test_empty_batch_fails() {
        let err = batch_for_anchoring(&[]).unwrap_err();
        assert!(matches!(err, ReceiptError::EmptyBatch));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_ledger_anchors_pending_once() {
        let ledger = ReceiptLedger::new();
        let first = ledger.issue(params("op-1")).unwrap();
        ledger.issue(params("op-2")).unwrap();
        assert_eq!(ledger.unanchored().len(), 2);

        let batch = ledger.anchor_pending(100, Utc::now()).unwrap();
        assert_eq!(batch.proofs.len(), 2);
        assert!(ledger.unanchored().is_empty());

        let stored = ledger.get(&first.receipt_id).unwrap();
        assert!(stored.verified);
        assert_eq!(stored.merkle_root.as_deref(), Some(batch.merkle_root.as_str()));
        assert!(verify_checksum(&stored));

        assert!(matches!(
            ledger.anchor_pending(101, Utc::now()),
            Err(ReceiptError::EmptyBatch)
        ));

        ledger.issue(params("op-3")).unwrap();
        let second = ledger.anchor_pending(102, Utc::now()).unwrap();
        assert_eq!(second.proofs.len(), 1);
        assert_eq!(ledger.receipts().len(), 3);
    }
}
