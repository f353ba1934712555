//! Partially-signed SPL transfers for the "exact" scheme.
//!
//! [`build_signed_transfer_transaction`] resolves the mint and both associated
//! token accounts, then compiles a V0 message with the facilitator as fee payer
//! and signs it with the payer's key only. The fee-payer signature slot is left
//! empty for the facilitator to fill.

use serde::{Deserialize, Serialize};
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::VersionedMessage;
use solana_message::compiled_instruction::CompiledInstruction;
use solana_message::v0::Message as MessageV0;
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use x402_settle_types::util::Base64Bytes;

use crate::chain::Address;
use crate::rpc::RpcClientLike;

pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Compute units reserved for the transaction. A `TransferChecked` plus two
/// compute-budget instructions stays well below this for both token programs.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 40_000;

/// Ceiling on the priority fee: one lamport per compute unit.
pub const MAX_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 1_000_000;

/// The object a facilitator expects under `paymentPayload.payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Base64 of the bincode-serialized `VersionedTransaction`
    pub transaction: String,
}

/// Transfer to build.
#[derive(Debug, Clone)]
pub struct TransferParams {
    /// Facilitator-supplied account that pays the transaction fee
    pub fee_payer: Pubkey,
    pub pay_to: Address,
    /// Token mint
    pub asset: Address,
    /// Atomic units
    pub amount: u64,
    pub compute_unit_limit: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum SolanaExactError {
    #[error("Fee payer must differ from the paying owner")]
    FeePayerIsOwner,
    #[error("Recipient token account {0} does not exist")]
    RecipientAccountMissing(Pubkey),
    #[error("Mint account {0} does not exist")]
    MintAccountMissing(Pubkey),
    #[error("Mint {0} is not owned by a token program")]
    UnknownMintOwner(Pubkey),
    #[error("Can not unpack mint {mint}: {reason}")]
    MintUnpack { mint: Pubkey, reason: String },
    #[error("Fee payer included in instruction accounts")]
    FeePayerIncludedInInstructionAccounts,
    #[error("Can not build transfer instruction: {0}")]
    TransferInstruction(String),
    #[error("Can not compile transaction message: {0}")]
    MessageCompile(String),
    #[error("Solana RPC call failed: {0}")]
    Rpc(#[source] Box<solana_client::client_error::ClientError>),
    #[error(transparent)]
    Sign(#[from] TransactionSignError),
    #[error(transparent)]
    Encode(#[from] TransactionToB64Error),
    #[error("Instruction at index {0} not found")]
    NoInstructionAtIndex(usize),
    #[error("No account at index {0}")]
    NoAccountAtIndex(u8),
}

impl From<solana_client::client_error::ClientError> for SolanaExactError {
    fn from(value: solana_client::client_error::ClientError) -> Self {
        SolanaExactError::Rpc(Box::new(value))
    }
}

impl SolanaExactError {
    /// RPC failures are worth retrying, everything else is a property of the input.
    pub fn is_transient(&self) -> bool {
        matches!(self, SolanaExactError::Rpc(_))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Can not sign transaction: {0}")]
pub struct TransactionSignError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("Can not encode transaction to base64: {0}")]
pub struct TransactionToB64Error(String);

/// Mint information for SPL tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mint {
    Token { decimals: u8 },
    Token2022 { decimals: u8 },
}

impl Mint {
    pub fn token_program(&self) -> Pubkey {
        match self {
            Mint::Token { .. } => spl_token::id(),
            Mint::Token2022 { .. } => spl_token_2022::id(),
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Mint::Token { decimals } | Mint::Token2022 { decimals } => *decimals,
        }
    }

    fn unpack(mint: &Pubkey, account: &solana_account::Account) -> Result<Self, SolanaExactError> {
        let unpack_error = |e: &dyn std::fmt::Display| SolanaExactError::MintUnpack {
            mint: *mint,
            reason: e.to_string(),
        };
        if account.owner == spl_token::id() {
            let state = spl_token::state::Mint::unpack(&account.data).map_err(|e| unpack_error(&e))?;
            Ok(Mint::Token {
                decimals: state.decimals,
            })
        } else if account.owner == spl_token_2022::id() {
            // Token-2022 mints may carry extensions after the base layout.
            let base = account
                .data
                .get(..spl_token_2022::state::Mint::LEN)
                .ok_or_else(|| unpack_error(&"account data too short"))?;
            let state = spl_token_2022::state::Mint::unpack(base).map_err(|e| unpack_error(&e))?;
            Ok(Mint::Token2022 {
                decimals: state.decimals,
            })
        } else {
            Err(SolanaExactError::UnknownMintOwner(*mint))
        }
    }
}

/// Associated token account of `owner` for `mint` under `token_program`.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Lowest non-zero recent priority fee for the written accounts, capped at
/// [`MAX_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS`]. Defaults to 1 micro-lamport.
pub async fn get_priority_fee_micro_lamports<R: RpcClientLike>(
    rpc_client: &R,
    writeable_accounts: &[Pubkey],
) -> Result<u64, SolanaExactError> {
    let recent_fees = rpc_client
        .get_recent_prioritization_fees(writeable_accounts)
        .await?;
    let fee = recent_fees
        .iter()
        .map(|e| e.prioritization_fee)
        .filter(|fee| *fee > 0)
        .min()
        .unwrap_or(1);
    Ok(fee.min(MAX_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS))
}

/// Builds the three-instruction transfer and signs it as the token owner.
///
/// Fails with [`SolanaExactError::FeePayerIsOwner`] before any RPC call when the
/// fee payer is the signer, and with [`SolanaExactError::RecipientAccountMissing`]
/// when the recipient has no token account: no account-creation instruction is
/// ever added.
pub async fn build_signed_transfer_transaction<S: Signer, R: RpcClientLike>(
    signer: &S,
    rpc_client: &R,
    params: &TransferParams,
) -> Result<TransactionInt, SolanaExactError> {
    let owner = signer.pubkey();
    if params.fee_payer == owner {
        return Err(SolanaExactError::FeePayerIsOwner);
    }

    let mint_pubkey = *params.asset.pubkey();
    let token_programs = [spl_token::id(), spl_token_2022::id()];
    // The recipient ATA depends on the token program, which is only known once the
    // mint is fetched; ask for both candidates in the same round trip.
    let recipient_candidates = token_programs
        .map(|program| associated_token_address(params.pay_to.pubkey(), &mint_pubkey, &program));
    let accounts = rpc_client
        .get_multiple_accounts(&[
            mint_pubkey,
            recipient_candidates[0],
            recipient_candidates[1],
        ])
        .await?;

    let mint_account = accounts
        .first()
        .cloned()
        .flatten()
        .ok_or(SolanaExactError::MintAccountMissing(mint_pubkey))?;
    let mint = Mint::unpack(&mint_pubkey, &mint_account)?;
    let token_program = mint.token_program();

    let (destination_ata, destination_exists) = match mint {
        Mint::Token { .. } => (recipient_candidates[0], accounts.get(1)),
        Mint::Token2022 { .. } => (recipient_candidates[1], accounts.get(2)),
    };
    if !matches!(destination_exists, Some(Some(_))) {
        return Err(SolanaExactError::RecipientAccountMissing(destination_ata));
    }
    let source_ata = associated_token_address(&owner, &mint_pubkey, &token_program);

    let transfer_instruction = match mint {
        Mint::Token { decimals } => spl_token::instruction::transfer_checked(
            &token_program,
            &source_ata,
            &mint_pubkey,
            &destination_ata,
            &owner,
            &[],
            params.amount,
            decimals,
        ),
        Mint::Token2022 { decimals } => spl_token_2022::instruction::transfer_checked(
            &token_program,
            &source_ata,
            &mint_pubkey,
            &destination_ata,
            &owner,
            &[],
            params.amount,
            decimals,
        ),
    }
    .map_err(|e| SolanaExactError::TransferInstruction(e.to_string()))?;

    if transfer_instruction
        .accounts
        .iter()
        .any(|meta| meta.pubkey == params.fee_payer)
    {
        return Err(SolanaExactError::FeePayerIncludedInInstructionAccounts);
    }

    let recent_blockhash = rpc_client.get_latest_blockhash().await?;
    let priority_fee = get_priority_fee_micro_lamports(
        rpc_client,
        &[params.fee_payer, destination_ata, source_ata],
    )
    .await?;

    let instructions = [
        ComputeBudgetInstruction::set_compute_unit_limit(params.compute_unit_limit),
        ComputeBudgetInstruction::set_compute_unit_price(priority_fee),
        transfer_instruction,
    ];
    let message = MessageV0::try_compile(&params.fee_payer, &instructions, &[], recent_blockhash)
        .map_err(|e| SolanaExactError::MessageCompile(format!("{e:?}")))?;

    let tx = TransactionInt::new(VersionedTransaction {
        signatures: vec![],
        message: VersionedMessage::V0(message),
    });
    let signed = tx.sign_with_keypair(signer)?;

    tracing::debug!(
        owner = %owner,
        fee_payer = %params.fee_payer,
        mint = %mint_pubkey,
        amount = params.amount,
        priority_fee,
        "Built partially-signed SPL transfer"
    );

    Ok(signed)
}

/// A versioned transaction with helpers for inspection and partial signing.
#[derive(Debug, Clone)]
pub struct TransactionInt {
    inner: VersionedTransaction,
}

impl TransactionInt {
    pub fn new(transaction: VersionedTransaction) -> Self {
        Self { inner: transaction }
    }

    pub fn inner(&self) -> &VersionedTransaction {
        &self.inner
    }

    pub fn instruction_count(&self) -> usize {
        self.inner.message.instructions().len()
    }

    pub fn instruction(&self, index: usize) -> Result<InstructionInt, SolanaExactError> {
        let instruction = self
            .inner
            .message
            .instructions()
            .get(index)
            .cloned()
            .ok_or(SolanaExactError::NoInstructionAtIndex(index))?;
        let account_keys = self.inner.message.static_account_keys().to_vec();

        Ok(InstructionInt {
            instruction,
            account_keys,
        })
    }

    /// Signature slots that are still empty.
    pub fn missing_signatures(&self) -> usize {
        let num_required = self.inner.message.header().num_required_signatures as usize;
        let default = Signature::default();
        let present = self
            .inner
            .signatures
            .iter()
            .take(num_required)
            .filter(|s| **s != default)
            .count();
        num_required - present
    }

    /// Places the signer's signature at its position among the required signers.
    /// Other slots are left as default signatures.
    pub fn sign_with_keypair<S: Signer>(self, signer: &S) -> Result<Self, TransactionSignError> {
        let mut tx = self.inner;
        let msg_bytes = tx.message.serialize();
        let signature = signer
            .try_sign_message(msg_bytes.as_slice())
            .map_err(|e| TransactionSignError(format!("{e}")))?;

        let num_required = tx.message.header().num_required_signatures as usize;
        let static_keys = tx.message.static_account_keys();

        let pos = static_keys
            .iter()
            .take(num_required)
            .position(|k| *k == signer.pubkey())
            .ok_or(TransactionSignError(
                "Signer not found in required signers".to_string(),
            ))?;

        if tx.signatures.len() < num_required {
            tx.signatures.resize(num_required, Signature::default());
        }
        tx.signatures[pos] = signature;
        Ok(Self { inner: tx })
    }

    pub fn as_base64(&self) -> Result<String, TransactionToB64Error> {
        let bytes =
            bincode::serialize(&self.inner).map_err(|e| TransactionToB64Error(format!("{e}")))?;
        Ok(Base64Bytes::encode(bytes).to_string())
    }

    pub fn to_payload(&self) -> Result<ExactSolanaPayload, TransactionToB64Error> {
        Ok(ExactSolanaPayload {
            transaction: self.as_base64()?,
        })
    }
}

/// A compiled instruction together with the message's account keys.
pub struct InstructionInt {
    instruction: CompiledInstruction,
    account_keys: Vec<Pubkey>,
}

impl InstructionInt {
    pub fn data_slice(&self) -> &[u8] {
        self.instruction.data.as_slice()
    }

    pub fn program_id(&self) -> Pubkey {
        *self.instruction.program_id(self.account_keys.as_slice())
    }

    pub fn accounts(&self) -> Vec<Pubkey> {
        self.instruction
            .accounts
            .iter()
            .filter_map(|i| self.account_keys.get(*i as usize).copied())
            .collect()
    }

    pub fn account(&self, index: u8) -> Result<Pubkey, SolanaExactError> {
        let account_index = self
            .instruction
            .accounts
            .get(index as usize)
            .cloned()
            .ok_or(SolanaExactError::NoAccountAtIndex(index))?;
        self.account_keys
            .get(account_index as usize)
            .cloned()
            .ok_or(SolanaExactError::NoAccountAtIndex(index))
    }
}
