//! Chain-specific signed payment authorizations.
//!
//! An [`Authorization`] is what goes under `paymentPayload.payload`: an ERC-3009
//! signature on EVM networks, a partially-signed transfer transaction on Solana.
//! Which path runs is decided by the [`NetworkKind`] alone. Every local
//! precondition (network, key family, addresses, amount, fee payer) is checked
//! before any signing or RPC call.

use alloy_signer_local::PrivateKeySigner;
use serde::{Serialize, Serializer};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use std::str::FromStr;
use std::sync::Arc;
use x402_settle_eip155::chain::{Eip155ChainReference, TokenDeploymentEip712, parse_atomic_amount};
use x402_settle_eip155::exact::ExactEvmPayload;
use x402_settle_eip155::{Eip3009SigningParams, Erc3009SignError, networks as eip155_networks};
use x402_settle_solana::chain::cluster_of;
use x402_settle_solana::exact::DEFAULT_COMPUTE_UNIT_LIMIT;
use x402_settle_solana::rpc::RpcClientLike;
use x402_settle_solana::{
    ExactSolanaPayload, SolanaExactError, TransferParams, build_signed_transfer_transaction,
    networks as solana_networks,
};
use x402_settle_types::chain::NetworkKind;
use x402_settle_types::proto::PaymentRequirements;

use crate::config::Config;

/// The payer's signing key. Its family must match the network it pays on.
#[derive(Clone)]
pub enum PayerKey {
    Evm(PrivateKeySigner),
    Solana(Arc<Keypair>),
}

impl PayerKey {
    pub fn solana(keypair: Keypair) -> Self {
        PayerKey::Solana(Arc::new(keypair))
    }

    /// Address in the family's usual spelling: EIP-55 hex or base58.
    pub fn address(&self) -> String {
        match self {
            PayerKey::Evm(signer) => signer.address().to_checksum(None),
            PayerKey::Solana(keypair) => keypair.pubkey().to_string(),
        }
    }

    fn family(&self) -> &'static str {
        match self {
            PayerKey::Evm(_) => "EVM",
            PayerKey::Solana(_) => "Solana",
        }
    }
}

impl std::fmt::Debug for PayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(self.family()).field(&self.address()).finish()
    }
}

/// A signed payment instruction a facilitator can execute, and nothing more.
#[derive(Debug, Clone)]
pub enum Authorization {
    /// ERC-3009 authorization and its signature.
    Evm(ExactEvmPayload),
    /// Base64 partially-signed versioned transaction, missing only the fee payer's signature.
    Solana {
        transaction: String,
        /// Keys that have signed, base58.
        signers: Vec<String>,
    },
}

impl Authorization {
    pub fn payer(&self) -> Option<String> {
        match self {
            Authorization::Evm(payload) => Some(payload.authorization.from.to_checksum(None)),
            Authorization::Solana { signers, .. } => signers.first().cloned(),
        }
    }
}

/// Serializes to the wire payload: `{signature, authorization}` or `{transaction}`.
impl Serialize for Authorization {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Authorization::Evm(payload) => payload.serialize(serializer),
            Authorization::Solana { transaction, .. } => ExactSolanaPayload {
                transaction: transaction.clone(),
            }
            .serialize(serializer),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Network {network} is not supported on the {expected} path")]
    InvalidNetwork {
        network: NetworkKind,
        expected: &'static str,
    },
    #[error("{key} key can not pay on {network}")]
    KeyNetworkMismatch {
        key: &'static str,
        network: NetworkKind,
    },
    #[error("Invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("Invalid atomic amount: {0}")]
    InvalidAmount(String),
    #[error("No known asset on {0}, an explicit asset is required")]
    UnknownAsset(NetworkKind),
    #[error("Solana payments require a facilitator fee payer")]
    FeePayerMissing,
    #[error("Fee payer must differ from the paying owner")]
    FeePayerIsOwner,
    #[error("Recipient token account {0} does not exist")]
    RecipientAccountMissing(String),
    #[error("No Solana RPC client configured")]
    SolanaRpcNotConfigured,
    #[error(transparent)]
    EvmSigning(#[from] Erc3009SignError),
    #[error(transparent)]
    Solana(SolanaExactError),
}

impl AuthorizationError {
    /// Only RPC hiccups while assembling a Solana transaction are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthorizationError::Solana(e) if e.is_transient())
    }
}

impl From<SolanaExactError> for AuthorizationError {
    fn from(value: SolanaExactError) -> Self {
        match value {
            SolanaExactError::FeePayerIsOwner => AuthorizationError::FeePayerIsOwner,
            SolanaExactError::RecipientAccountMissing(ata) => {
                AuthorizationError::RecipientAccountMissing(ata.to_string())
            }
            other => AuthorizationError::Solana(other),
        }
    }
}

/// Extra inputs that only one chain family uses.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    /// Solana: facilitator account that pays the transaction fee. Required.
    pub fee_payer: Option<String>,
    /// EVM: EIP-712 domain of the asset. Defaults to the known USDC domain.
    pub eip712: Option<TokenDeploymentEip712>,
}

impl AuthorizationOptions {
    /// Reads `extra.feePayer` and `extra.{name, version}` from the requirements.
    pub fn from_requirements(requirements: &PaymentRequirements) -> Self {
        let eip712 = requirements
            .extra
            .as_ref()
            .and_then(|extra| serde_json::from_value(extra.clone()).ok());
        Self {
            fee_payer: requirements.fee_payer().map(str::to_string),
            eip712,
        }
    }
}

/// Builds authorizations. Solana payments need an RPC client to look up the
/// mint and token accounts; EVM payments need nothing but the key.
#[derive(Debug, Clone)]
pub struct AuthorizationBuilder<R = Arc<RpcClient>> {
    solana_rpc: Option<R>,
    compute_unit_limit: u32,
}

impl AuthorizationBuilder {
    /// A builder that can only sign EVM authorizations.
    pub fn evm_only() -> Self {
        Self {
            solana_rpc: None,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
        }
    }
}

impl AuthorizationBuilder {
    /// Connects to `solana_rpc_url` when the config names one; EVM-only otherwise.
    pub fn from_config(config: &Config) -> Self {
        let builder = Self::evm_only();
        match &config.solana_rpc_url {
            Some(url) => {
                let rpc = RpcClient::new(url.inner().to_string());
                builder.with_solana_rpc(Arc::new(rpc))
            }
            None => builder,
        }
    }
}

impl Default for AuthorizationBuilder {
    fn default() -> Self {
        Self::evm_only()
    }
}

impl<R> AuthorizationBuilder<R> {
    pub fn with_solana_rpc<R2: RpcClientLike>(self, rpc: R2) -> AuthorizationBuilder<R2> {
        AuthorizationBuilder {
            solana_rpc: Some(rpc),
            compute_unit_limit: self.compute_unit_limit,
        }
    }

    pub fn with_compute_unit_limit(mut self, limit: u32) -> Self {
        self.compute_unit_limit = limit;
        self
    }

    pub fn has_solana_rpc(&self) -> bool {
        self.solana_rpc.is_some()
    }
}

impl<R: RpcClientLike + Sync> AuthorizationBuilder<R> {
    /// Signs `requirements` with `payer`, reading the fee payer and EIP-712
    /// domain from `requirements.extra`.
    pub async fn authorize(
        &self,
        requirements: &PaymentRequirements,
        payer: &PayerKey,
    ) -> Result<Authorization, AuthorizationError> {
        self.build_authorization(
            requirements.network,
            payer,
            &requirements.pay_to,
            &requirements.max_amount_required,
            Some(requirements.asset.as_str()),
            &AuthorizationOptions::from_requirements(requirements),
        )
        .await
    }

    /// Signs a transfer of `amount_atomic` of `asset` (USDC when `None`) to
    /// `recipient` on `network`.
    #[tracing::instrument(skip_all, fields(network = %network, payer = %payer.address()), err)]
    pub async fn build_authorization(
        &self,
        network: NetworkKind,
        payer: &PayerKey,
        recipient: &str,
        amount_atomic: &str,
        asset: Option<&str>,
        options: &AuthorizationOptions,
    ) -> Result<Authorization, AuthorizationError> {
        match network {
            NetworkKind::Evm { .. } => {
                let PayerKey::Evm(signer) = payer else {
                    return Err(AuthorizationError::KeyNetworkMismatch {
                        key: payer.family(),
                        network,
                    });
                };
                build_evm(network, signer, recipient, amount_atomic, asset, options).await
            }
            NetworkKind::Solana(_) => {
                let PayerKey::Solana(keypair) = payer else {
                    return Err(AuthorizationError::KeyNetworkMismatch {
                        key: payer.family(),
                        network,
                    });
                };
                self.build_solana(network, keypair, recipient, amount_atomic, asset, options)
                    .await
            }
        }
    }

    async fn build_solana(
        &self,
        network: NetworkKind,
        keypair: &Keypair,
        recipient: &str,
        amount_atomic: &str,
        asset: Option<&str>,
        options: &AuthorizationOptions,
    ) -> Result<Authorization, AuthorizationError> {
        let cluster = cluster_of(network).map_err(|_| AuthorizationError::InvalidNetwork {
            network,
            expected: "Solana",
        })?;
        let fee_payer = options
            .fee_payer
            .as_deref()
            .ok_or(AuthorizationError::FeePayerMissing)?;
        let fee_payer = parse_solana_address("feePayer", fee_payer)?;
        if fee_payer == keypair.pubkey() {
            return Err(AuthorizationError::FeePayerIsOwner);
        }
        let pay_to = parse_solana_address("payTo", recipient)?;
        let amount = amount_atomic
            .parse::<u64>()
            .map_err(|_| AuthorizationError::InvalidAmount(amount_atomic.to_string()))?;
        let mint = match asset {
            Some(asset) => parse_solana_address("asset", asset)?,
            None => *solana_networks::usdc_deployment(cluster).mint.pubkey(),
        };
        let rpc = self
            .solana_rpc
            .as_ref()
            .ok_or(AuthorizationError::SolanaRpcNotConfigured)?;

        let params = TransferParams {
            fee_payer,
            pay_to: pay_to.into(),
            asset: mint.into(),
            amount,
            compute_unit_limit: self.compute_unit_limit,
        };
        let ExactSolanaPayload { transaction } =
            build_signed_transfer_transaction(keypair, rpc, &params)
                .await?
                .to_payload()
                .map_err(|e| AuthorizationError::Solana(e.into()))?;

        Ok(Authorization::Solana {
            transaction,
            signers: vec![keypair.pubkey().to_string()],
        })
    }
}

async fn build_evm(
    network: NetworkKind,
    signer: &PrivateKeySigner,
    recipient: &str,
    amount_atomic: &str,
    asset: Option<&str>,
    options: &AuthorizationOptions,
) -> Result<Authorization, AuthorizationError> {
    let invalid = || AuthorizationError::InvalidNetwork {
        network,
        expected: "EVM",
    };
    if !network.is_known() {
        return Err(invalid());
    }
    let chain = Eip155ChainReference::try_from(network).map_err(|_| invalid())?;
    let pay_to = parse_evm_address("payTo", recipient)?;
    let amount = parse_atomic_amount(amount_atomic)
        .ok_or_else(|| AuthorizationError::InvalidAmount(amount_atomic.to_string()))?;
    let asset_address = match asset {
        Some(asset) => parse_evm_address("asset", asset)?,
        None => {
            eip155_networks::usdc_deployment(chain.inner())
                .ok_or(AuthorizationError::UnknownAsset(network))?
                .address
        }
    };
    let domain = options
        .eip712
        .clone()
        .or_else(|| {
            eip155_networks::usdc_by_address(chain.inner(), &asset_address)
                .map(|deployment| deployment.eip712.clone())
        })
        .unwrap_or_default();

    let params = Eip3009SigningParams {
        chain_id: chain.inner(),
        asset_address,
        pay_to,
        amount,
        domain,
    };
    let payload = x402_settle_eip155::sign_erc3009_authorization(signer, &params).await?;
    Ok(Authorization::Evm(payload))
}

fn parse_evm_address(
    field: &'static str,
    value: &str,
) -> Result<alloy_primitives::Address, AuthorizationError> {
    alloy_primitives::Address::from_str(value).map_err(|_| AuthorizationError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn parse_solana_address(field: &'static str, value: &str) -> Result<Pubkey, AuthorizationError> {
    Pubkey::from_str(value).map_err(|_| AuthorizationError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use solana_account::Account;
    use solana_client::client_error::ClientError;
    use solana_client::rpc_response::RpcPrioritizationFee;
    use solana_message::Hash;
    use solana_transaction::versioned::VersionedTransaction;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use x402_settle_solana::exact::{Mint, TransactionInt, associated_token_address};
    use x402_settle_types::chain::SolanaCluster;
    use x402_settle_types::util::Base64Bytes;

    const EVM_PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const SOL_PAY_TO: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    /// An RPC that has no accounts and counts how often it is asked.
    #[derive(Default, Clone)]
    struct CountingRpc {
        calls: Arc<AtomicUsize>,
    }

    impl RpcClientLike for CountingRpc {
        async fn get_multiple_accounts(
            &self,
            pubkeys: &[Pubkey],
        ) -> Result<Vec<Option<Account>>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![None; pubkeys.len()])
        }

        async fn get_recent_prioritization_fees(
            &self,
            _addresses: &[Pubkey],
        ) -> Result<Vec<RpcPrioritizationFee>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn get_latest_blockhash(&self) -> Result<Hash, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Hash::default())
        }
    }

    /// An RPC that serves a fixed set of accounts.
    #[derive(Clone)]
    struct AccountsRpc {
        accounts: Arc<HashMap<Pubkey, Account>>,
    }

    impl AccountsRpc {
        fn new(accounts: impl IntoIterator<Item = (Pubkey, Account)>) -> Self {
            Self {
                accounts: Arc::new(accounts.into_iter().collect()),
            }
        }
    }

    impl RpcClientLike for AccountsRpc {
        async fn get_multiple_accounts(
            &self,
            pubkeys: &[Pubkey],
        ) -> Result<Vec<Option<Account>>, ClientError> {
            Ok(pubkeys.iter().map(|p| self.accounts.get(p).cloned()).collect())
        }

        async fn get_recent_prioritization_fees(
            &self,
            _addresses: &[Pubkey],
        ) -> Result<Vec<RpcPrioritizationFee>, ClientError> {
            Ok(vec![RpcPrioritizationFee {
                slot: 1,
                prioritization_fee: 5_000,
            }])
        }

        async fn get_latest_blockhash(&self) -> Result<Hash, ClientError> {
            Ok(Hash::default())
        }
    }

    fn token_program() -> Pubkey {
        Mint::Token { decimals: 6 }.token_program()
    }

    fn mint_account() -> Account {
        // Base SPL mint layout: decimals at 44, is_initialized at 45.
        let mut data = vec![0u8; 82];
        data[44] = 6;
        data[45] = 1;
        Account {
            lamports: 1_461_600,
            data,
            owner: token_program(),
            executable: false,
            rent_epoch: 0,
        }
    }

    fn token_account() -> Account {
        Account {
            lamports: 2_039_280,
            data: vec![0u8; 165],
            owner: token_program(),
            executable: false,
            rent_epoch: 0,
        }
    }

    fn solana_options() -> AuthorizationOptions {
        AuthorizationOptions {
            fee_payer: Some("EGBQqKn968sVv5cQh5Cr72pSTHfxsuzq7o7asqYB5uEV".into()),
            eip712: None,
        }
    }

    fn evm_payer() -> PayerKey {
        PayerKey::Evm(PrivateKeySigner::random())
    }

    #[tokio::test]
    async fn test_evm_authorization_on_base() {
        let payer = evm_payer();
        let builder = AuthorizationBuilder::evm_only();
        let auth = builder
            .build_authorization(
                "base".parse().unwrap(),
                &payer,
                EVM_PAY_TO,
                "1000000",
                None,
                &AuthorizationOptions::default(),
            )
            .await
            .unwrap();

        let Authorization::Evm(payload) = &auth else {
            panic!("expected EVM authorization");
        };
        let authorization = payload.authorization;
        assert_eq!(authorization.value, U256::from(1_000_000u64));
        assert_eq!(
            authorization.valid_before.as_secs() - authorization.valid_after.as_secs(),
            3600
        );
        assert_eq!(auth.payer(), Some(payer.address()));

        let wire = serde_json::to_value(&auth).unwrap();
        assert_eq!(wire["authorization"]["value"], "1000000");
        assert_eq!(
            wire["authorization"]["to"].as_str().unwrap().to_lowercase(),
            EVM_PAY_TO.to_lowercase()
        );
        assert!(wire["signature"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn test_unknown_evm_chain_is_invalid_network() {
        let builder = AuthorizationBuilder::evm_only();
        let network = NetworkKind::Evm { chain_id: 999_999 };
        for asset in [Some("0x036CbD53842c5426634e7929541eC2318f3dCF7e"), None] {
            let err = builder
                .build_authorization(
                    network,
                    &evm_payer(),
                    EVM_PAY_TO,
                    "1000000",
                    asset,
                    &AuthorizationOptions::default(),
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, AuthorizationError::InvalidNetwork { expected: "EVM", .. }),
                "{err}"
            );
        }
    }

    #[tokio::test]
    async fn test_evm_nonces_differ_for_identical_inputs() {
        let payer = evm_payer();
        let builder = AuthorizationBuilder::evm_only();
        let network: NetworkKind = "base".parse().unwrap();
        let options = AuthorizationOptions::default();
        let a = builder
            .build_authorization(network, &payer, EVM_PAY_TO, "1000000", None, &options)
            .await
            .unwrap();
        let b = builder
            .build_authorization(network, &payer, EVM_PAY_TO, "1000000", None, &options)
            .await
            .unwrap();
        let (Authorization::Evm(a), Authorization::Evm(b)) = (a, b) else {
            panic!("expected EVM authorizations");
        };
        assert_ne!(a.authorization.nonce, b.authorization.nonce);
    }

    #[tokio::test]
    async fn test_evm_rejects_bad_inputs_locally() {
        let payer = evm_payer();
        let builder = AuthorizationBuilder::evm_only();
        let network: NetworkKind = "base-sepolia".parse().unwrap();
        let options = AuthorizationOptions::default();

        let err = builder
            .build_authorization(network, &payer, "0xnope", "1", None, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorizationError::InvalidAddress { field: "payTo", .. }
        ));

        let err = builder
            .build_authorization(network, &payer, EVM_PAY_TO, "1.5", None, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::InvalidAmount(_)));

        let err = builder
            .build_authorization(
                NetworkKind::Solana(SolanaCluster::Devnet),
                &payer,
                SOL_PAY_TO,
                "1",
                None,
                &options,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorizationError::KeyNetworkMismatch { key: "EVM", .. }
        ));
    }

    #[tokio::test]
    async fn test_options_from_requirements() {
        let requirements = crate::challenge::PaymentChallenge::exact(
            "$0.01",
            "base-sepolia".parse().unwrap(),
            EVM_PAY_TO,
            "https://api.example.com/x",
        )
        .requirements()
        .unwrap();
        let options = AuthorizationOptions::from_requirements(&requirements);
        assert_eq!(
            options.eip712,
            Some(TokenDeploymentEip712 {
                name: "USDC".into(),
                version: "2".into()
            })
        );
        assert_eq!(options.fee_payer, None);

        let auth = AuthorizationBuilder::evm_only()
            .authorize(&requirements, &evm_payer())
            .await
            .unwrap();
        assert!(matches!(auth, Authorization::Evm(_)));
    }

    #[tokio::test]
    async fn test_solana_fee_payer_is_owner_fails_before_rpc() {
        let keypair = Keypair::new();
        let fee_payer = keypair.pubkey().to_string();
        let payer = PayerKey::solana(keypair);
        let rpc = CountingRpc::default();
        let builder = AuthorizationBuilder::evm_only().with_solana_rpc(rpc.clone());

        let err = builder
            .build_authorization(
                NetworkKind::Solana(SolanaCluster::Devnet),
                &payer,
                SOL_PAY_TO,
                "10000",
                None,
                &AuthorizationOptions {
                    fee_payer: Some(fee_payer),
                    eip712: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::FeePayerIsOwner));
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_solana_requires_fee_payer_and_rpc() {
        let payer = PayerKey::solana(Keypair::new());
        let network = NetworkKind::Solana(SolanaCluster::Mainnet);

        let err = AuthorizationBuilder::evm_only()
            .with_solana_rpc(CountingRpc::default())
            .build_authorization(
                network,
                &payer,
                SOL_PAY_TO,
                "10000",
                None,
                &AuthorizationOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::FeePayerMissing));

        let options = AuthorizationOptions {
            fee_payer: Some("EGBQqKn968sVv5cQh5Cr72pSTHfxsuzq7o7asqYB5uEV".into()),
            eip712: None,
        };
        let err = AuthorizationBuilder::evm_only()
            .build_authorization(network, &payer, SOL_PAY_TO, "10000", None, &options)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::SolanaRpcNotConfigured));
    }

    #[tokio::test]
    async fn test_solana_missing_mint_surfaces_as_solana_error() {
        let payer = PayerKey::solana(Keypair::new());
        let options = AuthorizationOptions {
            fee_payer: Some("EGBQqKn968sVv5cQh5Cr72pSTHfxsuzq7o7asqYB5uEV".into()),
            eip712: None,
        };
        let err = AuthorizationBuilder::evm_only()
            .with_solana_rpc(CountingRpc::default())
            .build_authorization(
                NetworkKind::Solana(SolanaCluster::Devnet),
                &payer,
                SOL_PAY_TO,
                "10000",
                None,
                &options,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorizationError::Solana(SolanaExactError::MintAccountMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_solana_partially_signed_authorization() {
        let keypair = Keypair::new();
        let payer_pubkey = keypair.pubkey();
        let payer = PayerKey::solana(keypair);
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::from_str(SOL_PAY_TO).unwrap();
        let recipient_ata = associated_token_address(&pay_to, &mint, &token_program());
        let rpc = AccountsRpc::new([(mint, mint_account()), (recipient_ata, token_account())]);

        let auth = AuthorizationBuilder::evm_only()
            .with_solana_rpc(rpc)
            .build_authorization(
                NetworkKind::Solana(SolanaCluster::Devnet),
                &payer,
                SOL_PAY_TO,
                "10000",
                Some(&mint.to_string()),
                &solana_options(),
            )
            .await
            .unwrap();

        let Authorization::Solana {
            transaction,
            signers,
        } = &auth
        else {
            panic!("expected Solana authorization");
        };
        assert_eq!(signers, &vec![payer_pubkey.to_string()]);
        assert_eq!(auth.payer(), Some(payer_pubkey.to_string()));

        let bytes = Base64Bytes::from(transaction.as_str()).decode().unwrap();
        let decoded: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        let decoded = TransactionInt::new(decoded);
        assert_eq!(decoded.instruction_count(), 3);
        assert_eq!(decoded.missing_signatures(), 1);

        let wire = serde_json::to_value(&auth).unwrap();
        assert_eq!(wire, serde_json::json!({ "transaction": transaction }));
    }

    #[tokio::test]
    async fn test_solana_missing_recipient_account() {
        let payer = PayerKey::solana(Keypair::new());
        let mint = Pubkey::new_unique();
        let pay_to = Pubkey::from_str(SOL_PAY_TO).unwrap();
        let recipient_ata = associated_token_address(&pay_to, &mint, &token_program());
        let rpc = AccountsRpc::new([(mint, mint_account())]);

        let err = AuthorizationBuilder::evm_only()
            .with_solana_rpc(rpc)
            .build_authorization(
                NetworkKind::Solana(SolanaCluster::Devnet),
                &payer,
                SOL_PAY_TO,
                "10000",
                Some(&mint.to_string()),
                &solana_options(),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(&err, AuthorizationError::RecipientAccountMissing(ata) if *ata == recipient_ata.to_string()),
            "{err}"
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_from_config_connects_solana_rpc_when_configured() {
        let config = Config::from_json_str(
            r#"{"facilitator": {"base_url": "https://facilitator.example.com/"}}"#,
        )
        .unwrap();
        assert!(!AuthorizationBuilder::from_config(&config).has_solana_rpc());

        let config = Config::from_json_str(
            r#"{
                "facilitator": {"base_url": "https://facilitator.example.com/"},
                "solana_rpc_url": "http://127.0.0.1:8899"
            }"#,
        )
        .unwrap();
        assert!(AuthorizationBuilder::from_config(&config).has_solana_rpc());
    }
}
