//! # Contract Service Layer
//!
//! Typed adapters over the three on-chain surfaces (settlement tokens, the
//! invoice NFT registry, the lending marketplace) plus the locator that owns
//! their lifecycle.
//!
//! ## Overview
//!
//! Every adapter follows the same capability contract: it is constructed
//! cheaply from an address, bound to a signing client via `init` (which
//! reports failure as `false` instead of panicking), and refuses every
//! operation with `ServiceError::NotInitialized` until bound. Write calls
//! block until the transaction is final for the configured confirmation
//! count and fail loudly when the transaction is dropped or reverted, so a
//! returned receipt always means ledger state changed.
//!
//! The orchestration layer never touches the concrete types; it sees the
//! `TokenAdapter` / `RegistryAdapter` / `MarketAdapter` traits, which keeps
//! flows testable against in-memory fakes.

use async_trait::async_trait;
use ethers::abi::Detokenize;
use ethers::contract::{ContractCall, ContractError};
use ethers::providers::Middleware;
use ethers::types::{Address, TransactionReceipt, U256};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::types::invoice_data::{LoanInfo, MintedToken, OfferEntry, PendingOffer};

pub mod locator;
pub mod marketplace;
pub mod registry;
pub mod token;

pub use locator::{ServiceLocator, ServiceSet, ServiceSource};
pub use marketplace::MarketplaceService;
pub use registry::InvoiceNftService;
pub use token::TokenService;

/// Failure classes a caller can meaningfully branch on.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Operation attempted before `init` succeeded, or after teardown.
    #[error("contract service not initialized")]
    NotInitialized,
    #[error("provider error: {0}")]
    Provider(String),
    /// The ledger rejected the state change; the reason is the revert
    /// string when one could be decoded.
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("transaction dropped from the mempool")]
    Dropped,
    #[error("no receipt within {seconds}s")]
    Timeout { seconds: u64 },
    /// The locator has no bound service for this settlement token.
    #[error("no bound token service for {0:?}")]
    UnknownToken(Address),
}

/// Lifecycle contract shared by every typed adapter.
#[async_trait]
pub trait ContractService<M: Middleware>: Send + Sync {
    /// Stable name used in logs.
    fn contract_id(&self) -> &'static str;

    /// Binds the adapter to a signing client. Returns `false` on failure
    /// and leaves the adapter unready; never panics.
    async fn init(&self, client: Arc<M>) -> bool;

    fn is_initialized(&self) -> bool;

    fn ensure_ready(&self) -> Result<(), ServiceError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ServiceError::NotInitialized)
        }
    }
}

/// ERC-20 settlement token operations. Amounts are smallest token units;
/// scaling is the caller's concern.
#[async_trait]
pub trait TokenAdapter: Send + Sync {
    fn token_address(&self) -> Address;

    async fn approve(
        &self,
        spender: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, ServiceError>;

    async fn transfer(&self, to: Address, amount: U256)
        -> Result<TransactionReceipt, ServiceError>;

    async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, ServiceError>;

    async fn balance_of(&self, account: Address) -> Result<U256, ServiceError>;
}

/// Adapters are opaque handles; a constant tag keeps `Result`s holding them
/// printable (e.g. `unwrap_err`) without constraining implementors.
impl fmt::Debug for dyn TokenAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn TokenAdapter")
    }
}

/// Invoice NFT registry operations.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Mints against a pinned metadata CID. The token id is recovered from
    /// the receipt's InvoiceMinted log when present.
    async fn mint(&self, metadata_cid: &str) -> Result<MintedToken, ServiceError>;

    async fn owner_of(&self, token_id: U256) -> Result<Address, ServiceError>;

    /// The stored metadata CID for a token.
    async fn metadata_pointer(&self, token_id: U256) -> Result<String, ServiceError>;

    async fn reputation(&self, user: Address) -> Result<U256, ServiceError>;

    /// Grants the operator transfer rights over one token; listing requires
    /// this to be final before the marketplace call is sent.
    async fn approve(
        &self,
        operator: Address,
        token_id: U256,
    ) -> Result<TransactionReceipt, ServiceError>;
}

impl fmt::Debug for dyn RegistryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn RegistryAdapter")
    }
}

/// Lending marketplace operations, writes and confirmation reads.
#[async_trait]
pub trait MarketAdapter: Send + Sync {
    fn market_address(&self) -> Address;

    async fn list_invoice(
        &self,
        token_id: U256,
        due_date: U256,
        amount: U256,
        payer_name: &str,
    ) -> Result<TransactionReceipt, ServiceError>;

    async fn offer_loan(
        &self,
        token_id: U256,
        token: Address,
        amount: U256,
        interest: U256,
    ) -> Result<TransactionReceipt, ServiceError>;

    async fn accept_offer(
        &self,
        token_id: U256,
        lender: Address,
    ) -> Result<TransactionReceipt, ServiceError>;

    async fn repay_loan(&self, token_id: U256) -> Result<TransactionReceipt, ServiceError>;

    async fn cancel_offer(&self, token_id: U256) -> Result<TransactionReceipt, ServiceError>;

    async fn claim_overdue(&self, token_id: U256) -> Result<TransactionReceipt, ServiceError>;

    async fn add_supported_token(
        &self,
        token: Address,
    ) -> Result<TransactionReceipt, ServiceError>;

    async fn loan(&self, token_id: U256) -> Result<LoanInfo, ServiceError>;

    async fn offers(&self, token_id: U256) -> Result<Vec<OfferEntry>, ServiceError>;

    async fn risk_factor(&self, token_id: U256) -> Result<U256, ServiceError>;

    async fn is_listed(&self, token_id: U256) -> Result<bool, ServiceError>;

    async fn is_supported_token(&self, token: Address) -> Result<bool, ServiceError>;

    async fn pending_offer(
        &self,
        token_id: U256,
        lender: Address,
    ) -> Result<PendingOffer, ServiceError>;

    async fn offer_lender_at(&self, token_id: U256, index: U256)
        -> Result<Address, ServiceError>;

    async fn nft_contract(&self) -> Result<Address, ServiceError>;

    async fn owner(&self) -> Result<Address, ServiceError>;
}

impl fmt::Debug for dyn MarketAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn MarketAdapter")
    }
}

/// Splits gas-estimation reverts from transport failures.
pub(crate) fn classify_contract_error<M: Middleware>(
    e: ContractError<M>,
    label: &str,
) -> ServiceError {
    if e.as_revert().is_some() {
        let reason = e
            .decode_revert::<String>()
            .unwrap_or_else(|| "execution reverted".to_string());
        warn!("⚠️ [{}] reverted: {}", label, reason);
        ServiceError::Reverted(reason)
    } else {
        ServiceError::Provider(e.to_string())
    }
}

/// Submits a write and blocks until finality. The returned receipt is
/// guaranteed mined with status 1; a dropped transaction and a mined revert
/// are both hard errors, so callers never treat an in-flight write as done.
pub(crate) async fn send_and_finalize<M, T>(
    call: ContractCall<M, T>,
    confirmations: usize,
    timeout_seconds: u64,
    label: &str,
) -> Result<TransactionReceipt, ServiceError>
where
    M: Middleware + 'static,
    T: Detokenize,
{
    let pending = call
        .send()
        .await
        .map_err(|e| classify_contract_error(e, label))?;
    let tx_hash = *pending;
    debug!("📡 [{}] submitted tx {:?}", label, tx_hash);

    let receipt = timeout(
        Duration::from_secs(timeout_seconds),
        pending.confirmations(confirmations),
    )
    .await
    .map_err(|_| ServiceError::Timeout {
        seconds: timeout_seconds,
    })?
    .map_err(|e| ServiceError::Provider(e.to_string()))?
    .ok_or(ServiceError::Dropped)?;

    if receipt.status != Some(1u64.into()) {
        warn!("⚠️ [{}] tx {:?} mined but reverted", label, tx_hash);
        return Err(ServiceError::Reverted(format!(
            "transaction {:?} reverted on-chain",
            tx_hash
        )));
    }

    debug!("✅ [{}] tx {:?} final", label, tx_hash);
    Ok(receipt)
}
