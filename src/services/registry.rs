use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use ethers::abi::RawLog;
use ethers::contract::EthLogDecode;
use ethers::providers::Middleware;
use ethers::types::{Address, TransactionReceipt, U256};
use log::{info, warn};
use std::sync::Arc;

use crate::contracts::{InvoiceMintedFilter, InvoiceNFT};
use crate::services::{
    classify_contract_error, send_and_finalize, ContractService, RegistryAdapter, ServiceError,
};
use crate::settings::Chain;
use crate::types::invoice_data::MintedToken;

/// Adapter for the invoice NFT registry.
pub struct InvoiceNftService<M: Middleware> {
    address: Address,
    confirmations: usize,
    tx_timeout_seconds: u64,
    contract: ArcSwapOption<InvoiceNFT<M>>,
}

impl<M: Middleware + 'static> InvoiceNftService<M> {
    pub fn new(address: Address, chain: &Chain) -> Self {
        Self {
            address,
            confirmations: chain.confirmations,
            tx_timeout_seconds: chain.tx_timeout_seconds,
            contract: ArcSwapOption::empty(),
        }
    }

    fn bound(&self) -> Result<Arc<InvoiceNFT<M>>, ServiceError> {
        self.contract.load_full().ok_or(ServiceError::NotInitialized)
    }

    /// Pulls the minted token id out of the receipt's InvoiceMinted log.
    /// Only logs emitted by the registry itself are considered.
    fn decode_minted_token_id(&self, receipt: &TransactionReceipt) -> Option<U256> {
        receipt
            .logs
            .iter()
            .filter(|log| log.address == self.address)
            .find_map(|log| {
                let raw = RawLog {
                    topics: log.topics.clone(),
                    data: log.data.to_vec(),
                };
                InvoiceMintedFilter::decode_log(&raw)
                    .ok()
                    .map(|ev| ev.token_id)
            })
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractService<M> for InvoiceNftService<M> {
    fn contract_id(&self) -> &'static str {
        "invoice_nft"
    }

    async fn init(&self, client: Arc<M>) -> bool {
        if self.address.is_zero() {
            warn!("⚠️ [InvoiceNftService] refusing to bind the zero address");
            return false;
        }
        self.contract
            .store(Some(Arc::new(InvoiceNFT::new(self.address, client))));
        info!("✅ [InvoiceNftService] bound {:?}", self.address);
        true
    }

    fn is_initialized(&self) -> bool {
        self.contract.load().is_some()
    }
}

#[async_trait]
impl<M: Middleware + 'static> RegistryAdapter for InvoiceNftService<M> {
    async fn mint(&self, metadata_cid: &str) -> Result<MintedToken, ServiceError> {
        let contract = self.bound()?;
        let receipt = send_and_finalize(
            contract.mint_invoice(metadata_cid.to_string()),
            self.confirmations,
            self.tx_timeout_seconds,
            "InvoiceNFT.mintInvoice",
        )
        .await?;

        let token_id = self.decode_minted_token_id(&receipt);
        if token_id.is_none() {
            // Consumers fall back to the indexer when the log is missing
            warn!(
                "⚠️ [InvoiceNftService] no InvoiceMinted log in receipt {:?}",
                receipt.transaction_hash
            );
        }
        Ok(MintedToken {
            tx_hash: receipt.transaction_hash,
            token_id,
        })
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address, ServiceError> {
        let contract = self.bound()?;
        contract
            .owner_of(token_id)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "InvoiceNFT.ownerOf"))
    }

    async fn metadata_pointer(&self, token_id: U256) -> Result<String, ServiceError> {
        let contract = self.bound()?;
        contract
            .token_ur_is(token_id)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "InvoiceNFT.tokenURIs"))
    }

    async fn reputation(&self, user: Address) -> Result<U256, ServiceError> {
        let contract = self.bound()?;
        contract
            .get_reputation(user)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "InvoiceNFT.getReputation"))
    }

    async fn approve(
        &self,
        operator: Address,
        token_id: U256,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        send_and_finalize(
            contract.approve(operator, token_id),
            self.confirmations,
            self.tx_timeout_seconds,
            "InvoiceNFT.approve",
        )
        .await
    }
}
