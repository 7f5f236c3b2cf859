use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Address, TransactionReceipt, U256};
use log::{info, warn};
use std::sync::Arc;

use crate::contracts::LendingMarketplace;
use crate::services::{
    classify_contract_error, send_and_finalize, ContractService, MarketAdapter, ServiceError,
};
use crate::settings::Chain;
use crate::types::invoice_data::{LoanInfo, OfferEntry, PendingOffer};

/// Adapter for the lending marketplace.
pub struct MarketplaceService<M: Middleware> {
    address: Address,
    confirmations: usize,
    tx_timeout_seconds: u64,
    contract: ArcSwapOption<LendingMarketplace<M>>,
}

impl<M: Middleware + 'static> MarketplaceService<M> {
    pub fn new(address: Address, chain: &Chain) -> Self {
        Self {
            address,
            confirmations: chain.confirmations,
            tx_timeout_seconds: chain.tx_timeout_seconds,
            contract: ArcSwapOption::empty(),
        }
    }

    fn bound(&self) -> Result<Arc<LendingMarketplace<M>>, ServiceError> {
        self.contract.load_full().ok_or(ServiceError::NotInitialized)
    }

    async fn finalize<T: ethers::abi::Detokenize>(
        &self,
        call: ethers::contract::ContractCall<M, T>,
        label: &str,
    ) -> Result<TransactionReceipt, ServiceError> {
        send_and_finalize(call, self.confirmations, self.tx_timeout_seconds, label).await
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractService<M> for MarketplaceService<M> {
    fn contract_id(&self) -> &'static str {
        "lending_marketplace"
    }

    async fn init(&self, client: Arc<M>) -> bool {
        if self.address.is_zero() {
            warn!("⚠️ [MarketplaceService] refusing to bind the zero address");
            return false;
        }
        self.contract
            .store(Some(Arc::new(LendingMarketplace::new(self.address, client))));
        info!("✅ [MarketplaceService] bound {:?}", self.address);
        true
    }

    fn is_initialized(&self) -> bool {
        self.contract.load().is_some()
    }
}

#[async_trait]
impl<M: Middleware + 'static> MarketAdapter for MarketplaceService<M> {
    fn market_address(&self) -> Address {
        self.address
    }

    async fn list_invoice(
        &self,
        token_id: U256,
        due_date: U256,
        amount: U256,
        payer_name: &str,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(
            contract.list_invoice_for_loan(token_id, due_date, amount, payer_name.to_string()),
            "LendingMarketplace.listInvoiceForLoan",
        )
        .await
    }

    async fn offer_loan(
        &self,
        token_id: U256,
        token: Address,
        amount: U256,
        interest: U256,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(
            contract.offer_loan(token_id, token, amount, interest),
            "LendingMarketplace.offerLoan",
        )
        .await
    }

    async fn accept_offer(
        &self,
        token_id: U256,
        lender: Address,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(
            contract.accept_loan_offer(token_id, lender),
            "LendingMarketplace.acceptLoanOffer",
        )
        .await
    }

    async fn repay_loan(&self, token_id: U256) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(contract.repay_loan(token_id), "LendingMarketplace.repayLoan")
            .await
    }

    async fn cancel_offer(&self, token_id: U256) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(
            contract.cancel_offer(token_id),
            "LendingMarketplace.cancelOffer",
        )
        .await
    }

    async fn claim_overdue(&self, token_id: U256) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(
            contract.claim_overdue_invoice(token_id),
            "LendingMarketplace.claimOverdueInvoice",
        )
        .await
    }

    async fn add_supported_token(
        &self,
        token: Address,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        self.finalize(
            contract.add_supported_token(token),
            "LendingMarketplace.addSupportedToken",
        )
        .await
    }

    async fn loan(&self, token_id: U256) -> Result<LoanInfo, ServiceError> {
        let contract = self.bound()?;
        let tuple = contract
            .loans(token_id)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.loans"))?;
        Ok(LoanInfo::from(tuple))
    }

    async fn offers(&self, token_id: U256) -> Result<Vec<OfferEntry>, ServiceError> {
        let contract = self.bound()?;
        let (lenders, amounts, interests) = contract
            .get_offers(token_id)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.getOffers"))?;

        if lenders.len() != amounts.len() || lenders.len() != interests.len() {
            return Err(ServiceError::Provider(format!(
                "getOffers arity mismatch: {} lenders, {} amounts, {} interests",
                lenders.len(),
                amounts.len(),
                interests.len()
            )));
        }

        Ok(lenders
            .into_iter()
            .zip(amounts)
            .zip(interests)
            .map(|((lender, amount), interest)| OfferEntry {
                lender,
                amount,
                interest,
            })
            .collect())
    }

    async fn risk_factor(&self, token_id: U256) -> Result<U256, ServiceError> {
        let contract = self.bound()?;
        contract
            .risk_factor(token_id)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.riskFactor"))
    }

    async fn is_listed(&self, token_id: U256) -> Result<bool, ServiceError> {
        let contract = self.bound()?;
        contract
            .is_invoice_listed(token_id)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.isInvoiceListed"))
    }

    async fn is_supported_token(&self, token: Address) -> Result<bool, ServiceError> {
        let contract = self.bound()?;
        contract
            .supported_tokens(token)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.supportedTokens"))
    }

    async fn pending_offer(
        &self,
        token_id: U256,
        lender: Address,
    ) -> Result<PendingOffer, ServiceError> {
        let contract = self.bound()?;
        let (token, amount, interest) = contract
            .pending_offers(token_id, lender)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.pendingOffers"))?;
        Ok(PendingOffer {
            token,
            amount,
            interest,
        })
    }

    async fn offer_lender_at(
        &self,
        token_id: U256,
        index: U256,
    ) -> Result<Address, ServiceError> {
        let contract = self.bound()?;
        contract
            .offer_lenders(token_id, index)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.offerLenders"))
    }

    async fn nft_contract(&self) -> Result<Address, ServiceError> {
        let contract = self.bound()?;
        contract
            .nft_contract()
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.nftContract"))
    }

    async fn owner(&self) -> Result<Address, ServiceError> {
        let contract = self.bound()?;
        contract
            .owner()
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "LendingMarketplace.owner"))
    }
}
