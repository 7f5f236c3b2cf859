use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Address, TransactionReceipt, U256};
use log::{info, warn};
use std::sync::Arc;

use crate::contracts::IERC20;
use crate::services::{
    classify_contract_error, send_and_finalize, ContractService, ServiceError, TokenAdapter,
};
use crate::settings::Chain;

/// Adapter for one ERC-20 settlement token.
pub struct TokenService<M: Middleware> {
    address: Address,
    confirmations: usize,
    tx_timeout_seconds: u64,
    contract: ArcSwapOption<IERC20<M>>,
}

impl<M: Middleware + 'static> TokenService<M> {
    pub fn new(address: Address, chain: &Chain) -> Self {
        Self {
            address,
            confirmations: chain.confirmations,
            tx_timeout_seconds: chain.tx_timeout_seconds,
            contract: ArcSwapOption::empty(),
        }
    }

    fn bound(&self) -> Result<Arc<IERC20<M>>, ServiceError> {
        self.contract.load_full().ok_or(ServiceError::NotInitialized)
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractService<M> for TokenService<M> {
    fn contract_id(&self) -> &'static str {
        "erc20_token"
    }

    async fn init(&self, client: Arc<M>) -> bool {
        if self.address.is_zero() {
            warn!("⚠️ [TokenService] refusing to bind the zero address");
            return false;
        }
        self.contract
            .store(Some(Arc::new(IERC20::new(self.address, client))));
        info!("✅ [TokenService] bound {:?}", self.address);
        true
    }

    fn is_initialized(&self) -> bool {
        self.contract.load().is_some()
    }
}

#[async_trait]
impl<M: Middleware + 'static> TokenAdapter for TokenService<M> {
    fn token_address(&self) -> Address {
        self.address
    }

    async fn approve(
        &self,
        spender: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        send_and_finalize(
            contract.approve(spender, amount),
            self.confirmations,
            self.tx_timeout_seconds,
            "IERC20.approve",
        )
        .await
    }

    async fn transfer(
        &self,
        to: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        send_and_finalize(
            contract.transfer(to, amount),
            self.confirmations,
            self.tx_timeout_seconds,
            "IERC20.transfer",
        )
        .await
    }

    async fn transfer_from(
        &self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<TransactionReceipt, ServiceError> {
        let contract = self.bound()?;
        send_and_finalize(
            contract.transfer_from(from, to, amount),
            self.confirmations,
            self.tx_timeout_seconds,
            "IERC20.transferFrom",
        )
        .await
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ServiceError> {
        let contract = self.bound()?;
        contract
            .balance_of(account)
            .call()
            .await
            .map_err(|e| classify_contract_error(e, "IERC20.balanceOf"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{MockProvider, Provider};

    fn mock_client() -> Arc<Provider<MockProvider>> {
        let (provider, _mock) = Provider::mocked();
        Arc::new(provider)
    }

    #[tokio::test]
    async fn operations_fail_before_init() {
        let service: TokenService<Provider<MockProvider>> =
            TokenService::new(Address::repeat_byte(0x11), &Chain::default());
        assert!(!service.is_initialized());
        let err = service.balance_of(Address::zero()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotInitialized));
    }

    #[tokio::test]
    async fn init_rejects_zero_address() {
        let service: TokenService<Provider<MockProvider>> =
            TokenService::new(Address::zero(), &Chain::default());
        assert!(!service.init(mock_client()).await);
        assert!(!service.is_initialized());
        assert!(service.ensure_ready().is_err());
    }

    #[tokio::test]
    async fn init_binds_and_flips_readiness() {
        let service: TokenService<Provider<MockProvider>> =
            TokenService::new(Address::repeat_byte(0x22), &Chain::default());
        assert!(service.init(mock_client()).await);
        assert!(service.is_initialized());
        assert!(service.ensure_ready().is_ok());
    }
}
