//! # Service Locator
//!
//! Owns the lifecycle of every contract adapter. The whole set is built or
//! torn down atomically: consumers either see all core services bound to
//! the same signer epoch, or none at all. Teardown happens first on every
//! rebind, so readiness reads false for the entire window in which any
//! service might be stale.
//!
//! Core services (registry, marketplace) are strict: if either fails to
//! initialize, the locator stays torn down. Settlement-token services are
//! tolerant: a token that fails to bind is logged and skipped so one bad
//! address cannot take the marketplace offline.

use anyhow::{anyhow, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use ethers::providers::Middleware;
use ethers::types::Address;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::services::{
    ContractService, InvoiceNftService, MarketAdapter, MarketplaceService, RegistryAdapter,
    ServiceError, TokenAdapter, TokenService,
};
use crate::settings::Settings;
use crate::types::conversions::string_to_address;
use crate::wallet::{SessionManager, WalletProvider, WalletSession};

/// One signer epoch's worth of bound services.
pub struct ServiceSet<M: Middleware> {
    pub registry: Arc<InvoiceNftService<M>>,
    pub marketplace: Arc<MarketplaceService<M>>,
    tokens: DashMap<Address, Arc<TokenService<M>>>,
    client: Arc<M>,
}

impl<M: Middleware + 'static> ServiceSet<M> {
    pub fn token_addresses(&self) -> Vec<Address> {
        self.tokens.iter().map(|entry| *entry.key()).collect()
    }
}

/// Read-side seam the orchestrator works against; the locator is its only
/// production implementation.
#[async_trait]
pub trait ServiceSource: Send + Sync {
    fn is_ready(&self) -> bool;
    fn registry(&self) -> Result<Arc<dyn RegistryAdapter>, ServiceError>;
    fn marketplace(&self) -> Result<Arc<dyn MarketAdapter>, ServiceError>;
    fn token(&self, address: Address) -> Result<Arc<dyn TokenAdapter>, ServiceError>;
    /// Best-effort late binding of one more settlement token. `false` means
    /// not ready or the token failed to initialize.
    async fn register_token(&self, address: Address) -> bool;
}

pub struct ServiceLocator<P: WalletProvider> {
    settings: Arc<Settings>,
    session: Arc<SessionManager<P>>,
    services: ArcSwapOption<ServiceSet<P::Client>>,
}

impl<P: WalletProvider> ServiceLocator<P> {
    pub fn new(session: Arc<SessionManager<P>>, settings: Arc<Settings>) -> Self {
        Self {
            settings,
            session,
            services: ArcSwapOption::empty(),
        }
    }

    /// Tears the current set down and, for a connected session, builds a
    /// fresh one bound to the session's signer. Any core failure leaves the
    /// locator torn down and returns the cause.
    pub async fn rebind(&self, session: &WalletSession) -> Result<()> {
        self.services.store(None);

        if !session.connected {
            info!("🔍 [Locator] session disconnected, services torn down");
            return Ok(());
        }

        let client = self
            .session
            .provider()
            .signer_client()
            .map_err(|e| anyhow!("signer unavailable: {e}"))?;

        let registry_addr = string_to_address(&self.settings.contracts.invoice_nft)
            .map_err(|e| anyhow!("invalid invoice_nft address: {e}"))?;
        let marketplace_addr = string_to_address(&self.settings.contracts.marketplace)
            .map_err(|e| anyhow!("invalid marketplace address: {e}"))?;

        let registry = Arc::new(InvoiceNftService::new(registry_addr, &self.settings.chain));
        if !registry.init(Arc::clone(&client)).await {
            return Err(anyhow!("invoice NFT registry failed to initialize"));
        }

        let marketplace = Arc::new(MarketplaceService::new(
            marketplace_addr,
            &self.settings.chain,
        ));
        if !marketplace.init(Arc::clone(&client)).await {
            return Err(anyhow!("lending marketplace failed to initialize"));
        }

        let tokens = DashMap::new();
        for raw in &self.settings.contracts.supported_tokens {
            match string_to_address(raw) {
                Ok(addr) => {
                    let token = Arc::new(TokenService::new(addr, &self.settings.chain));
                    if token.init(Arc::clone(&client)).await {
                        tokens.insert(addr, token);
                    } else {
                        warn!(
                            "⚠️ [Locator] token service {:?} failed to initialize, skipping",
                            addr
                        );
                    }
                }
                Err(e) => {
                    warn!("⚠️ [Locator] bad token address {}: {}, skipping", raw, e);
                }
            }
        }

        let bound_tokens = tokens.len();
        self.services.store(Some(Arc::new(ServiceSet {
            registry,
            marketplace,
            tokens,
            client,
        })));
        info!(
            "✅ [Locator] services ready ({} settlement tokens bound)",
            bound_tokens
        );
        Ok(())
    }

    /// Binds one more settlement token into the current set. Returns
    /// `false`, without side effects, when the locator is not ready or the
    /// token fails to initialize.
    pub async fn add_token_service(&self, address: Address) -> bool {
        let set = match self.services.load_full() {
            Some(set) => set,
            None => {
                warn!("⚠️ [Locator] add_token_service called before services are ready");
                return false;
            }
        };

        if set.tokens.contains_key(&address) {
            return true;
        }

        let token = Arc::new(TokenService::new(address, &self.settings.chain));
        if !token.init(Arc::clone(&set.client)).await {
            return false;
        }

        // If a rebind swapped the set mid-flight this insert lands in the
        // stale epoch and dies with it, same as any other stale completion.
        set.tokens.insert(address, token);
        info!("✅ [Locator] settlement token {:?} bound", address);
        true
    }

    pub fn current(&self) -> Option<Arc<ServiceSet<P::Client>>> {
        self.services.load_full()
    }

    /// Follows the session channel, rebinding on the current state first
    /// and then on every transition.
    pub fn spawn_session_watcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let locator = Arc::clone(self);
        let mut rx = locator.session.subscribe();
        tokio::spawn(async move {
            loop {
                let session = *rx.borrow_and_update();
                if let Err(e) = locator.rebind(&session).await {
                    error!("⚠️ [Locator] rebind failed: {:#}", e);
                }
                if rx.changed().await.is_err() {
                    debug!("[Locator] session channel closed, watcher exiting");
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl<P: WalletProvider> ServiceSource for ServiceLocator<P> {
    fn is_ready(&self) -> bool {
        self.services.load().is_some()
    }

    fn registry(&self) -> Result<Arc<dyn RegistryAdapter>, ServiceError> {
        self.services
            .load_full()
            .map(|set| set.registry.clone() as Arc<dyn RegistryAdapter>)
            .ok_or(ServiceError::NotInitialized)
    }

    fn marketplace(&self) -> Result<Arc<dyn MarketAdapter>, ServiceError> {
        self.services
            .load_full()
            .map(|set| set.marketplace.clone() as Arc<dyn MarketAdapter>)
            .ok_or(ServiceError::NotInitialized)
    }

    fn token(&self, address: Address) -> Result<Arc<dyn TokenAdapter>, ServiceError> {
        let set = self
            .services
            .load_full()
            .ok_or(ServiceError::NotInitialized)?;
        set.tokens
            .get(&address)
            .map(|entry| entry.value().clone() as Arc<dyn TokenAdapter>)
            .ok_or(ServiceError::UnknownToken(address))
    }

    async fn register_token(&self, address: Address) -> bool {
        self.add_token_service(address).await
    }
}
