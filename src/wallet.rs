//! # Wallet Session
//!
//! Session state for the signing wallet: who is connected, on which chain,
//! and the one piece of state this crate persists between runs, the
//! explicit-disconnect marker. A user who chose to disconnect stays
//! disconnected across restarts even though the wallet transport would
//! happily hand the account back; the marker is consulted only by
//! `restore`, and cleared again by any successful connect or restore.
//!
//! Transports implement [`WalletProvider`]. The crate ships
//! [`LocalKeyWallet`] (JSON-RPC endpoint + in-memory key), the shape a
//! headless host runs with; browser-extension style transports implement
//! the same trait elsewhere.

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wallet provider error: {0}")]
    Provider(String),
    #[error("no accounts exposed by the wallet")]
    NoAccounts,
    #[error("signer unavailable: {0}")]
    Signer(String),
    #[error("session marker io error: {0}")]
    FlagIo(#[from] std::io::Error),
}

/// Snapshot of the wallet session. `connected` implies `account` is set;
/// the only constructors that mark a session connected take an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletSession {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub connected: bool,
}

impl WalletSession {
    pub fn disconnected() -> Self {
        Self::default()
    }

    fn connected(account: Address, chain_id: Option<u64>) -> Self {
        Self {
            account: Some(account),
            chain_id,
            connected: true,
        }
    }
}

/// Wallet transport seam.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    type Client: Middleware + 'static;

    /// Interactive consent request, the `eth_requestAccounts` analogue.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Silent enumeration, the `eth_accounts` analogue.
    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// A signing client bound to the active account.
    fn signer_client(&self) -> Result<Arc<Self::Client>, WalletError>;

    /// Account-change notifications. An empty vector means the wallet no
    /// longer exposes any account.
    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>>;
}

/// File-backed explicit-disconnect marker. Missing file means unset.
#[derive(Debug, Clone)]
pub struct DisconnectFlag {
    path: PathBuf,
}

impl DisconnectFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn set(&self) -> std::io::Result<()> {
        std::fs::write(&self.path, b"1")
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }
}

/// Owns the session state and fans it out over a watch channel. The locator
/// subscribes and rebinds contract services on every transition.
pub struct SessionManager<P: WalletProvider> {
    provider: Arc<P>,
    flag: DisconnectFlag,
    tx: watch::Sender<WalletSession>,
}

impl<P: WalletProvider> SessionManager<P> {
    pub fn new(provider: Arc<P>, session: &crate::settings::Session) -> Self {
        let (tx, _) = watch::channel(WalletSession::disconnected());
        Self {
            provider,
            flag: DisconnectFlag::new(&session.disconnect_flag_path),
            tx,
        }
    }

    pub fn current(&self) -> WalletSession {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.tx.subscribe()
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Startup path. Honors the explicit-disconnect marker: when set, the
    /// session stays disconnected no matter what the wallet reports.
    pub async fn restore(&self) -> Result<WalletSession, WalletError> {
        if self.flag.is_set() {
            info!("🔍 [Session] explicit disconnect marker present, staying disconnected");
            return Ok(self.current());
        }

        let accounts = self.provider.accounts().await?;
        match accounts.first().copied() {
            Some(account) => {
                let chain_id = self.provider.chain_id().await?;
                if let Err(e) = self.flag.clear() {
                    warn!("⚠️ [Session] could not clear disconnect marker: {}", e);
                }
                Ok(self.adopt(account, chain_id))
            }
            None => {
                debug!("🔍 [Session] no accounts to restore");
                Ok(self.current())
            }
        }
    }

    /// Interactive connect. Clears the marker, asks the wallet for consent,
    /// and adopts the first account. Zero accounts is an error and leaves
    /// the session disconnected.
    pub async fn connect(&self) -> Result<WalletSession, WalletError> {
        if let Err(e) = self.flag.clear() {
            warn!("⚠️ [Session] could not clear disconnect marker: {}", e);
        }
        let accounts = self.provider.request_accounts().await?;
        let account = accounts.first().copied().ok_or(WalletError::NoAccounts)?;
        let chain_id = self.provider.chain_id().await?;
        Ok(self.adopt(account, chain_id))
    }

    /// Records the user's explicit choice and resets the session. The
    /// in-memory reset happens even when persisting the marker fails; the
    /// io error is still surfaced so the host can warn.
    pub fn disconnect(&self) -> Result<(), WalletError> {
        let persisted = self.flag.set().map_err(WalletError::from);
        self.tx.send_replace(WalletSession::disconnected());
        info!("✅ [Session] disconnected");
        persisted
    }

    /// External account-change notification. Empty means the wallet revoked
    /// access; a different first account replaces the current one while the
    /// session stays connected. Notifications while disconnected are
    /// ignored, reconnecting takes an explicit `connect` or `restore`.
    pub fn handle_accounts_changed(&self, accounts: &[Address]) {
        let previous = self.current();
        match accounts.first().copied() {
            None => {
                if previous.connected {
                    info!("📡 [Session] wallet reports no accounts, resetting session");
                    self.tx.send_replace(WalletSession::disconnected());
                }
            }
            Some(account) => {
                if !previous.connected {
                    debug!("🔍 [Session] account notification while disconnected, ignoring");
                    return;
                }
                if previous.account == Some(account) {
                    return;
                }
                info!("📡 [Session] active account switched to {:?}", account);
                self.tx
                    .send_replace(WalletSession::connected(account, previous.chain_id));
            }
        }
    }

    /// Pumps the provider's account stream into `handle_accounts_changed`
    /// until the stream closes.
    pub fn spawn_watcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut rx = manager.provider.subscribe_accounts();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(accounts) => manager.handle_accounts_changed(&accounts),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "⚠️ [Session] account watcher lagged, skipped {} updates",
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("📡 [Session] account stream closed, watcher exiting");
                        break;
                    }
                }
            }
        })
    }

    fn adopt(&self, account: Address, chain_id: u64) -> WalletSession {
        let session = WalletSession::connected(account, Some(chain_id));
        self.tx.send_replace(session);
        info!("✅ [Session] connected as {:?} on chain {}", account, chain_id);
        session
    }
}

/// JSON-RPC endpoint plus an in-memory signing key. The account list never
/// changes on its own; `emit_accounts` exists so hosts and tests can drive
/// the notification path.
pub struct LocalKeyWallet {
    client: Arc<SignerMiddleware<Provider<Http>, LocalWallet>>,
    address: Address,
    chain_id: u64,
    accounts_tx: broadcast::Sender<Vec<Address>>,
}

impl LocalKeyWallet {
    pub fn new(rpc_url: &str, private_key: &str, chain_id: u64) -> Result<Self, WalletError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| WalletError::Provider(e.to_string()))?;
        let wallet: LocalWallet = private_key
            .parse()
            .map_err(|e: ethers::signers::WalletError| WalletError::Signer(e.to_string()))?;
        let wallet = wallet.with_chain_id(chain_id);
        let address = wallet.address();
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let (accounts_tx, _) = broadcast::channel(16);
        Ok(Self {
            client,
            address,
            chain_id,
            accounts_tx,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn emit_accounts(&self, accounts: Vec<Address>) {
        let _ = self.accounts_tx.send(accounts);
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.address])
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.address])
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.chain_id)
    }

    fn signer_client(&self) -> Result<Arc<Self::Client>, WalletError> {
        Ok(Arc::clone(&self.client))
    }

    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>> {
        self.accounts_tx.subscribe()
    }
}
