//! # Basic SDK Setup Example
//!
//! This example demonstrates how to initialize the Invoice Lending SDK with all required components:
//! - Settings configuration
//! - Local signing wallet and session restore
//! - Contract service locator
//! - Subgraph read client
//! - IPFS pinning client
//! - Invoice orchestrator
//!
//! ## Prerequisites
//!
//! - Set `INVOICE_SDK_PRIVATE_KEY` environment variable (hex signing key, demo account only)
//! - Set `INVOICE_SDK_RPC_URL` environment variable (or configure in settings)
//! - Set `INVOICE_SDK_NFT_ADDRESS` and `INVOICE_SDK_MARKETPLACE_ADDRESS` for the deployed contracts
//! - Set `INVOICE_SDK_PINATA_JWT` (or API key/secret pair) for pinning
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example basic_setup
//! ```

use invoice_lending_sdk::{
    orchestrator::InvoiceOrchestrator,
    pinning::{MetadataStore, PinataClient},
    services::{ServiceLocator, ServiceSource},
    settings::Settings,
    subgraph::{SubgraphClient, SubgraphReader},
    wallet::{LocalKeyWallet, SessionManager},
};
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    println!("🚀 Initializing Invoice Lending SDK...");

    // 1. Load settings from config file or environment
    let settings = Arc::new(Settings::new().context("Failed to load settings")?);
    println!("✅ Settings loaded");
    println!("   RPC URL: {}", settings.chain.rpc_url);
    println!("   Chain ID: {}", settings.chain.chain_id);
    println!("   Invoice NFT: {}", settings.contracts.invoice_nft);
    println!("   Marketplace: {}", settings.contracts.marketplace);

    // 2. Create the local signing wallet
    let private_key = env::var("INVOICE_SDK_PRIVATE_KEY")
        .context("INVOICE_SDK_PRIVATE_KEY must be set for this example")?;
    let wallet = Arc::new(LocalKeyWallet::new(
        &settings.chain.rpc_url,
        &private_key,
        settings.chain.chain_id,
    )?);
    println!("✅ Wallet created for {:?}", wallet.address());

    // 3. Restore the wallet session (falls back to an explicit connect)
    let manager = Arc::new(SessionManager::new(Arc::clone(&wallet), &settings.session));
    let mut session = manager.restore().await?;
    if !session.connected {
        session = manager.connect().await?;
    }
    println!(
        "✅ Session active: account {:?} on chain {:?}",
        session.account, session.chain_id
    );

    // 4. Bind contract services to the session's signer
    let locator = Arc::new(ServiceLocator::new(
        Arc::clone(&manager),
        Arc::clone(&settings),
    ));
    locator.rebind(&session).await?;
    let bound_tokens = locator
        .current()
        .map(|set| set.token_addresses().len())
        .unwrap_or(0);
    println!(
        "✅ Contract services ready ({} settlement tokens bound)",
        bound_tokens
    );

    // Keep services in lockstep with future session transitions
    let _watcher = locator.spawn_session_watcher();

    // 5. Create the subgraph read client
    let subgraph = Arc::new(SubgraphClient::new(&settings.subgraph)?);
    println!("✅ Subgraph client ready: {}", settings.subgraph.url);

    // 6. Create the IPFS pinning client
    let store = Arc::new(PinataClient::new(&settings.pinning)?);
    println!("✅ Pinning client ready: {}", settings.pinning.gateway);

    // 7. Assemble the orchestrator
    let services: Arc<dyn ServiceSource> = locator;
    let reader: Arc<dyn SubgraphReader> = subgraph;
    let metadata: Arc<dyn MetadataStore> = store;
    let orchestrator = InvoiceOrchestrator::new(services, reader, metadata, Arc::clone(&settings));

    // 8. Pull the first dashboard snapshot
    let account = session
        .account
        .context("session lost its account after connect")?;
    let board = orchestrator.refresh_dashboard(account).await?;
    println!(
        "✅ Dashboard loaded: {} invoices, {} offers received, {} offers sent",
        board.invoices.len(),
        board.offers_received.len(),
        board.offers_sent.len()
    );

    println!("🎉 SDK setup complete!");
    Ok(())
}
