//! # Dashboard Feed Example
//!
//! This example walks the read side of the Invoice Lending SDK for one
//! account: the per-user dashboard, the public marketplace feed, and the
//! loans falling due soon.
//!
//! ## Overview
//!
//! The example:
//! 1. Initializes the SDK (see `basic_setup.rs` for details)
//! 2. Refreshes the account's dashboard from the indexer
//! 3. Pulls the open marketplace feed, optionally filtered by payer name
//! 4. Lists loans due within the warning window
//! 5. Prints the account's reputation and lifetime volume
//!
//! ## Prerequisites
//!
//! - Same environment as `basic_setup.rs`
//! - The subgraph must be deployed and synced for the configured contracts
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example dashboard_feed -- ACCOUNT_ADDRESS [PAYER_NAME]
//! ```

use invoice_lending_sdk::{
    orchestrator::InvoiceOrchestrator,
    pinning::{MetadataStore, PinataClient},
    services::{ServiceLocator, ServiceSource},
    settings::Settings,
    subgraph::{SubgraphClient, SubgraphReader},
    types::Invoice,
    wallet::{LocalKeyWallet, SessionManager},
};
use anyhow::{Context, Result};
use ethers::types::Address;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

fn print_invoice(invoice: &Invoice, decimals: u32) {
    let amount = invoice
        .display_amount(decimals)
        .map(|d| d.to_string())
        .unwrap_or_else(|| "?".to_string());
    let due = invoice
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "   #{} {:?} | {} due {} | payer {} | {:?}",
        invoice.token_id,
        invoice.owner,
        amount,
        due,
        invoice.payer_name.as_deref().unwrap_or("?"),
        invoice.status
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} ACCOUNT_ADDRESS [PAYER_NAME]", args[0]);
        eprintln!(
            "Example: {} 0x70997970C51812dc3A010C7d01b50e0d17dc79C8 \"Acme Corp\"",
            args[0]
        );
        std::process::exit(1);
    }
    let account = Address::from_str(&args[1]).context("Invalid ACCOUNT_ADDRESS")?;
    let payer = args.get(2).map(String::as_str);

    println!("🔍 Loading dashboard for {:?}", account);

    // Initialize SDK components (simplified - see basic_setup.rs for full setup)
    let settings = Arc::new(Settings::new()?);
    let decimals = settings.contracts.token_decimals;
    let private_key = env::var("INVOICE_SDK_PRIVATE_KEY")
        .context("INVOICE_SDK_PRIVATE_KEY must be set for this example")?;
    let wallet = Arc::new(LocalKeyWallet::new(
        &settings.chain.rpc_url,
        &private_key,
        settings.chain.chain_id,
    )?);
    let manager = Arc::new(SessionManager::new(Arc::clone(&wallet), &settings.session));
    let session = manager.restore().await?;
    let locator = Arc::new(ServiceLocator::new(
        Arc::clone(&manager),
        Arc::clone(&settings),
    ));
    locator.rebind(&session).await?;

    let services: Arc<dyn ServiceSource> = locator;
    let reader: Arc<dyn SubgraphReader> = Arc::new(SubgraphClient::new(&settings.subgraph)?);
    let metadata: Arc<dyn MetadataStore> = Arc::new(PinataClient::new(&settings.pinning)?);
    let orchestrator = InvoiceOrchestrator::new(services, reader, metadata, Arc::clone(&settings));

    // 1. Per-user dashboard
    let board = orchestrator.refresh_dashboard(account).await?;
    println!("\n📋 Your invoices ({}):", board.invoices.len());
    for invoice in &board.invoices {
        print_invoice(invoice, decimals);
    }
    println!("📥 Offers received: {}", board.offers_received.len());
    println!("📤 Offers sent: {}", board.offers_sent.len());
    println!(
        "💰 Loans: {} borrowed, {} lent",
        board.loans_borrowed.len(),
        board.loans_lent.len()
    );

    // 2. Open marketplace feed
    let feed = orchestrator.marketplace_feed(payer).await?;
    match payer {
        Some(name) => println!("\n🏪 Listings with payer \"{}\" ({}):", name, feed.len()),
        None => println!("\n🏪 Open listings ({}):", feed.len()),
    }
    for invoice in &feed {
        print_invoice(invoice, decimals);
    }

    // 3. Loans due soon
    let due_soon = orchestrator.due_soon(account).await?;
    println!(
        "\n⏰ Due soon: {} borrowed, {} lent",
        due_soon.borrowed.len(),
        due_soon.lent.len()
    );
    for loan in due_soon.borrowed.iter().chain(due_soon.lent.iter()) {
        println!(
            "   #{} due {} to {:?}",
            loan.token_id,
            loan.due_date.format("%Y-%m-%d %H:%M UTC"),
            loan.lender
        );
    }

    // 4. Reputation and lifetime volume
    let stats = orchestrator.user_stats(account).await?;
    println!(
        "\n⭐ Reputation {} | borrowed {} | lent {}",
        stats.reputation, stats.total_borrowed, stats.total_lent
    );

    Ok(())
}
