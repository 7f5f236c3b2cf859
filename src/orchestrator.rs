//! # Invoice Orchestrator
//!
//! The `InvoiceOrchestrator` drives every user flow of the lending
//! marketplace: minting invoice tokens, listing them for loans, sending and
//! accepting offers, repaying, cancelling and claiming. It composes the
//! three seams of the crate (contract services, indexed reads, the metadata
//! store) and owns the dashboard board.
//!
//! ## Consistency contract
//!
//! Chain state is authoritative; the indexer lags it. Every write flow runs
//! the same sequence:
//!
//! 1. Resolve the adapters. An unbound locator fails the flow before
//!    anything is sent.
//! 2. Perform the declared approval and wait for its finality, then perform
//!    the primary write the same way.
//! 3. On success only, apply a local optimistic patch to the board so the
//!    dashboard reflects the outcome before the indexer has ingested it.
//! 4. Re-fetch the flow's declared query scopes and replace those board
//!    sections wholesale. This runs on failure too, where it is the only
//!    rollback: the board converges on whatever the indexer now says.
//!
//! Reconcile failures degrade to stale sections and never override the
//! write's own result.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::pinning::MetadataStore;
use crate::services::{RegistryAdapter, ServiceError, ServiceSource};
use crate::settings::Settings;
use crate::subgraph::{InvoiceMintedRow, InvoiceRow, SubgraphError, SubgraphReader};
use crate::types::conversions::{decimal_to_u256, string_to_address};
use crate::types::{Invoice, InvoiceMetadata, LoanInfo, OfferEntry, UserStats};
use crate::views::{self, InvoiceBoard, OptimisticUpdate};

/// Dashboard highlight window for approaching due dates.
const DUE_SOON_WINDOW_DAYS: i64 = 3;
/// Concurrent gateway fetches during metadata backfill.
const METADATA_FETCH_CONCURRENCY: usize = 8;

/// Board sections a write invalidates. Reconciliation re-fetches exactly
/// these once the write settles, successfully or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    MintedInvoices,
    InvoicesByOwner,
    OffersSent,
    OffersReceived,
    LoansAsBorrower,
    LoansAsLender,
    Totals,
    Reputation,
}

/// Raw image attached to a mint, pinned before the metadata document.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct MintRequest {
    pub description: String,
    /// Human-denominated amount; scaled at the metadata boundary.
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub payer_name: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct MintSummary {
    pub tx_hash: H256,
    /// Recovered from the InvoiceMinted log; absent when the receipt
    /// carried no decodable event.
    pub token_id: Option<U256>,
    pub metadata_cid: String,
    pub image_cid: Option<String>,
}

/// Listing terms. Fields left absent are recovered from the token's pinned
/// metadata document before the marketplace call.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub token_id: U256,
    /// Smallest token units.
    pub amount: Option<U256>,
    pub due_date: Option<DateTime<Utc>>,
    pub payer_name: Option<String>,
}

/// Listing receipt plus opportunistic confirmation reads; a failed read
/// leaves its field empty without failing the flow.
#[derive(Debug, Clone)]
pub struct ListSummary {
    pub tx_hash: H256,
    pub owner: Option<Address>,
    pub loan: Option<LoanInfo>,
    pub risk_factor: Option<U256>,
}

#[derive(Debug, Clone, Copy)]
pub struct OfferRequest {
    pub token_id: U256,
    /// Settlement token the offer is denominated in.
    pub token: Address,
    pub amount: U256,
    pub interest: U256,
}

#[derive(Debug, Clone)]
pub struct OfferSummary {
    pub tx_hash: H256,
    pub lender_balance: Option<U256>,
    pub marketplace_balance: Option<U256>,
}

/// Loans inside the due-soon window, split by the user's role.
#[derive(Debug, Clone, Default)]
pub struct DueSoonLoans {
    pub borrowed: Vec<crate::types::ActiveLoan>,
    pub lent: Vec<crate::types::ActiveLoan>,
}

/// Everything known about one token across all three sources.
#[derive(Debug, Clone)]
pub struct InvoiceDetail {
    pub token_id: U256,
    pub minted: Option<InvoiceMintedRow>,
    pub metadata: Option<InvoiceMetadata>,
    /// Live loan, present only while active.
    pub loan: Option<LoanInfo>,
    pub offers: Vec<OfferEntry>,
    pub risk_factor: Option<U256>,
    pub listed: bool,
}

pub struct InvoiceOrchestrator {
    services: Arc<dyn ServiceSource>,
    subgraph: Arc<dyn SubgraphReader>,
    store: Arc<dyn MetadataStore>,
    board: RwLock<InvoiceBoard>,
    settings: Arc<Settings>,
}

impl InvoiceOrchestrator {
    pub fn new(
        services: Arc<dyn ServiceSource>,
        subgraph: Arc<dyn SubgraphReader>,
        store: Arc<dyn MetadataStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            services,
            subgraph,
            store,
            board: RwLock::new(InvoiceBoard::default()),
            settings,
        }
    }

    /// Snapshot of the current board.
    pub async fn board(&self) -> InvoiceBoard {
        self.board.read().await.clone()
    }

    fn marketplace_address(&self) -> Result<Address> {
        string_to_address(&self.settings.contracts.marketplace)
            .map_err(|e| anyhow!("invalid marketplace address in settings: {e}"))
    }

    // ---- write flows ----

    /// Mints a new invoice token: optional image pin, metadata document pin,
    /// then the registry write. The board learns about the mint from the
    /// reconcile; there is no optimistic patch for it.
    pub async fn mint_invoice(&self, owner: Address, request: MintRequest) -> Result<MintSummary> {
        let registry = self.services.registry()?;

        let image_cid = match request.image {
            Some(image) => Some(
                self.store
                    .upload_file(image.bytes, &image.filename, &image.content_type)
                    .await
                    .context("image upload failed")?,
            ),
            None => None,
        };
        let image_url = image_cid.as_ref().map(|cid| {
            format!(
                "{}/ipfs/{}",
                self.settings.pinning.gateway.trim_end_matches('/'),
                cid
            )
        });

        let metadata = InvoiceMetadata::new(
            &request.description,
            request.amount,
            request.due_date,
            &request.payer_name,
            image_url,
        );
        let document =
            serde_json::to_value(&metadata).context("metadata serialization failed")?;
        let metadata_cid = self
            .store
            .upload_json(&document)
            .await
            .context("metadata upload failed")?;
        info!("✅ [Orchestrator] invoice metadata pinned at {}", metadata_cid);

        let outcome = registry.mint(&metadata_cid).await;
        let minted = self
            .settle(owner, &[QueryScope::MintedInvoices], None, outcome)
            .await?;
        if minted.token_id.is_none() {
            warn!("⚠️ [Orchestrator] mint receipt carried no InvoiceMinted log, token id unresolved");
        }

        Ok(MintSummary {
            tx_hash: minted.tx_hash,
            token_id: minted.token_id,
            metadata_cid,
            image_cid,
        })
    }

    /// Lists a minted invoice for lending. Terms missing from the request
    /// are recovered from the pinned metadata. The NFT approval for the
    /// marketplace is final before the listing call goes out.
    pub async fn list_for_loan(&self, owner: Address, request: ListRequest) -> Result<ListSummary> {
        let registry = self.services.registry()?;
        let marketplace = self.services.marketplace()?;
        let market_addr = self.marketplace_address()?;

        let (amount, due_date, payer_name) =
            self.resolve_listing_terms(&registry, &request).await?;
        let due_secs = u64::try_from(due_date.timestamp())
            .map(U256::from)
            .context("due date precedes the unix epoch")?;

        registry
            .approve(market_addr, request.token_id)
            .await
            .context("marketplace approval failed")?;
        debug!("✅ [Orchestrator] marketplace approved for token {}", request.token_id);

        let outcome = marketplace
            .list_invoice(request.token_id, due_secs, amount, &payer_name)
            .await;
        let optimistic = OptimisticUpdate::InvoiceListed {
            token_id: request.token_id,
            owner,
            amount: Some(amount),
            due_date: Some(due_date),
            payer_name: Some(payer_name),
        };
        let receipt = self
            .settle(
                owner,
                &[QueryScope::InvoicesByOwner, QueryScope::MintedInvoices],
                Some(optimistic),
                outcome,
            )
            .await?;

        Ok(ListSummary {
            tx_hash: receipt.transaction_hash,
            owner: registry.owner_of(request.token_id).await.ok(),
            loan: marketplace.loan(request.token_id).await.ok(),
            risk_factor: marketplace.risk_factor(request.token_id).await.ok(),
        })
    }

    /// Sends a loan offer. The settlement-token allowance for the
    /// marketplace is final before the offer call goes out. Sent offers
    /// carry indexer-assigned ids, so there is no optimistic patch; the
    /// reconcile brings the new row in.
    pub async fn offer_loan(&self, lender: Address, request: OfferRequest) -> Result<OfferSummary> {
        let marketplace = self.services.marketplace()?;
        let token = self.services.token(request.token)?;
        let market_addr = self.marketplace_address()?;

        token
            .approve(market_addr, request.amount)
            .await
            .context("settlement token approval failed")?;
        debug!(
            "✅ [Orchestrator] marketplace allowance set for {} units of {:?}",
            request.amount, request.token
        );

        let outcome = marketplace
            .offer_loan(request.token_id, request.token, request.amount, request.interest)
            .await;
        let receipt = self
            .settle(lender, &[QueryScope::OffersSent], None, outcome)
            .await?;

        Ok(OfferSummary {
            tx_hash: receipt.transaction_hash,
            lender_balance: token.balance_of(lender).await.ok(),
            marketplace_balance: token.balance_of(market_addr).await.ok(),
        })
    }

    /// Accepts a lender's offer on the caller's invoice. The pending
    /// offer's terms are read first so the optimistic patch can carry them;
    /// that read failing only weakens the patch, never the write.
    pub async fn accept_offer(
        &self,
        borrower: Address,
        token_id: U256,
        lender: Address,
    ) -> Result<H256> {
        let marketplace = self.services.marketplace()?;

        let pending = marketplace.pending_offer(token_id, lender).await.ok();
        let outcome = marketplace.accept_offer(token_id, lender).await;
        let optimistic = OptimisticUpdate::OfferAccepted {
            token_id,
            borrower: Some(borrower),
            lender,
            amount: pending.map(|offer| offer.amount),
            interest: pending.map(|offer| offer.interest),
        };
        let receipt = self
            .settle(
                borrower,
                &[
                    QueryScope::InvoicesByOwner,
                    QueryScope::LoansAsBorrower,
                    QueryScope::LoansAsLender,
                    QueryScope::OffersReceived,
                    QueryScope::Totals,
                ],
                Some(optimistic),
                outcome,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// Repays the caller's active loan in full. The marketplace contract
    /// moves principal plus interest itself; there is no client-side
    /// approval step in this flow.
    pub async fn repay_loan(&self, borrower: Address, token_id: U256) -> Result<H256> {
        let marketplace = self.services.marketplace()?;
        let outcome = marketplace.repay_loan(token_id).await;
        let receipt = self
            .settle(
                borrower,
                &[
                    QueryScope::InvoicesByOwner,
                    QueryScope::LoansAsBorrower,
                    QueryScope::LoansAsLender,
                    QueryScope::Totals,
                    QueryScope::Reputation,
                ],
                Some(OptimisticUpdate::LoanRepaid { token_id }),
                outcome,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// Withdraws the caller's pending offer on an invoice.
    pub async fn cancel_offer(&self, lender: Address, token_id: U256) -> Result<H256> {
        let marketplace = self.services.marketplace()?;
        let outcome = marketplace.cancel_offer(token_id).await;
        let receipt = self
            .settle(
                lender,
                &[QueryScope::OffersSent],
                Some(OptimisticUpdate::OfferCancelled { token_id }),
                outcome,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// Claims the collateral invoice of an overdue loan. The contract
    /// enforces the due date; a premature claim reverts and the reconcile
    /// restores the board.
    pub async fn claim_overdue(&self, lender: Address, token_id: U256) -> Result<H256> {
        let marketplace = self.services.marketplace()?;
        let outcome = marketplace.claim_overdue(token_id).await;
        let receipt = self
            .settle(
                lender,
                &[
                    QueryScope::LoansAsLender,
                    QueryScope::InvoicesByOwner,
                    QueryScope::MintedInvoices,
                ],
                Some(OptimisticUpdate::LoanDefaulted { token_id }),
                outcome,
            )
            .await?;
        Ok(receipt.transaction_hash)
    }

    /// Admin write registering a settlement token with the marketplace,
    /// confirmed by reading the support flag back and bound into the
    /// service set so offers can use it immediately.
    pub async fn add_supported_token(&self, token: Address) -> Result<bool> {
        let marketplace = self.services.marketplace()?;
        marketplace
            .add_supported_token(token)
            .await
            .context("addSupportedToken failed")?;

        let supported = marketplace.is_supported_token(token).await.unwrap_or(false);
        if !supported {
            warn!(
                "⚠️ [Orchestrator] token {:?} still reads unsupported after the write",
                token
            );
        }
        if !self.services.register_token(token).await {
            warn!(
                "⚠️ [Orchestrator] token {:?} not bound as a service, offers in it need a rebind",
                token
            );
        }
        Ok(supported)
    }

    // ---- read flows ----

    /// Rebuilds the caller's whole dashboard from the indexer and returns
    /// the fresh board.
    pub async fn refresh_dashboard(&self, owner: Address) -> Result<InvoiceBoard> {
        let invoices = self.fetch_owned_invoices(owner).await?;
        let sent_rows = self.subgraph.offers_sent(owner).await?;
        let received = self.fetch_offers_received(owner).await?;
        let borrowed_rows = self.subgraph.active_loans_as_borrower(owner).await?;
        let lent_rows = self.subgraph.active_loans_as_lender(owner).await?;
        let stats = self.user_stats(owner).await?;

        let mut board = self.board.write().await;
        board.replace_invoices(invoices);
        board.replace_offers_sent(sent_rows.iter().filter_map(views::offer_from_row).collect());
        board.replace_offers_received(received);
        board.replace_loans_borrowed(
            borrowed_rows.iter().filter_map(views::loan_from_row).collect(),
        );
        board.replace_loans_lent(lent_rows.iter().filter_map(views::loan_from_row).collect());
        board.replace_stats(stats);
        info!(
            "✅ [Orchestrator] dashboard refreshed: {} invoices, {} offers in, {} offers out, {} loans",
            board.invoices.len(),
            board.offers_received.len(),
            board.offers_sent.len(),
            board.loans_borrowed.len() + board.loans_lent.len()
        );
        Ok(board.clone())
    }

    /// The public marketplace feed: every listed invoice, optionally
    /// narrowed by a case-insensitive payer-name search (the indexer's
    /// two-step token-id lookup).
    pub async fn marketplace_feed(&self, payer: Option<&str>) -> Result<Vec<Invoice>> {
        let listed = self.subgraph.listed_invoices().await?;
        let (listed, token_ids) = match payer.map(str::trim).filter(|p| !p.is_empty()) {
            Some(payer) => {
                let ids = self.subgraph.listed_token_ids(Some(payer)).await?;
                let keep: HashSet<U256> = ids.iter().copied().collect();
                let filtered: Vec<InvoiceRow> = listed
                    .into_iter()
                    .filter(|row| {
                        row.resolved_token_id()
                            .map(|id| keep.contains(&id))
                            .unwrap_or(false)
                    })
                    .collect();
                (filtered, ids)
            }
            None => {
                let ids = listed
                    .iter()
                    .filter_map(InvoiceRow::resolved_token_id)
                    .collect();
                (listed, ids)
            }
        };

        let minted = self.subgraph.minted_by_token_ids(token_ids).await?;
        let mut feed =
            views::merge_invoices(&listed, &minted, &self.settings.pinning.excluded_cids);
        views::backfill_metadata(
            &mut feed,
            self.store.as_ref(),
            self.settings.contracts.token_decimals,
            METADATA_FETCH_CONCURRENCY,
        )
        .await;
        Ok(feed)
    }

    /// Loans due within the next three days, split by the caller's role.
    pub async fn due_soon(&self, user: Address) -> Result<DueSoonLoans> {
        let now = Utc::now();
        let until = now + Duration::days(DUE_SOON_WINDOW_DAYS);
        let (borrower_rows, lender_rows) = self
            .subgraph
            .due_soon_loans(user, now.timestamp(), until.timestamp())
            .await?;
        Ok(DueSoonLoans {
            borrowed: borrower_rows.iter().filter_map(views::loan_from_row).collect(),
            lent: lender_rows.iter().filter_map(views::loan_from_row).collect(),
        })
    }

    /// Reputation score plus lifetime borrow and lend volume.
    pub async fn user_stats(&self, user: Address) -> Result<UserStats> {
        let reputation = self.subgraph.user_reputation(user).await?;
        let (total_borrowed, total_lent) = self.subgraph.user_totals(user).await?;
        Ok(UserStats {
            reputation,
            total_borrowed,
            total_lent,
        })
    }

    /// Everything known about one token: the mint event, the pinned
    /// document, and the marketplace's live loan state.
    pub async fn invoice_detail(&self, token_id: U256) -> Result<InvoiceDetail> {
        let marketplace = self.services.marketplace()?;

        let minted = self.subgraph.minted_by_token_id(token_id).await?;
        let metadata = match minted.as_ref().map(|row| row.ipfs_cid.clone()) {
            Some(cid) => match self.store.fetch_json(&cid).await {
                Ok(document) => serde_json::from_value(document).ok(),
                Err(e) => {
                    warn!("⚠️ [Orchestrator] metadata {} unavailable: {}", cid, e);
                    None
                }
            },
            None => None,
        };

        let listed = marketplace.is_listed(token_id).await.unwrap_or(false);
        let loan = marketplace
            .loan(token_id)
            .await
            .ok()
            .filter(|loan| loan.is_active);
        let offers = marketplace.offers(token_id).await.unwrap_or_default();
        let risk_factor = marketplace.risk_factor(token_id).await.ok();

        Ok(InvoiceDetail {
            token_id,
            minted,
            metadata,
            loan,
            offers,
            risk_factor,
            listed,
        })
    }

    // ---- shared internals ----

    /// Shared tail of every write flow: apply the optimistic patch only on
    /// success, then reconcile the declared scopes unconditionally. For a
    /// failed write the re-fetch is the rollback.
    async fn settle<T>(
        &self,
        owner: Address,
        scopes: &[QueryScope],
        optimistic: Option<OptimisticUpdate>,
        outcome: Result<T, ServiceError>,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                if let Some(update) = optimistic {
                    self.board.write().await.apply(update);
                }
                self.reconcile(owner, scopes).await;
                Ok(value)
            }
            Err(e) => {
                warn!("⚠️ [Orchestrator] write failed, reconciling board to ledger truth: {}", e);
                self.reconcile(owner, scopes).await;
                Err(e.into())
            }
        }
    }

    /// Re-fetches the given scopes and replaces the matching board
    /// sections. A failed scope stays stale and is logged; it never
    /// surfaces to the write that triggered the reconcile.
    async fn reconcile(&self, owner: Address, scopes: &[QueryScope]) {
        let has = |scope: QueryScope| scopes.contains(&scope);

        if has(QueryScope::MintedInvoices) || has(QueryScope::InvoicesByOwner) {
            match self.fetch_owned_invoices(owner).await {
                Ok(invoices) => self.board.write().await.replace_invoices(invoices),
                Err(e) => warn!("⚠️ [Orchestrator] invoice reconcile failed, section stale: {}", e),
            }
        }
        if has(QueryScope::OffersSent) {
            match self.subgraph.offers_sent(owner).await {
                Ok(rows) => self
                    .board
                    .write()
                    .await
                    .replace_offers_sent(rows.iter().filter_map(views::offer_from_row).collect()),
                Err(e) => warn!("⚠️ [Orchestrator] sent-offer reconcile failed, section stale: {}", e),
            }
        }
        if has(QueryScope::OffersReceived) {
            match self.fetch_offers_received(owner).await {
                Ok(offers) => self.board.write().await.replace_offers_received(offers),
                Err(e) => warn!(
                    "⚠️ [Orchestrator] received-offer reconcile failed, section stale: {}",
                    e
                ),
            }
        }
        if has(QueryScope::LoansAsBorrower) {
            match self.subgraph.active_loans_as_borrower(owner).await {
                Ok(rows) => self
                    .board
                    .write()
                    .await
                    .replace_loans_borrowed(rows.iter().filter_map(views::loan_from_row).collect()),
                Err(e) => warn!(
                    "⚠️ [Orchestrator] borrowed-loan reconcile failed, section stale: {}",
                    e
                ),
            }
        }
        if has(QueryScope::LoansAsLender) {
            match self.subgraph.active_loans_as_lender(owner).await {
                Ok(rows) => self
                    .board
                    .write()
                    .await
                    .replace_loans_lent(rows.iter().filter_map(views::loan_from_row).collect()),
                Err(e) => warn!("⚠️ [Orchestrator] lent-loan reconcile failed, section stale: {}", e),
            }
        }
        if has(QueryScope::Totals) || has(QueryScope::Reputation) {
            let mut stats = self.board.read().await.stats;
            if has(QueryScope::Totals) {
                match self.subgraph.user_totals(owner).await {
                    Ok((borrowed, lent)) => {
                        stats.total_borrowed = borrowed;
                        stats.total_lent = lent;
                    }
                    Err(e) => warn!("⚠️ [Orchestrator] totals reconcile failed, section stale: {}", e),
                }
            }
            if has(QueryScope::Reputation) {
                match self.subgraph.user_reputation(owner).await {
                    Ok(reputation) => stats.reputation = reputation,
                    Err(e) => warn!(
                        "⚠️ [Orchestrator] reputation reconcile failed, section stale: {}",
                        e
                    ),
                }
            }
            self.board.write().await.replace_stats(stats);
        }
    }

    /// Owner's merged invoice view: marketplace rows joined with mint
    /// events, metadata backfilled for whatever is still missing.
    async fn fetch_owned_invoices(&self, owner: Address) -> Result<Vec<Invoice>, SubgraphError> {
        let minted = self.subgraph.minted_invoices(owner).await?;
        let listed = self.subgraph.invoices_by_owner(owner).await?;
        let mut invoices =
            views::merge_invoices(&listed, &minted, &self.settings.pinning.excluded_cids);
        views::backfill_metadata(
            &mut invoices,
            self.store.as_ref(),
            self.settings.contracts.token_decimals,
            METADATA_FETCH_CONCURRENCY,
        )
        .await;
        Ok(invoices)
    }

    /// Received offers resolve in two steps: the caller's invoice ids, then
    /// the offers targeting any of them.
    async fn fetch_offers_received(
        &self,
        owner: Address,
    ) -> Result<Vec<crate::types::LoanOffer>, SubgraphError> {
        let ids = self.subgraph.invoice_ids_by_borrower(owner).await?;
        let rows = self.subgraph.offers_received(ids).await?;
        Ok(rows.iter().filter_map(views::offer_from_row).collect())
    }

    async fn resolve_listing_terms(
        &self,
        registry: &Arc<dyn RegistryAdapter>,
        request: &ListRequest,
    ) -> Result<(U256, DateTime<Utc>, String)> {
        if let (Some(amount), Some(due_date), Some(payer)) =
            (request.amount, request.due_date, request.payer_name.clone())
        {
            return Ok((amount, due_date, payer));
        }

        let cid = registry
            .metadata_pointer(request.token_id)
            .await
            .context("token has no resolvable metadata pointer")?;
        let document = self
            .store
            .fetch_json(&cid)
            .await
            .with_context(|| format!("metadata {cid} unavailable"))?;
        let metadata: InvoiceMetadata = serde_json::from_value(document)
            .with_context(|| format!("metadata {cid} does not match the invoice shape"))?;

        let amount = match request.amount {
            Some(amount) => amount,
            None => {
                let parsed = metadata
                    .parsed_amount()
                    .ok_or_else(|| anyhow!("metadata {cid} carries no parsable amount"))?;
                decimal_to_u256(parsed, self.settings.contracts.token_decimals)
                    .context("metadata amount does not scale to token units")?
            }
        };
        let due_date = match request.due_date {
            Some(due) => due,
            None => metadata
                .due_date_utc()
                .ok_or_else(|| anyhow!("metadata {cid} carries no parsable due date"))?,
        };
        let payer = request
            .payer_name
            .clone()
            .unwrap_or_else(|| metadata.attributes.payer_name.clone());
        Ok((amount, due_date, payer))
    }
}
