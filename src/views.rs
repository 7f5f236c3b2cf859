//! # Views
//!
//! Assembly of indexer rows and pinned metadata into the screen-facing
//! shapes, plus the dashboard snapshot the orchestrator keeps current.
//!
//! Two distinct mutation phases touch the snapshot after a write: an
//! optimistic patch applied only once the transaction finalized, then a
//! wholesale replacement of each affected section when the scoped re-fetch
//! lands. Optimistic state never outlives the next replacement.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use log::warn;
use std::collections::HashMap;

use crate::pinning::MetadataStore;
use crate::subgraph::{AccountRef, InvoiceMintedRow, InvoiceRow, OfferRow};
use crate::types::conversions::{decimal_to_u256, string_to_address, unix_seconds_to_datetime};
use crate::types::{
    ActiveLoan, Invoice, InvoiceMetadata, InvoiceStatus, LoanOffer, OfferStatus, UserStats,
};

fn parse_account(account: Option<&AccountRef>) -> Option<Address> {
    account.and_then(|a| string_to_address(&a.id).ok())
}

/// A marketplace row becomes a full invoice. Rows without a resolvable
/// token id or borrower are dropped rather than rendered half-empty.
pub fn invoice_from_row(row: &InvoiceRow) -> Option<Invoice> {
    let token_id = row.resolved_token_id()?;
    let owner = parse_account(row.borrower.as_ref())?;
    Some(Invoice {
        token_id,
        owner,
        lender: parse_account(row.lender.as_ref()),
        amount: row.loan_amount.or(row.amount),
        interest: row.interest,
        due_date: row.due_date.and_then(unix_seconds_to_datetime),
        payer_name: row.payer_name.clone(),
        status: row
            .status
            .as_deref()
            .map(InvoiceStatus::from_ledger_status)
            .unwrap_or(InvoiceStatus::Listed),
        metadata_cid: None,
        created_at: row.created_at.and_then(unix_seconds_to_datetime),
    })
}

/// A mint event alone becomes a `Minted` invoice; listing fields stay
/// absent until metadata backfill or an actual listing supplies them.
pub fn invoice_from_minted(row: &InvoiceMintedRow) -> Option<Invoice> {
    let owner = string_to_address(&row.owner).ok()?;
    Some(Invoice {
        token_id: row.token_id,
        owner,
        lender: None,
        amount: None,
        interest: None,
        due_date: None,
        payer_name: None,
        status: InvoiceStatus::Minted,
        metadata_cid: Some(row.ipfs_cid.clone()),
        created_at: row.block_timestamp.and_then(unix_seconds_to_datetime),
    })
}

pub fn offer_from_row(row: &OfferRow) -> Option<LoanOffer> {
    let token_id = row.invoice_token_id()?;
    let invoice = row.invoice.as_ref();
    Some(LoanOffer {
        offer_id: row.id.clone(),
        token_id,
        lender: parse_account(row.lender.as_ref()),
        borrower: invoice.and_then(|inv| parse_account(inv.borrower.as_ref())),
        token: parse_account(row.token.as_ref()),
        amount: row.amount.unwrap_or_default(),
        interest: row.interest.unwrap_or_default(),
        status: row
            .status
            .as_deref()
            .map(OfferStatus::from_ledger_status)
            .unwrap_or(OfferStatus::Pending),
        created_at: row.created_at.and_then(unix_seconds_to_datetime),
        invoice_amount: invoice.and_then(|inv| inv.loan_amount),
        invoice_due_date: invoice
            .and_then(|inv| inv.due_date)
            .and_then(unix_seconds_to_datetime),
        invoice_status: invoice
            .and_then(|inv| inv.status.as_deref())
            .map(InvoiceStatus::from_ledger_status),
    })
}

/// An active-loan row needs a due date to mean anything; rows without one
/// are dropped.
pub fn loan_from_row(row: &InvoiceRow) -> Option<ActiveLoan> {
    let token_id = row.resolved_token_id()?;
    let due_date = row.due_date.and_then(unix_seconds_to_datetime)?;
    Some(ActiveLoan {
        token_id,
        borrower: parse_account(row.borrower.as_ref()),
        lender: parse_account(row.lender.as_ref()),
        amount: row.loan_amount.unwrap_or_default(),
        interest: row.interest.unwrap_or_default(),
        due_date,
        created_at: row.created_at.and_then(unix_seconds_to_datetime),
    })
}

/// Merges marketplace rows with mint events into one feed.
///
/// Marketplace rows win: a token present in both sources keeps its listing
/// data and only picks up the metadata CID from its mint event. Tokens the
/// marketplace never saw appear as `Minted` rows after all listed ones.
/// An excluded metadata CID is never attached, and a mint event carrying
/// one contributes no row of its own; the listing itself still shows.
pub fn merge_invoices(
    listed: &[InvoiceRow],
    minted: &[InvoiceMintedRow],
    excluded_cids: &[String],
) -> Vec<Invoice> {
    let excluded = |cid: &str| excluded_cids.iter().any(|x| x == cid);
    let cid_by_token: HashMap<U256, &str> = minted
        .iter()
        .map(|row| (row.token_id, row.ipfs_cid.as_str()))
        .collect();

    let mut merged: IndexMap<U256, Invoice> = IndexMap::new();
    for row in listed {
        let Some(mut invoice) = invoice_from_row(row) else {
            continue;
        };
        if let Some(cid) = cid_by_token.get(&invoice.token_id) {
            if !excluded(cid) {
                invoice.metadata_cid = Some((*cid).to_string());
            }
        }
        merged.insert(invoice.token_id, invoice);
    }
    for row in minted {
        if excluded(&row.ipfs_cid) || merged.contains_key(&row.token_id) {
            continue;
        }
        if let Some(invoice) = invoice_from_minted(row) {
            merged.insert(invoice.token_id, invoice);
        }
    }
    merged.into_values().collect()
}

/// Fetches pinned metadata for invoices that still miss display fields and
/// fills exactly those. Fetch failures leave the fields absent; they never
/// fail the whole feed.
pub async fn backfill_metadata(
    invoices: &mut [Invoice],
    store: &dyn MetadataStore,
    token_decimals: u32,
    concurrency: usize,
) {
    let targets: Vec<(usize, String)> = invoices
        .iter()
        .enumerate()
        .filter_map(|(index, invoice)| {
            let incomplete = invoice.amount.is_none()
                || invoice.due_date.is_none()
                || invoice.payer_name.is_none();
            match (&invoice.metadata_cid, incomplete) {
                (Some(cid), true) => Some((index, cid.clone())),
                _ => None,
            }
        })
        .collect();
    if targets.is_empty() {
        return;
    }

    let fetched: Vec<(usize, Option<InvoiceMetadata>)> = stream::iter(targets)
        .map(|(index, cid)| async move {
            match store.fetch_json(&cid).await {
                Ok(document) => match serde_json::from_value::<InvoiceMetadata>(document) {
                    Ok(metadata) => (index, Some(metadata)),
                    Err(e) => {
                        warn!(
                            "⚠️ [Views] metadata {} does not match the invoice shape: {}",
                            cid, e
                        );
                        (index, None)
                    }
                },
                Err(e) => {
                    warn!("⚠️ [Views] metadata fetch for {} failed: {}", cid, e);
                    (index, None)
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (index, metadata) in fetched {
        let Some(metadata) = metadata else { continue };
        let invoice = &mut invoices[index];
        if invoice.amount.is_none() {
            invoice.amount = metadata
                .parsed_amount()
                .and_then(|amount| decimal_to_u256(amount, token_decimals).ok());
        }
        if invoice.due_date.is_none() {
            invoice.due_date = metadata.due_date_utc();
        }
        if invoice.payer_name.is_none() {
            let payer = metadata.attributes.payer_name.trim();
            if !payer.is_empty() {
                invoice.payer_name = Some(payer.to_string());
            }
        }
    }
}

/// Local patch applied to the board after a finalized write, bridging the
/// indexer's ingestion lag. Every variant is display-grade: the scoped
/// re-fetch that follows replaces the affected sections wholesale.
#[derive(Debug, Clone)]
pub enum OptimisticUpdate {
    InvoiceListed {
        token_id: U256,
        owner: Address,
        amount: Option<U256>,
        due_date: Option<DateTime<Utc>>,
        payer_name: Option<String>,
    },
    OfferAccepted {
        token_id: U256,
        borrower: Option<Address>,
        lender: Address,
        amount: Option<U256>,
        interest: Option<U256>,
    },
    LoanRepaid {
        token_id: U256,
    },
    OfferCancelled {
        token_id: U256,
    },
    LoanDefaulted {
        token_id: U256,
    },
}

/// Everything one account's dashboard shows, owned by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct InvoiceBoard {
    pub invoices: Vec<Invoice>,
    pub offers_received: Vec<LoanOffer>,
    pub offers_sent: Vec<LoanOffer>,
    pub loans_borrowed: Vec<ActiveLoan>,
    pub loans_lent: Vec<ActiveLoan>,
    pub stats: UserStats,
}

impl InvoiceBoard {
    fn invoice_mut(&mut self, token_id: U256) -> Option<&mut Invoice> {
        self.invoices.iter_mut().find(|inv| inv.token_id == token_id)
    }

    pub fn apply(&mut self, update: OptimisticUpdate) {
        match update {
            OptimisticUpdate::InvoiceListed {
                token_id,
                owner,
                amount,
                due_date,
                payer_name,
            } => {
                if let Some(invoice) = self.invoice_mut(token_id) {
                    invoice.status = InvoiceStatus::Listed;
                    if amount.is_some() {
                        invoice.amount = amount;
                    }
                    if due_date.is_some() {
                        invoice.due_date = due_date;
                    }
                    if payer_name.is_some() {
                        invoice.payer_name = payer_name;
                    }
                } else {
                    self.invoices.push(Invoice {
                        token_id,
                        owner,
                        lender: None,
                        amount,
                        interest: None,
                        due_date,
                        payer_name,
                        status: InvoiceStatus::Listed,
                        metadata_cid: None,
                        created_at: None,
                    });
                }
            }
            OptimisticUpdate::OfferAccepted {
                token_id,
                borrower,
                lender,
                amount,
                interest,
            } => {
                let mut due_date = None;
                if let Some(invoice) = self.invoice_mut(token_id) {
                    invoice.status = InvoiceStatus::Funded;
                    invoice.lender = Some(lender);
                    due_date = invoice.due_date;
                }
                // Accepting one offer voids every sibling on the ledger
                self.offers_received
                    .retain(|offer| offer.token_id != token_id);
                if let Some(due_date) = due_date {
                    self.loans_borrowed.push(ActiveLoan {
                        token_id,
                        borrower,
                        lender: Some(lender),
                        amount: amount.unwrap_or_default(),
                        interest: interest.unwrap_or_default(),
                        due_date,
                        created_at: None,
                    });
                }
            }
            OptimisticUpdate::LoanRepaid { token_id } => {
                self.loans_borrowed.retain(|loan| loan.token_id != token_id);
                if let Some(invoice) = self.invoice_mut(token_id) {
                    invoice.status = InvoiceStatus::Repaid;
                    invoice.lender = None;
                }
            }
            OptimisticUpdate::OfferCancelled { token_id } => {
                self.offers_sent.retain(|offer| offer.token_id != token_id);
            }
            OptimisticUpdate::LoanDefaulted { token_id } => {
                self.loans_lent.retain(|loan| loan.token_id != token_id);
                if let Some(invoice) = self.invoice_mut(token_id) {
                    invoice.status = InvoiceStatus::Defaulted;
                }
            }
        }
    }

    pub fn replace_invoices(&mut self, invoices: Vec<Invoice>) {
        self.invoices = invoices;
    }

    pub fn replace_offers_received(&mut self, offers: Vec<LoanOffer>) {
        self.offers_received = offers;
    }

    pub fn replace_offers_sent(&mut self, offers: Vec<LoanOffer>) {
        self.offers_sent = offers;
    }

    pub fn replace_loans_borrowed(&mut self, loans: Vec<ActiveLoan>) {
        self.loans_borrowed = loans;
    }

    pub fn replace_loans_lent(&mut self, loans: Vec<ActiveLoan>) {
        self.loans_lent = loans;
    }

    pub fn replace_stats(&mut self, stats: UserStats) {
        self.stats = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinning::PinError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    const BORROWER: &str = "0x3333333333333333333333333333333333333333";
    const LENDER: &str = "0x4444444444444444444444444444444444444444";

    fn listed_row(token_id: u64) -> InvoiceRow {
        serde_json::from_value(json!({
            "id": token_id.to_string(),
            "tokenId": token_id.to_string(),
            "borrower": { "id": BORROWER },
            "loanAmount": "2500000000",
            "payerName": "Acme Corp",
            "interest": "125000000",
            "dueDate": "1767225600",
            "status": "LISTED",
            "createdAt": "1764633600"
        }))
        .unwrap()
    }

    fn minted_row(token_id: u64, cid: &str) -> InvoiceMintedRow {
        serde_json::from_value(json!({
            "tokenId": token_id.to_string(),
            "owner": BORROWER,
            "ipfsCID": cid,
            "blockTimestamp": "1764547200"
        }))
        .unwrap()
    }

    fn board_with_listing(token_id: u64) -> InvoiceBoard {
        let mut board = InvoiceBoard::default();
        board.replace_invoices(merge_invoices(
            &[listed_row(token_id)],
            &[minted_row(token_id, "QmListed")],
            &[],
        ));
        board
    }

    fn addr(raw: &str) -> Address {
        string_to_address(raw).unwrap()
    }

    #[test]
    fn merge_prefers_marketplace_rows_and_appends_minted_only() {
        let merged = merge_invoices(
            &[listed_row(1)],
            &[minted_row(1, "QmOne"), minted_row(2, "QmTwo")],
            &[],
        );
        assert_eq!(merged.len(), 2);
        // Listed row keeps its listing data and picks up the CID
        assert_eq!(merged[0].token_id, U256::from(1u64));
        assert_eq!(merged[0].status, InvoiceStatus::Listed);
        assert_eq!(merged[0].amount, Some(U256::from(2_500_000_000u64)));
        assert_eq!(merged[0].metadata_cid.as_deref(), Some("QmOne"));
        // Never-listed token appears after, as Minted, fields absent
        assert_eq!(merged[1].token_id, U256::from(2u64));
        assert_eq!(merged[1].status, InvoiceStatus::Minted);
        assert!(merged[1].amount.is_none());
    }

    #[test]
    fn merge_drops_excluded_cids_from_the_minted_side_only() {
        let excluded = vec!["QmJunk".to_string()];
        let merged = merge_invoices(
            &[listed_row(1)],
            &[minted_row(1, "QmJunk"), minted_row(2, "QmJunk")],
            &excluded,
        );
        // The listing keeps rendering without the excluded pointer; the
        // never-listed mint disappears.
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].token_id, U256::from(1u64));
        assert_eq!(merged[0].status, InvoiceStatus::Listed);
        assert!(merged[0].metadata_cid.is_none());
    }

    #[test]
    fn merge_keeps_listed_rows_without_a_mint_event() {
        let merged = merge_invoices(&[listed_row(9)], &[], &[]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].metadata_cid.is_none());
    }

    #[test]
    fn loan_rows_without_due_dates_are_dropped() {
        let row: InvoiceRow =
            serde_json::from_value(json!({ "id": "4", "loanAmount": "100" })).unwrap();
        assert!(loan_from_row(&row).is_none());
    }

    #[test]
    fn offer_rows_resolve_through_their_invoice() {
        let row: OfferRow = serde_json::from_value(json!({
            "id": "3-0x4444444444444444444444444444444444444444",
            "invoice": {
                "id": "3",
                "loanAmount": "2500000000",
                "dueDate": "1767225600",
                "status": "LISTED",
                "borrower": { "id": BORROWER }
            },
            "lender": { "id": LENDER },
            "amount": "2400000000",
            "interest": "120000000",
            "status": "PENDING"
        }))
        .unwrap();
        let offer = offer_from_row(&row).unwrap();
        assert_eq!(offer.token_id, U256::from(3u64));
        assert_eq!(offer.lender, Some(addr(LENDER)));
        assert_eq!(offer.borrower, Some(addr(BORROWER)));
        assert_eq!(offer.status, OfferStatus::Pending);
        assert_eq!(offer.invoice_status, Some(InvoiceStatus::Listed));
    }

    #[test]
    fn accepting_an_offer_funds_the_invoice_and_clears_siblings() {
        let mut board = board_with_listing(3);
        let sibling = |id: &str| LoanOffer {
            offer_id: id.to_string(),
            token_id: U256::from(3u64),
            lender: Some(addr(LENDER)),
            borrower: None,
            token: None,
            amount: U256::from(100u64),
            interest: U256::from(5u64),
            status: OfferStatus::Pending,
            created_at: None,
            invoice_amount: None,
            invoice_due_date: None,
            invoice_status: None,
        };
        board.replace_offers_received(vec![sibling("a"), sibling("b")]);

        board.apply(OptimisticUpdate::OfferAccepted {
            token_id: U256::from(3u64),
            borrower: Some(addr(BORROWER)),
            lender: addr(LENDER),
            amount: Some(U256::from(2_400_000_000u64)),
            interest: Some(U256::from(120_000_000u64)),
        });

        assert!(board.offers_received.is_empty());
        assert_eq!(board.invoices[0].status, InvoiceStatus::Funded);
        assert_eq!(board.invoices[0].lender, Some(addr(LENDER)));
        assert_eq!(board.loans_borrowed.len(), 1);
        assert_eq!(board.loans_borrowed[0].amount, U256::from(2_400_000_000u64));
        // Loan due date comes from the invoice row that was on the board
        assert_eq!(
            board.loans_borrowed[0].due_date,
            board.invoices[0].due_date.unwrap()
        );
    }

    #[test]
    fn repaying_removes_the_loan_and_marks_the_invoice() {
        let mut board = board_with_listing(3);
        board.apply(OptimisticUpdate::OfferAccepted {
            token_id: U256::from(3u64),
            borrower: Some(addr(BORROWER)),
            lender: addr(LENDER),
            amount: Some(U256::from(100u64)),
            interest: None,
        });
        board.apply(OptimisticUpdate::LoanRepaid {
            token_id: U256::from(3u64),
        });

        assert!(board.loans_borrowed.is_empty());
        assert_eq!(board.invoices[0].status, InvoiceStatus::Repaid);
        assert!(board.invoices[0].lender.is_none());
    }

    fn sent_offer(token_id: u64) -> LoanOffer {
        LoanOffer {
            offer_id: format!("{}-{}", token_id, LENDER),
            token_id: U256::from(token_id),
            lender: Some(addr(LENDER)),
            borrower: None,
            token: None,
            amount: U256::from(10u64),
            interest: U256::one(),
            status: OfferStatus::Pending,
            created_at: None,
            invoice_amount: None,
            invoice_due_date: None,
            invoice_status: None,
        }
    }

    #[test]
    fn cancelling_removes_only_that_invoices_offer() {
        let mut board = InvoiceBoard::default();
        board.replace_offers_sent(vec![sent_offer(1), sent_offer(2)]);

        board.apply(OptimisticUpdate::OfferCancelled {
            token_id: U256::from(1u64),
        });

        assert_eq!(board.offers_sent.len(), 1);
        assert_eq!(board.offers_sent[0].token_id, U256::from(2u64));
    }

    #[test]
    fn listing_patches_an_existing_row_or_pushes_a_new_one() {
        let mut board = InvoiceBoard::default();
        board.apply(OptimisticUpdate::InvoiceListed {
            token_id: U256::from(7u64),
            owner: addr(BORROWER),
            amount: Some(U256::from(500u64)),
            due_date: None,
            payer_name: Some("Initech".to_string()),
        });
        assert_eq!(board.invoices.len(), 1);
        assert_eq!(board.invoices[0].status, InvoiceStatus::Listed);

        // Patching again fills only what the update carries
        board.invoices[0].due_date = unix_seconds_to_datetime(1_767_225_600);
        board.apply(OptimisticUpdate::InvoiceListed {
            token_id: U256::from(7u64),
            owner: addr(BORROWER),
            amount: None,
            due_date: None,
            payer_name: None,
        });
        assert_eq!(board.invoices.len(), 1);
        assert_eq!(board.invoices[0].amount, Some(U256::from(500u64)));
        assert!(board.invoices[0].due_date.is_some());
    }

    #[test]
    fn defaulting_clears_the_lent_loan() {
        let mut board = board_with_listing(3);
        board.loans_lent.push(ActiveLoan {
            token_id: U256::from(3u64),
            borrower: Some(addr(BORROWER)),
            lender: Some(addr(LENDER)),
            amount: U256::from(100u64),
            interest: U256::one(),
            due_date: unix_seconds_to_datetime(1_767_225_600).unwrap(),
            created_at: None,
        });

        board.apply(OptimisticUpdate::LoanDefaulted {
            token_id: U256::from(3u64),
        });

        assert!(board.loans_lent.is_empty());
        assert_eq!(board.invoices[0].status, InvoiceStatus::Defaulted);
    }

    #[test]
    fn replacement_is_wholesale_and_discards_optimistic_state() {
        let mut board = InvoiceBoard::default();
        board.apply(OptimisticUpdate::InvoiceListed {
            token_id: U256::from(1u64),
            owner: addr(BORROWER),
            amount: Some(U256::from(10u64)),
            due_date: None,
            payer_name: None,
        });
        assert_eq!(board.invoices.len(), 1);

        // The re-fetch view knows nothing about the guess; it wins
        board.replace_invoices(Vec::new());
        assert!(board.invoices.is_empty());
    }

    struct CannedStore {
        documents: Mutex<std::collections::HashMap<String, Value>>,
        fetches: AtomicUsize,
    }

    impl CannedStore {
        fn new(documents: Vec<(&str, Value)>) -> Self {
            Self {
                documents: Mutex::new(
                    documents
                        .into_iter()
                        .map(|(cid, doc)| (cid.to_string(), doc))
                        .collect(),
                ),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetadataStore for CannedStore {
        async fn upload_json(&self, _document: &Value) -> Result<String, PinError> {
            Ok("QmUploaded".to_string())
        }

        async fn upload_file(
            &self,
            _bytes: Vec<u8>,
            _filename: &str,
            _content_type: &str,
        ) -> Result<String, PinError> {
            Ok("QmFile".to_string())
        }

        async fn fetch_json(&self, cid: &str) -> Result<Value, PinError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.documents
                .lock()
                .await
                .get(cid)
                .cloned()
                .ok_or(PinError::Upstream {
                    status: 404,
                    body: "not pinned".to_string(),
                })
        }

        async fn unpin(&self, _cid: &str) -> Result<(), PinError> {
            Ok(())
        }
    }

    fn metadata_doc() -> Value {
        json!({
            "name": "Invoice #1",
            "description": "Freight services",
            "attributes": {
                "amount": "2500.50",
                "dueDate": "2026-11-30",
                "payerName": "Acme Corp"
            }
        })
    }

    #[tokio::test]
    async fn backfill_fills_only_absent_fields() {
        let store = CannedStore::new(vec![("QmMint", metadata_doc())]);
        let mut invoices = merge_invoices(&[], &[minted_row(2, "QmMint")], &[]);

        backfill_metadata(&mut invoices, &store, 6, 4).await;

        assert_eq!(invoices[0].amount, Some(U256::from(2_500_500_000u64)));
        assert_eq!(invoices[0].payer_name.as_deref(), Some("Acme Corp"));
        let due = invoices[0].due_date.unwrap();
        assert_eq!(due.format("%Y-%m-%d").to_string(), "2026-11-30");
    }

    #[tokio::test]
    async fn backfill_skips_rows_that_are_already_complete() {
        let store = CannedStore::new(vec![("QmListed", metadata_doc())]);
        let mut invoices = merge_invoices(
            &[listed_row(1)],
            &[minted_row(1, "QmListed")],
            &[],
        );
        assert!(invoices[0].payer_name.is_some());

        backfill_metadata(&mut invoices, &store, 6, 4).await;

        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backfill_failures_leave_fields_absent() {
        let store = CannedStore::new(Vec::new());
        let mut invoices = merge_invoices(&[], &[minted_row(5, "QmGone")], &[]);

        backfill_metadata(&mut invoices, &store, 6, 4).await;

        assert!(invoices[0].amount.is_none());
        assert!(invoices[0].due_date.is_none());
        assert_eq!(invoices[0].status, InvoiceStatus::Minted);
    }
}
