//! # Subgraph Client
//!
//! Read-only access to the marketplace's indexed history through The Graph.
//! Every screen-level read is one GraphQL document; the client adds rate
//! limiting, bounded retries and a last-snapshot cache per operation.
//!
//! ## Consistency
//!
//! The indexer lags the chain by its ingestion delay. Reads served from
//! here are display-grade only; anything that gates a write goes through
//! the contract services instead. The snapshot cache exists so a flaky
//! endpoint degrades to stale data on screens, never so stale data feeds
//! back into write decisions.

use dashmap::DashMap;
use ethers::types::{Address, U256};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::settings::Subgraph;
use crate::types::conversions::address_to_string;

pub mod queries;
pub mod types;

pub use types::{
    AccountRef, BorrowerRow, GraphQlError, GraphQlResponse, IdRow, InvoiceMintedRow, InvoiceRow,
    LenderRow, LoanAmountRef, OfferInvoiceRef, OfferRow, TokenIdRow,
};

use async_trait::async_trait;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SubgraphError {
    #[error("subgraph transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("subgraph query failed: {0}")]
    Query(String),
    #[error("subgraph response carried no data")]
    MissingData,
    #[error("subgraph row decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("subgraph configuration invalid: {0}")]
    Config(String),
}

/// Indexed read seam the orchestrator works against. Production uses
/// [`SubgraphClient`]; tests substitute canned rows.
#[async_trait]
pub trait SubgraphReader: Send + Sync {
    async fn minted_invoices(&self, owner: Address) -> Result<Vec<InvoiceMintedRow>, SubgraphError>;
    async fn invoices_by_owner(&self, owner: Address) -> Result<Vec<InvoiceRow>, SubgraphError>;
    async fn listed_invoices(&self) -> Result<Vec<InvoiceRow>, SubgraphError>;
    async fn active_loans(&self) -> Result<Vec<InvoiceRow>, SubgraphError>;
    async fn active_loans_as_borrower(
        &self,
        user: Address,
    ) -> Result<Vec<InvoiceRow>, SubgraphError>;
    async fn active_loans_as_lender(&self, user: Address)
        -> Result<Vec<InvoiceRow>, SubgraphError>;
    /// Loans due inside `[from_unix, to_unix]`, split borrower-side /
    /// lender-side for the same user.
    async fn due_soon_loans(
        &self,
        user: Address,
        from_unix: i64,
        to_unix: i64,
    ) -> Result<(Vec<InvoiceRow>, Vec<InvoiceRow>), SubgraphError>;
    async fn offers_sent(&self, lender: Address) -> Result<Vec<OfferRow>, SubgraphError>;
    async fn invoice_ids_by_borrower(
        &self,
        borrower: Address,
    ) -> Result<Vec<String>, SubgraphError>;
    /// Offers targeting any of the given invoice ids. An empty id set short
    /// circuits to an empty result without a round trip.
    async fn offers_received(
        &self,
        invoice_ids: Vec<String>,
    ) -> Result<Vec<OfferRow>, SubgraphError>;
    async fn user_reputation(&self, user: Address) -> Result<u64, SubgraphError>;
    /// Lifetime totals `(borrowed, lent)` summed client-side from the
    /// user's borrower and lender aggregates.
    async fn user_totals(&self, user: Address) -> Result<(U256, U256), SubgraphError>;
    async fn listed_token_ids(&self, payer: Option<&str>) -> Result<Vec<U256>, SubgraphError>;
    async fn minted_by_token_ids(
        &self,
        token_ids: Vec<U256>,
    ) -> Result<Vec<InvoiceMintedRow>, SubgraphError>;
    async fn minted_by_token_id(
        &self,
        token_id: U256,
    ) -> Result<Option<InvoiceMintedRow>, SubgraphError>;
    /// One marketplace page: live invoice rows plus the mint-event rows
    /// needed to merge in never-listed invoices.
    async fn marketplace_snapshot(
        &self,
        first: Option<u32>,
        skip: u32,
    ) -> Result<(Vec<InvoiceRow>, Vec<InvoiceMintedRow>), SubgraphError>;
}

pub struct SubgraphClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    limiter: DirectRateLimiter,
    max_retries: u32,
    retry_delay: Duration,
    page_size: u32,
    snapshots: DashMap<String, Value>,
}

impl SubgraphClient {
    pub fn new(cfg: &Subgraph) -> Result<Self, SubgraphError> {
        let quota = Quota::per_second(NonZeroU32::new(cfg.requests_per_second).ok_or_else(
            || SubgraphError::Config("requests_per_second must be non-zero".to_string()),
        )?);
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone().filter(|key| !key.is_empty()),
            limiter: RateLimiter::direct(quota),
            max_retries: cfg.max_retries.max(1),
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            page_size: cfg.page_size,
            snapshots: DashMap::new(),
        })
    }

    /// Last successful `data` object for an operation. Display layers fall
    /// back to this when the endpoint is flaky; reconciliation never does.
    pub fn last_snapshot(&self, operation: &str) -> Option<Value> {
        self.snapshots.get(operation).map(|entry| entry.clone())
    }

    async fn execute(
        &self,
        operation: &str,
        document: &str,
        variables: Value,
    ) -> Result<Value, SubgraphError> {
        let mut attempts = 0u32;
        loop {
            self.limiter.until_ready().await;
            match self.post(document, &variables).await {
                Ok(data) => {
                    self.snapshots.insert(operation.to_string(), data.clone());
                    return Ok(data);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(e);
                    }
                    warn!(
                        "⚠️ [Subgraph] {} failed, retrying in {:?}. Attempt {}/{}. Error: {}",
                        operation, self.retry_delay, attempts, self.max_retries, e
                    );
                    sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn post(&self, document: &str, variables: &Value) -> Result<Value, SubgraphError> {
        let mut request = self
            .http
            .post(&self.url)
            .json(&json!({ "query": document, "variables": variables }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SubgraphError::Query(format!("HTTP {}", response.status())));
        }
        let envelope: GraphQlResponse<Value> = response.json().await?;
        Self::unwrap_envelope(envelope)
    }

    fn unwrap_envelope(envelope: GraphQlResponse<Value>) -> Result<Value, SubgraphError> {
        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SubgraphError::Query(joined));
        }
        envelope.data.ok_or(SubgraphError::MissingData)
    }

    /// Pulls one key out of a `data` object as typed rows. A missing key
    /// decodes as an empty page.
    fn rows<T: DeserializeOwned>(data: &Value, key: &str) -> Result<Vec<T>, SubgraphError> {
        match data.get(key) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(rows) => Ok(serde_json::from_value(rows.clone())?),
        }
    }
}

#[async_trait]
impl SubgraphReader for SubgraphClient {
    async fn minted_invoices(&self, owner: Address) -> Result<Vec<InvoiceMintedRow>, SubgraphError> {
        let data = self
            .execute(
                "GetMintedInvoices",
                queries::GET_MINTED_INVOICES.as_str(),
                json!({ "owner": address_to_string(owner) }),
            )
            .await?;
        Self::rows(&data, "invoiceMinteds")
    }

    async fn invoices_by_owner(&self, owner: Address) -> Result<Vec<InvoiceRow>, SubgraphError> {
        let data = self
            .execute(
                "GetInvoicesByOwner",
                queries::GET_INVOICES_BY_OWNER,
                json!({ "owner": address_to_string(owner) }),
            )
            .await?;
        Self::rows(&data, "invoices")
    }

    async fn listed_invoices(&self) -> Result<Vec<InvoiceRow>, SubgraphError> {
        let data = self
            .execute(
                "GetListedInvoices",
                queries::GET_LISTED_INVOICES.as_str(),
                json!({}),
            )
            .await?;
        Self::rows(&data, "invoices")
    }

    async fn active_loans(&self) -> Result<Vec<InvoiceRow>, SubgraphError> {
        let data = self
            .execute(
                "GetActiveLoans",
                queries::GET_ACTIVE_LOANS.as_str(),
                json!({}),
            )
            .await?;
        Self::rows(&data, "invoices")
    }

    async fn active_loans_as_borrower(
        &self,
        user: Address,
    ) -> Result<Vec<InvoiceRow>, SubgraphError> {
        let data = self
            .execute(
                "GetActiveLoansAsBorrower",
                queries::GET_ACTIVE_LOANS_AS_BORROWER,
                json!({ "borrowerId": address_to_string(user) }),
            )
            .await?;
        Self::rows(&data, "invoices")
    }

    async fn active_loans_as_lender(
        &self,
        user: Address,
    ) -> Result<Vec<InvoiceRow>, SubgraphError> {
        let data = self
            .execute(
                "GetActiveLoansAsLender",
                queries::GET_ACTIVE_LOANS_AS_LENDER,
                json!({ "lenderId": address_to_string(user) }),
            )
            .await?;
        Self::rows(&data, "invoices")
    }

    async fn due_soon_loans(
        &self,
        user: Address,
        from_unix: i64,
        to_unix: i64,
    ) -> Result<(Vec<InvoiceRow>, Vec<InvoiceRow>), SubgraphError> {
        let data = self
            .execute(
                "GetDueSoonLoans",
                queries::GET_DUE_SOON_LOANS.as_str(),
                json!({
                    "userAddress": address_to_string(user),
                    "currentDate": from_unix.to_string(),
                    "threeDaysLater": to_unix.to_string(),
                }),
            )
            .await?;
        Ok((
            Self::rows(&data, "borrowerInvoices")?,
            Self::rows(&data, "lenderInvoices")?,
        ))
    }

    async fn offers_sent(&self, lender: Address) -> Result<Vec<OfferRow>, SubgraphError> {
        let data = self
            .execute(
                "GetYourOffersSent",
                queries::GET_YOUR_OFFERS_SENT,
                json!({ "lenderId": address_to_string(lender) }),
            )
            .await?;
        Self::rows(&data, "offers")
    }

    async fn invoice_ids_by_borrower(
        &self,
        borrower: Address,
    ) -> Result<Vec<String>, SubgraphError> {
        let data = self
            .execute(
                "GetInvoiceIdsByBorrower",
                queries::GET_INVOICE_IDS_BY_BORROWER,
                json!({ "borrowerId": address_to_string(borrower) }),
            )
            .await?;
        let ids: Vec<IdRow> = Self::rows(&data, "invoices")?;
        Ok(ids.into_iter().map(|row| row.id).collect())
    }

    async fn offers_received(
        &self,
        invoice_ids: Vec<String>,
    ) -> Result<Vec<OfferRow>, SubgraphError> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }
        let data = self
            .execute(
                "GetYourOffersReceived",
                queries::GET_YOUR_OFFERS_RECEIVED,
                json!({ "invoiceIds": invoice_ids }),
            )
            .await?;
        Self::rows(&data, "offers")
    }

    async fn user_reputation(&self, user: Address) -> Result<u64, SubgraphError> {
        let data = self
            .execute(
                "GetUserReputation",
                queries::GET_USER_REPUTATION,
                json!({ "user": address_to_string(user) }),
            )
            .await?;
        let borrower: Option<BorrowerRow> = match data.get("borrower") {
            Some(Value::Null) | None => None,
            Some(row) => serde_json::from_value(row.clone())?,
        };
        Ok(borrower.and_then(|row| row.reputation).unwrap_or(0))
    }

    async fn user_totals(&self, user: Address) -> Result<(U256, U256), SubgraphError> {
        let data = self
            .execute(
                "GetTotalBorrowedAndLentByUser",
                queries::GET_TOTAL_BORROWED_AND_LENT_BY_USER,
                json!({ "user": address_to_string(user) }),
            )
            .await?;
        let borrowers: Vec<BorrowerRow> = Self::rows(&data, "borrowers")?;
        let lenders: Vec<LenderRow> = Self::rows(&data, "lenders")?;

        let borrowed = borrowers
            .iter()
            .flat_map(|row| row.invoices.iter())
            .filter_map(|r| r.loan_amount)
            .fold(U256::zero(), |acc, v| acc + v);
        let lent = lenders
            .iter()
            .flat_map(|row| row.loans.iter())
            .filter_map(|r| r.loan_amount)
            .fold(U256::zero(), |acc, v| acc + v);
        Ok((borrowed, lent))
    }

    async fn listed_token_ids(&self, payer: Option<&str>) -> Result<Vec<U256>, SubgraphError> {
        let data = match payer.map(str::trim).filter(|p| !p.is_empty()) {
            Some(payer) => {
                self.execute(
                    "GetListedInvoiceTokenIdsByPayer",
                    queries::GET_LISTED_INVOICE_TOKEN_IDS_BY_PAYER,
                    json!({ "payerName": payer }),
                )
                .await?
            }
            None => {
                self.execute(
                    "GetListedInvoiceTokenIds",
                    queries::GET_LISTED_INVOICE_TOKEN_IDS,
                    json!({}),
                )
                .await?
            }
        };
        let rows: Vec<TokenIdRow> = Self::rows(&data, "invoices")?;
        Ok(rows.into_iter().filter_map(|row| row.token_id).collect())
    }

    async fn minted_by_token_ids(
        &self,
        token_ids: Vec<U256>,
    ) -> Result<Vec<InvoiceMintedRow>, SubgraphError> {
        if token_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = token_ids.iter().map(U256::to_string).collect();
        let data = self
            .execute(
                "GetMintedInvoicesByTokenIds",
                queries::GET_MINTED_INVOICES_BY_TOKEN_IDS.as_str(),
                json!({ "tokenIds": ids }),
            )
            .await?;
        Self::rows(&data, "invoiceMinteds")
    }

    async fn minted_by_token_id(
        &self,
        token_id: U256,
    ) -> Result<Option<InvoiceMintedRow>, SubgraphError> {
        let data = self
            .execute(
                "GetInvoiceMintedByTokenId",
                queries::GET_INVOICE_MINTED_BY_TOKEN_ID.as_str(),
                json!({ "tokenId": token_id.to_string() }),
            )
            .await?;
        let rows: Vec<InvoiceMintedRow> = Self::rows(&data, "invoiceMinteds")?;
        Ok(rows.into_iter().next())
    }

    async fn marketplace_snapshot(
        &self,
        first: Option<u32>,
        skip: u32,
    ) -> Result<(Vec<InvoiceRow>, Vec<InvoiceMintedRow>), SubgraphError> {
        let data = self
            .execute(
                "GetAllInvoicesWithIPFS",
                queries::GET_ALL_INVOICES_WITH_IPFS,
                json!({ "first": first.unwrap_or(self.page_size), "skip": skip }),
            )
            .await?;
        Ok((
            Self::rows(&data, "invoices")?,
            Self::rows(&data, "invoiceMinteds")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SubgraphClient {
        SubgraphClient::new(&Subgraph::default()).unwrap()
    }

    #[test]
    fn zero_rate_limit_refuses_to_construct() {
        let mut cfg = Subgraph::default();
        cfg.requests_per_second = 0;
        assert!(matches!(
            SubgraphClient::new(&cfg),
            Err(SubgraphError::Config(_))
        ));
    }

    #[test]
    fn envelope_errors_join_into_one_message() {
        let envelope: GraphQlResponse<Value> = serde_json::from_str(
            r#"{ "data": null, "errors": [ { "message": "first" }, { "message": "second" } ] }"#,
        )
        .unwrap();
        match SubgraphClient::unwrap_envelope(envelope) {
            Err(SubgraphError::Query(message)) => {
                assert_eq!(message, "first; second");
            }
            other => panic!("expected query error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn envelope_without_data_is_an_error() {
        let envelope: GraphQlResponse<Value> = serde_json::from_str(r#"{ "data": null }"#).unwrap();
        assert!(matches!(
            SubgraphClient::unwrap_envelope(envelope),
            Err(SubgraphError::MissingData)
        ));
    }

    #[test]
    fn missing_row_key_decodes_as_empty_page() {
        let data = json!({ "invoices": [] });
        let rows: Vec<InvoiceMintedRow> = SubgraphClient::rows(&data, "invoiceMinteds").unwrap();
        assert!(rows.is_empty());

        let data = json!({ "invoiceMinteds": null });
        let rows: Vec<InvoiceMintedRow> = SubgraphClient::rows(&data, "invoiceMinteds").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn snapshots_replay_the_last_data_object() {
        let client = client();
        assert!(client.last_snapshot("GetListedInvoices").is_none());
        client
            .snapshots
            .insert("GetListedInvoices".to_string(), json!({ "invoices": [] }));
        assert_eq!(
            client.last_snapshot("GetListedInvoices"),
            Some(json!({ "invoices": [] }))
        );
    }
}
