//! Row types for subgraph responses.
//!
//! The Graph serializes `BigInt` fields as JSON strings, so every numeric
//! column goes through a string-parsing deserializer. Fields that only some
//! query documents select are optional and default to absent rather than
//! failing the whole page.

use ethers::types::U256;
use serde::{Deserialize, Deserializer};

pub(crate) fn u256_from_string<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    U256::from_dec_str(raw.trim()).map_err(serde::de::Error::custom)
}

pub(crate) fn opt_u256_from_string<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => U256::from_dec_str(raw.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

pub(crate) fn opt_i64_from_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

pub(crate) fn opt_u64_from_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Entity reference keyed by a lowercase address. Some documents also
/// select a checksummed `address` column.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountRef {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// One `InvoiceMinted` event as indexed. Immutable once written.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceMintedRow {
    #[serde(default)]
    pub id: String,
    #[serde(deserialize_with = "u256_from_string")]
    pub token_id: U256,
    pub owner: String,
    #[serde(rename = "ipfsCID")]
    pub ipfs_cid: String,
    #[serde(default, deserialize_with = "opt_u64_from_string")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub block_timestamp: Option<i64>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Marketplace-tracked invoice. Status values come through as the ledger's
/// uppercase strings (`LISTED`, `LOANED`, `REPAID`, `DEFAULTED`, `CLAIMED`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRow {
    /// Entity id, the decimal token id. Not every document selects it.
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub token_id: Option<U256>,
    #[serde(default)]
    pub borrower: Option<AccountRef>,
    #[serde(default)]
    pub lender: Option<AccountRef>,
    #[serde(default)]
    pub token: Option<AccountRef>,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub loan_amount: Option<U256>,
    /// Face amount of the underlying invoice, distinct from the loan amount.
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub amount: Option<U256>,
    #[serde(default)]
    pub payer_name: Option<String>,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub interest: Option<U256>,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub risk_factor: Option<U256>,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub created_at: Option<i64>,
}

impl InvoiceRow {
    /// Invoice ids are the decimal token id; the explicit column wins when a
    /// document selects it.
    pub fn resolved_token_id(&self) -> Option<U256> {
        self.token_id
            .or_else(|| U256::from_dec_str(self.id.trim()).ok())
    }
}

/// Invoice fields embedded inside an offer row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferInvoiceRef {
    pub id: String,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub loan_amount: Option<U256>,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub borrower: Option<AccountRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRow {
    pub id: String,
    #[serde(default)]
    pub invoice: Option<OfferInvoiceRef>,
    #[serde(default)]
    pub lender: Option<AccountRef>,
    #[serde(default)]
    pub token: Option<AccountRef>,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub amount: Option<U256>,
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub interest: Option<U256>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "opt_i64_from_string")]
    pub created_at: Option<i64>,
}

impl OfferRow {
    pub fn invoice_token_id(&self) -> Option<U256> {
        self.invoice
            .as_ref()
            .and_then(|inv| U256::from_dec_str(inv.id.trim()).ok())
    }
}

/// Aggregation helper row: only the loan amount of each related invoice.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanAmountRef {
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub loan_amount: Option<U256>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerRow {
    pub id: String,
    #[serde(default, deserialize_with = "opt_u64_from_string")]
    pub reputation: Option<u64>,
    #[serde(default)]
    pub invoices: Vec<LoanAmountRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LenderRow {
    pub id: String,
    #[serde(default)]
    pub loans: Vec<LoanAmountRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRow {
    pub id: String,
}

/// Row for documents that select nothing but `tokenId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIdRow {
    #[serde(default, deserialize_with = "opt_u256_from_string")]
    pub token_id: Option<U256>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}
