use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::conversions::u256_to_decimal;

/// View-side lifecycle of an invoice token. The indexer never emits a MINTED
/// status (a mint with no marketplace row simply has no Invoice entity), so
/// Minted is assigned by the merge, not parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceStatus {
    Minted,
    Listed,
    Funded,
    Repaid,
    Defaulted,
}

impl InvoiceStatus {
    /// Maps the indexer's vocabulary onto the view vocabulary. Unknown
    /// strings fall back to Listed, because any invoice the marketplace
    /// tracks has at least been listed.
    pub fn from_ledger_status(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOANED" => Self::Funded,
            "REPAID" => Self::Repaid,
            "DEFAULTED" | "CLAIMED" => Self::Defaulted,
            _ => Self::Listed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl OfferStatus {
    pub fn from_ledger_status(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACCEPTED" => Self::Accepted,
            "REJECTED" => Self::Rejected,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

/// One row of the merged invoice view. Rows born from a marketplace entity
/// carry listing data; rows born only from a mint event carry whatever the
/// pinned metadata could fill in, and absent fields stay absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub token_id: U256,
    /// Borrower for marketplace rows, minter for mint-only rows.
    pub owner: Address,
    pub lender: Option<Address>,
    /// Smallest token units.
    pub amount: Option<U256>,
    pub interest: Option<U256>,
    pub due_date: Option<DateTime<Utc>>,
    pub payer_name: Option<String>,
    pub status: InvoiceStatus,
    pub metadata_cid: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn display_amount(&self, decimals: u32) -> Option<Decimal> {
        self.amount.and_then(|a| u256_to_decimal(a, decimals).ok())
    }
}

/// A loan offer as the indexer reports it. `lender` is absent on rows from
/// the sent-offers query (the lender was the query subject); `borrower` is
/// absent on rows from the received-offers query for the same reason.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanOffer {
    /// Indexer entity id, unique per offer.
    pub offer_id: String,
    pub token_id: U256,
    pub lender: Option<Address>,
    pub borrower: Option<Address>,
    pub token: Option<Address>,
    pub amount: U256,
    pub interest: U256,
    pub status: OfferStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub invoice_amount: Option<U256>,
    pub invoice_due_date: Option<DateTime<Utc>>,
    pub invoice_status: Option<InvoiceStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLoan {
    pub token_id: U256,
    pub borrower: Option<Address>,
    pub lender: Option<Address>,
    pub amount: U256,
    pub interest: U256,
    pub due_date: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ActiveLoan {
    /// A loan is overdue strictly after its due date passes.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now
    }

    pub fn is_due_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.due_date >= now && self.due_date <= now + window
    }
}

/// Reputation plus lifetime borrow/lend volume for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserStats {
    pub reputation: u64,
    pub total_borrowed: U256,
    pub total_lent: U256,
}

/// The pinned metadata document, field for field what the minting client
/// writes: flat `attributes` object (not an OpenSea-style array), camelCase
/// keys inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMetadata {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub attributes: MetadataAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataAttributes {
    /// Human-denominated decimal string, e.g. "1250.50".
    pub amount: String,
    /// Calendar date, "YYYY-MM-DD".
    pub due_date: String,
    pub payer_name: String,
}

impl InvoiceMetadata {
    pub fn new(
        description: &str,
        amount: Decimal,
        due_date: NaiveDate,
        payer_name: &str,
        image: Option<String>,
    ) -> Self {
        Self {
            name: format!("Invoice #{}", Utc::now().timestamp_millis()),
            description: description.to_string(),
            image,
            attributes: MetadataAttributes {
                amount: amount.to_string(),
                due_date: due_date.format("%Y-%m-%d").to_string(),
                payer_name: payer_name.to_string(),
            },
        }
    }

    pub fn parsed_amount(&self) -> Option<Decimal> {
        Decimal::from_str(self.attributes.amount.trim()).ok()
    }

    pub fn parsed_due_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.attributes.due_date.trim(), "%Y-%m-%d").ok()
    }

    /// Due date at midnight UTC, the instant the contract compares against.
    pub fn due_date_utc(&self) -> Option<DateTime<Utc>> {
        self.parsed_due_date()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ndt| Utc.from_utc_datetime(&ndt))
    }
}

/// Decoded `loans(tokenId)` storage tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanInfo {
    pub borrower: Address,
    pub lender: Address,
    pub token: Address,
    pub loan_amount: U256,
    pub interest: U256,
    /// Unix seconds.
    pub due_date: U256,
    pub is_active: bool,
}

impl From<(Address, Address, Address, U256, U256, U256, bool)> for LoanInfo {
    fn from(t: (Address, Address, Address, U256, U256, U256, bool)) -> Self {
        Self {
            borrower: t.0,
            lender: t.1,
            token: t.2,
            loan_amount: t.3,
            interest: t.4,
            due_date: t.5,
            is_active: t.6,
        }
    }
}

/// One entry of the `getOffers` parallel arrays, zipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferEntry {
    pub lender: Address,
    pub amount: U256,
    pub interest: U256,
}

/// Decoded `pendingOffers(tokenId, lender)` tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingOffer {
    pub token: Address,
    pub amount: U256,
    pub interest: U256,
}

/// Result of a finalized mint. `token_id` comes from the InvoiceMinted log
/// and is absent when the receipt carried no decodable event; consumers fall
/// back to the indexer in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct MintedToken {
    pub tx_hash: H256,
    pub token_id: Option<U256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_status_mapping() {
        assert_eq!(InvoiceStatus::from_ledger_status("LISTED"), InvoiceStatus::Listed);
        assert_eq!(InvoiceStatus::from_ledger_status("LOANED"), InvoiceStatus::Funded);
        assert_eq!(InvoiceStatus::from_ledger_status("REPAID"), InvoiceStatus::Repaid);
        assert_eq!(InvoiceStatus::from_ledger_status("CLAIMED"), InvoiceStatus::Defaulted);
        assert_eq!(InvoiceStatus::from_ledger_status("defaulted"), InvoiceStatus::Defaulted);
        // Anything the marketplace tracks has at least been listed
        assert_eq!(InvoiceStatus::from_ledger_status("???"), InvoiceStatus::Listed);
    }

    #[test]
    fn offer_status_mapping_defaults_to_pending() {
        assert_eq!(OfferStatus::from_ledger_status("ACCEPTED"), OfferStatus::Accepted);
        assert_eq!(OfferStatus::from_ledger_status("CANCELLED"), OfferStatus::Cancelled);
        assert_eq!(OfferStatus::from_ledger_status(""), OfferStatus::Pending);
    }

    #[test]
    fn metadata_serializes_with_camel_case_attribute_keys() {
        let meta = InvoiceMetadata::new(
            "Office fit-out",
            Decimal::from_str("1250.50").unwrap(),
            NaiveDate::from_ymd_opt(2026, 11, 30).unwrap(),
            "Acme GmbH",
            None,
        );
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"dueDate\":\"2026-11-30\""));
        assert!(json.contains("\"payerName\":\"Acme GmbH\""));
        assert!(json.contains("\"amount\":\"1250.50\""));
        assert!(!json.contains("\"image\""));

        let back: InvoiceMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn metadata_parses_its_own_attributes() {
        let meta = InvoiceMetadata::new(
            "desc",
            Decimal::from_str("99.9").unwrap(),
            NaiveDate::from_ymd_opt(2027, 1, 15).unwrap(),
            "Payer",
            Some("https://gateway.pinata.cloud/ipfs/QmImg".to_string()),
        );
        assert_eq!(meta.parsed_amount(), Some(Decimal::from_str("99.9").unwrap()));
        assert_eq!(
            meta.parsed_due_date(),
            Some(NaiveDate::from_ymd_opt(2027, 1, 15).unwrap())
        );
        assert!(meta.name.starts_with("Invoice #"));
    }

    #[test]
    fn overdue_is_strictly_past_due() {
        let due = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let loan = ActiveLoan {
            token_id: U256::from(1),
            borrower: None,
            lender: None,
            amount: U256::from(1000),
            interest: U256::from(50),
            due_date: due,
            created_at: None,
        };
        assert!(!loan.is_overdue(due));
        assert!(loan.is_overdue(due + Duration::seconds(1)));
        assert!(!loan.is_overdue(due - Duration::seconds(1)));
    }

    #[test]
    fn due_within_covers_inclusive_window() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let mk = |due: DateTime<Utc>| ActiveLoan {
            token_id: U256::from(7),
            borrower: None,
            lender: None,
            amount: U256::from(1),
            interest: U256::zero(),
            due_date: due,
            created_at: None,
        };
        let window = Duration::days(3);
        assert!(mk(now).is_due_within(now, window));
        assert!(mk(now + Duration::days(3)).is_due_within(now, window));
        assert!(!mk(now + Duration::days(3) + Duration::seconds(1)).is_due_within(now, window));
        assert!(!mk(now - Duration::seconds(1)).is_due_within(now, window));
    }
}
