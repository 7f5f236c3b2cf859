// Shared domain types and chain-boundary conversions

pub mod conversions;
pub mod invoice_data;

pub use conversions::ConversionError;
pub use invoice_data::{
    ActiveLoan, Invoice, InvoiceMetadata, InvoiceStatus, LoanInfo, LoanOffer, MetadataAttributes,
    MintedToken, OfferEntry, OfferStatus, PendingOffer, UserStats,
};
