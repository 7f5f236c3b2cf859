// Contracts Module - Public ABIs Only

pub mod erc20;
pub mod invoice_nft;
pub mod marketplace;

// Public exports
pub use erc20::IERC20;
pub use invoice_nft::{InvoiceMintedFilter, InvoiceNFT};
pub use marketplace::LendingMarketplace;
