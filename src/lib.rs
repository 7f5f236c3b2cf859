//! # Invoice Lending SDK
//!
//! A Rust client library for an invoice-tokenization lending marketplace.
//! Businesses mint their receivables as NFTs, list them for loans, and
//! lenders fund them in ERC-20 settlement tokens; this SDK gives a headless
//! host (a bot, a server-side agent, an indexer companion) the full adapter
//! and orchestration layer the marketplace's browser client had, minus the
//! rendering.
//!
//! ## Overview
//!
//! The SDK is built around one consistency contract: chain state is
//! authoritative, the indexer lags it, and every write flow ends with a
//! scoped re-fetch that reconciles the local projections. It focuses on:
//!
//! - **Contract services**: typed, lifecycle-managed adapters over the
//!   invoice NFT registry, the lending marketplace and settlement tokens
//! - **Indexed reads**: a rate-limited GraphQL client over the
//!   marketplace's subgraph
//! - **Metadata pinning**: a Pinata-compatible store for the off-chain
//!   invoice documents
//! - **Orchestration**: every user flow, optimistic patches, and the
//!   reconciled dashboard board
//!
//! ## Architecture
//!
//! ### Wallet & Session Layer
//! A provider-agnostic wallet seam with session state, change notification
//! and a persisted explicit-disconnect flag.
//!
//! ### Service Layer
//! `abigen!`-typed contract adapters behind capability traits, owned by a
//! locator that binds and tears the whole set down atomically per signer.
//!
//! ### Read Layer
//! Subgraph queries and pinned-metadata fetches merged into screen-facing
//! views; reads here are display-grade and never gate a write.
//!
//! ### Orchestration Layer
//! The `InvoiceOrchestrator` composes the seams: approvals before writes,
//! finality before success, optimistic patch then scoped reconcile.

// Core Types
/// Domain views, chain tuples and the pinned metadata document
pub mod types;

// Wallet & Session
/// Wallet provider seam, session state and the disconnect flag
pub mod wallet;

// Contract Services
/// Smart contract ABIs (registry, marketplace, settlement token)
pub mod contracts;
/// Typed contract adapters and the service locator
pub mod services;

// Read Layer
/// Off-chain metadata pinning and gateway reads
pub mod pinning;
/// Indexed reads over the marketplace subgraph
pub mod subgraph;
/// Merged projections and the two-phase board updates
pub mod views;

// Orchestration
/// User flows and the reconciled dashboard board
pub mod orchestrator;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use orchestrator::{InvoiceOrchestrator, QueryScope};
pub use pinning::{MetadataStore, PinataClient};
pub use services::{ServiceLocator, ServiceSource};
pub use settings::Settings;
pub use subgraph::{SubgraphClient, SubgraphReader};
pub use types::{ActiveLoan, Invoice, InvoiceMetadata, InvoiceStatus, LoanOffer, OfferStatus};
pub use views::InvoiceBoard;
pub use wallet::{LocalKeyWallet, SessionManager, WalletProvider, WalletSession};
