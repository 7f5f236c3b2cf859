use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Chain {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Confirmations awaited before a write is treated as final.
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
    #[serde(default = "default_tx_timeout_seconds")]
    pub tx_timeout_seconds: u64,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_chain_id() -> u64 {
    31337 // Local devnet (Hardhat/Anvil)
}
fn default_confirmations() -> usize {
    1
}
fn default_tx_timeout_seconds() -> u64 {
    120
}

impl Default for Chain {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            confirmations: default_confirmations(),
            tx_timeout_seconds: default_tx_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    /// Invoice NFT registry address (hex string, parsed when services bind).
    #[serde(default)]
    pub invoice_nft: String,
    /// Lending marketplace address.
    #[serde(default)]
    pub marketplace: String,
    /// ERC-20 settlement tokens bound at startup; individual failures are
    /// skipped, so one bad address does not block the core services.
    #[serde(default)]
    pub supported_tokens: Vec<String>,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
}

fn default_token_decimals() -> u32 {
    6 // USDC-style settlement tokens
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            invoice_nft: String::new(),
            marketplace: String::new(),
            supported_tokens: Vec::new(),
            token_decimals: default_token_decimals(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Subgraph {
    #[serde(default = "default_subgraph_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_subgraph_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_subgraph_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_subgraph_url() -> String {
    "https://api.studio.thegraph.com/query/107624/invoice-nft/version/latest".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_subgraph_max_retries() -> u32 {
    3
}
fn default_subgraph_retry_delay_ms() -> u64 {
    500
}
fn default_requests_per_second() -> u32 {
    5
}

impl Default for Subgraph {
    fn default() -> Self {
        Self {
            url: default_subgraph_url(),
            api_key: None,
            page_size: default_page_size(),
            max_retries: default_subgraph_max_retries(),
            retry_delay_ms: default_subgraph_retry_delay_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pinning {
    #[serde(default = "default_pinning_api_base")]
    pub api_base: String,
    #[serde(default = "default_pinning_gateway")]
    pub gateway: String,
    /// JWT takes precedence over the key/secret pair when both are set.
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_pinning_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_fetch_max_retries")]
    pub fetch_max_retries: usize,
    #[serde(default = "default_metadata_cache_size")]
    pub metadata_cache_size: usize,
    /// Metadata CIDs dropped from merged views (stale fixtures, spam pins).
    #[serde(default)]
    pub excluded_cids: Vec<String>,
}

fn default_pinning_api_base() -> String {
    "https://api.pinata.cloud".to_string()
}
fn default_pinning_gateway() -> String {
    "https://gateway.pinata.cloud".to_string()
}
fn default_pinning_timeout_seconds() -> u64 {
    30
}
fn default_fetch_max_retries() -> usize {
    3
}
fn default_metadata_cache_size() -> usize {
    256
}

impl Default for Pinning {
    fn default() -> Self {
        Self {
            api_base: default_pinning_api_base(),
            gateway: default_pinning_gateway(),
            jwt: None,
            api_key: None,
            api_secret: None,
            timeout_seconds: default_pinning_timeout_seconds(),
            fetch_max_retries: default_fetch_max_retries(),
            metadata_cache_size: default_metadata_cache_size(),
            excluded_cids: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Session {
    /// Where the explicit-disconnect marker is persisted. The only local
    /// state the SDK keeps between runs.
    #[serde(default = "default_disconnect_flag_path")]
    pub disconnect_flag_path: String,
}

fn default_disconnect_flag_path() -> String {
    ".wallet_disconnected".to_string()
}

impl Default for Session {
    fn default() -> Self {
        Self {
            disconnect_flag_path: default_disconnect_flag_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub chain: Chain,
    #[serde(default)]
    pub contracts: Contracts,
    #[serde(default)]
    pub subgraph: Subgraph,
    #[serde(default)]
    pub pinning: Pinning,
    #[serde(default)]
    pub session: Session,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides
        if let Ok(url) = env::var("INVOICE_SDK_RPC_URL") {
            if !url.trim().is_empty() {
                settings.chain.rpc_url = url.trim().to_string();
            }
        }
        if let Ok(raw) = env::var("INVOICE_SDK_CHAIN_ID") {
            if let Ok(id) = raw.trim().parse() {
                settings.chain.chain_id = id;
            }
        }
        if let Ok(addr) = env::var("INVOICE_SDK_NFT_ADDRESS") {
            if !addr.trim().is_empty() {
                settings.contracts.invoice_nft = addr.trim().to_string();
            }
        }
        if let Ok(addr) = env::var("INVOICE_SDK_MARKETPLACE_ADDRESS") {
            if !addr.trim().is_empty() {
                settings.contracts.marketplace = addr.trim().to_string();
            }
        }
        if let Ok(raw) = env::var("INVOICE_SDK_SUPPORTED_TOKENS") {
            let list = parse_string_list(&raw);
            if !list.is_empty() {
                settings.contracts.supported_tokens = list;
            }
        }
        if let Ok(url) = env::var("INVOICE_SDK_SUBGRAPH_URL") {
            if !url.trim().is_empty() {
                settings.subgraph.url = url.trim().to_string();
            }
        }
        if let Ok(key) = env::var("INVOICE_SDK_GRAPH_API_KEY") {
            if !key.trim().is_empty() {
                settings.subgraph.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(jwt) = env::var("INVOICE_SDK_PINATA_JWT") {
            if !jwt.trim().is_empty() {
                settings.pinning.jwt = Some(jwt.trim().to_string());
            }
        }
        if let Ok(key) = env::var("INVOICE_SDK_PINATA_API_KEY") {
            if !key.trim().is_empty() {
                settings.pinning.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(secret) = env::var("INVOICE_SDK_PINATA_API_SECRET") {
            if !secret.trim().is_empty() {
                settings.pinning.api_secret = Some(secret.trim().to_string());
            }
        }
        if let Ok(path) = env::var("INVOICE_SDK_DISCONNECT_FLAG_PATH") {
            if !path.trim().is_empty() {
                settings.session.disconnect_flag_path = path.trim().to_string();
            }
        }

        Ok(settings)
    }
}

/// Accepts either a JSON array (`["0xA", "0xB"]`) or a plain comma list.
fn parse_string_list(input: &str) -> Vec<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Vec<String>>(trimmed) {
            return v;
        }
    }

    trimmed
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
