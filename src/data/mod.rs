//! Market data layer: providers, TTL cache, tool-server fallbacks.

pub mod aggregated;
pub mod cache;
pub mod error;
pub mod mapping;
pub mod mock;
pub mod models;
pub mod provider;
pub mod service;
pub mod tool_servers;
pub mod yahoo;

pub use aggregated::AggregatedProvider;
pub use cache::{CacheStats, TtlCache};
pub use error::DataError;
pub use mock::MockProvider;
pub use models::{
    IVAnalysis, Market, MarketSentiment, OptionChain, OptionContract, PriceBar, PriceHistory,
    Quote,
};
pub use provider::{Capability, MarketDataProvider};
pub use service::{BatchEntry, MarketDataService, SymbolRequest};
pub use tool_servers::{ToolServerManager, ToolServersConfig};
pub use yahoo::YahooProvider;
