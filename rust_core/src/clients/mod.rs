pub mod binance;
pub mod kraken;
pub mod mempool;
pub mod miner_stats;
pub mod ticker;

// Re-export commonly used types
pub use binance::BinanceFeed;
pub use kraken::KrakenFeed;
pub use mempool::MempoolClient;
pub use miner_stats::{parse_suffixed_difficulty, BestDiffError, HttpMinerStatsFetcher};
pub use ticker::{TickerFeed, TickerParseError, TickerQuote, TickerStreamWorker, TickerWorkerConfig};
