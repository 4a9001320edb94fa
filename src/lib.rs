pub mod augmenter;
pub mod config;
pub mod document;
pub mod feeds;
pub mod fetcher;
pub mod gemini;
pub mod keywords;
pub mod types;

pub use augmenter::{discover_feed_files, KeywordAugmenter};
pub use config::GenConfig;
pub use document::{Element, FeedDocument, Node};
pub use feeds::FEED_URLS;
pub use fetcher::FeedFetcher;
pub use gemini::{ChunkStream, GeminiClient, KeywordModel, MockModel};
pub use types::{FetchConfig, Result, TaggerError};
