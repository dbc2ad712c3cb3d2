pub mod identifier;
pub mod matching;

pub use identifier::{CanonicalKey, ParsedIdentifier, Variant};
pub use matching::{strategies, strategy_by_name, FeedProduct, MatchStrategy};
