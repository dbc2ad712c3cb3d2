pub mod client;
pub mod reconcile;

pub use client::{PriceGroup, PriceRow, PriceSource, TcgCsvFeed};
pub use reconcile::{reconcile_prices, PriceReport};
