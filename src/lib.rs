pub mod catalog;
pub mod error;
pub mod images;
pub mod normalization;
pub mod prices;
pub mod store;

pub mod util {
    pub mod env;
    pub mod tracing;
}

pub use error::SyncError;
