pub mod client;
pub mod query;
pub mod token;
pub mod types;

pub use client::BitableClient;
pub use query::{TableLocation, build_filter};
pub use token::TokenCache;
