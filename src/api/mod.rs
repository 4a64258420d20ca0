pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::{Gateway, RewardsApi};
pub use error::GatewayError;
pub use types::TokenPair;
