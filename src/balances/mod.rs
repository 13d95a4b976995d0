//! Chains, accounts and token detection

mod accounts;
mod chains;
mod tokens;
mod types;

pub use accounts::AccountsStore;
pub use chains::SupportedChains;
pub use tokens::{BlockchainTokensStore, TokenDetection};
pub use types::*;
