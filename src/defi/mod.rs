//! DeFi positions, module balances and the protocol overview

mod metadata;
mod overview;
mod store;
mod types;

pub use metadata::DefiMetadata;
pub use overview::{build_overview, classify, ListedProtocol, OverviewSource, ProtocolEntry};
pub use store::{DefiAccount, DefiStore};
pub use types::*;
