/// Backend API client layer
///
/// `ApiClient` issues every HTTP call; the endpoint groups the stores use are
/// exposed as traits so stores can be driven by fakes.
pub mod balances;
pub mod client;
pub mod defi;
pub mod history;
pub mod tasks;
pub mod traits;
pub mod wire;

#[cfg(test)]
pub mod test_server;

pub use balances::{AssetInfo, AssetMap, AssetSearchPayload, AssetWithId, Erc20Details};
pub use client::{ApiClient, HttpClient, Request};
pub use history::EventDetails;
pub use traits::{
    AccountsApi, ChainsApi, DefiApi, LedgerActionsApi, LedgerActionsResponse, TokensApi,
    TransactionsApi, TransactionsResponse,
};
