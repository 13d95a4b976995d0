/// Blockchain accounts per chain
use super::chains::SupportedChains;
use super::types::{BlockchainAccount, GeneralAccount};
use crate::apis::AccountsApi;
use crate::logger::{self, LogTag};
use crate::notifications::{NotificationPayload, NotificationStore};
use crate::observable::Observable;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct AccountsStore {
    api: Arc<dyn AccountsApi>,
    chains: Arc<SupportedChains>,
    notifications: Arc<NotificationStore>,
    accounts: Observable<BTreeMap<String, Vec<GeneralAccount>>>,
}

impl AccountsStore {
    pub fn new(
        api: Arc<dyn AccountsApi>,
        chains: Arc<SupportedChains>,
        notifications: Arc<NotificationStore>,
    ) -> Self {
        Self {
            api,
            chains,
            notifications,
            accounts: Observable::default(),
        }
    }

    /// Refresh the given chains, or every supported chain when `None`
    ///
    /// Chains are fetched concurrently; a failing chain keeps its previous
    /// accounts and is reported on its own.
    pub async fn fetch_accounts(&self, chains: Option<&[String]>) {
        let chains: Vec<String> = match chains {
            Some(chains) => chains.to_vec(),
            None => {
                self.chains.ensure_loaded().await;
                self.chains
                    .supported_chains()
                    .into_iter()
                    .map(|c| c.id)
                    .collect()
            }
        };

        let fetches = chains.iter().map(|chain| async move {
            (chain, self.api.accounts(chain).await)
        });

        for (chain, result) in join_all(fetches).await {
            match result {
                Ok(accounts) => {
                    logger::debug(
                        LogTag::Accounts,
                        &format!("{} accounts on {}", accounts.len(), chain),
                    );
                    self.accounts.update(|map| {
                        map.insert(chain.clone(), accounts);
                    });
                }
                Err(e) => {
                    self.notifications.notify(NotificationPayload::error(
                        "Failed to load accounts",
                        format!("Could not fetch {} accounts: {}", chain, e),
                    ));
                }
            }
        }
    }

    /// Every account across chains
    pub fn accounts(&self) -> Vec<BlockchainAccount> {
        self.accounts.with(|map| {
            map.iter()
                .flat_map(|(chain, accounts)| {
                    accounts.iter().map(move |a| BlockchainAccount {
                        chain: chain.clone(),
                        address: a.address.clone(),
                    })
                })
                .collect()
        })
    }

    pub fn addresses(&self, chain: &str) -> Vec<String> {
        self.accounts.with(|map| {
            map.get(chain)
                .map(|accounts| accounts.iter().map(|a| a.address.clone()).collect())
                .unwrap_or_default()
        })
    }

    /// chain -> addresses
    pub fn all_address_mapping(&self) -> BTreeMap<String, Vec<String>> {
        self.accounts.with(|map| {
            map.iter()
                .map(|(chain, accounts)| {
                    (
                        chain.clone(),
                        accounts.iter().map(|a| a.address.clone()).collect(),
                    )
                })
                .collect()
        })
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<BTreeMap<String, Vec<GeneralAccount>>> {
        self.accounts.subscribe()
    }
}
