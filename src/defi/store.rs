/// DeFi balances across protocols and per-module positions
use super::metadata::DefiMetadata;
use super::overview::{build_overview, OverviewSource};
use super::types::{
    AllDefiProtocols, DefiProtocol, DefiProtocolSummary, Module, ModuleBalances, ResetTarget,
};
use crate::apis::DefiApi;
use crate::errors::FolioResult;
use crate::logger::{self, LogTag};
use crate::notifications::{NotificationPayload, NotificationStore};
use crate::observable::Observable;
use crate::session::StoreContext;
use crate::status::{Section, Status, StatusUpdater};
use crate::tasks::{TaskMeta, TaskRegistry, TaskResult, TaskType};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Address with the protocols it has module positions in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefiAccount {
    pub address: String,
    pub protocols: Vec<DefiProtocol>,
}

pub struct DefiStore {
    api: Arc<dyn DefiApi>,
    tasks: Arc<TaskRegistry>,
    status: StatusUpdater,
    notifications: Arc<NotificationStore>,
    metadata: Arc<DefiMetadata>,
    all_protocols: Observable<AllDefiProtocols>,
    module_balances: Observable<BTreeMap<Module, ModuleBalances>>,
    premium: AtomicBool,
}

impl DefiStore {
    pub fn new(api: Arc<dyn DefiApi>, context: &StoreContext, metadata: Arc<DefiMetadata>) -> Self {
        Self {
            api,
            tasks: context.tasks.clone(),
            status: context.statuses.updater(Section::DefiOverview),
            notifications: context.notifications.clone(),
            metadata,
            all_protocols: Observable::default(),
            module_balances: Observable::default(),
            premium: AtomicBool::new(true),
        }
    }

    pub fn all_protocols(&self) -> AllDefiProtocols {
        self.all_protocols.get()
    }

    pub fn module_balances(&self, module: Module) -> Option<ModuleBalances> {
        self.module_balances.with(|modules| modules.get(&module).cloned())
    }

    pub fn status(&self) -> Status {
        self.status.get_status()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<AllDefiProtocols> {
        self.all_protocols.subscribe()
    }

    // ========================================================================
    // FETCHING
    // ========================================================================

    /// Positions of every account across all protocols
    pub async fn fetch_defi_balances(&self, refresh: bool) {
        let section = Section::DefiBalances;
        if !self.status.try_begin(section, refresh) {
            return;
        }

        match self.defi_balances_task().await {
            Ok(all) => {
                logger::info(
                    LogTag::Defi,
                    &format!("Loaded DeFi positions of {} addresses", all.len()),
                );
                self.all_protocols.set(all);
            }
            Err(e) => {
                self.notifications.notify(NotificationPayload::error(
                    "DeFi balances",
                    format!("Failed to fetch DeFi balances: {}", e),
                ));
            }
        }
        self.status.set_status_of(section, Status::Loaded);
    }

    async fn defi_balances_task(&self) -> FolioResult<AllDefiProtocols> {
        let pending = self.api.fetch_all_defi().await?;
        let all: TaskResult<AllDefiProtocols> = self
            .tasks
            .await_task(
                pending,
                TaskType::DefiBalances,
                TaskMeta::new("Fetching DeFi balances"),
                false,
            )
            .await?;
        Ok(all.result)
    }

    /// Positions of one lending module, tracked under the module's own section
    pub async fn fetch_module_balances(&self, module: Module, refresh: bool) {
        let Some(section) = module.section() else {
            logger::warning(
                LogTag::Defi,
                &format!("{} has no balances section, skipping", module),
            );
            return;
        };
        if !self.status.try_begin(section, refresh) {
            return;
        }

        match self.module_balances_task(module).await {
            Ok(balances) => {
                logger::debug(
                    LogTag::Defi,
                    &format!("{} balances of {} addresses", module, balances.len()),
                );
                self.module_balances.update(|modules| {
                    modules.insert(module, balances);
                });
            }
            Err(e) if e.is_benign() => {
                logger::debug(LogTag::Defi, &format!("{} balances cancelled", module));
            }
            Err(e) => {
                self.notifications.notify(NotificationPayload::error(
                    format!("{} balances", module),
                    format!("Failed to fetch {} balances: {}", module, e),
                ));
            }
        }
        self.status.set_status_of(section, Status::Loaded);
    }

    async fn module_balances_task(&self, module: Module) -> FolioResult<ModuleBalances> {
        let pending = self.api.fetch_module_balances(module).await?;
        let meta = TaskMeta::new(format!("Fetching {} balances", module))
            .with_field("module", module.as_str());
        let balances: TaskResult<ModuleBalances> = self
            .tasks
            .await_task(pending, TaskType::DefiModuleBalances, meta, false)
            .await?;
        Ok(balances.result)
    }

    /// Generic positions first, then every lending module concurrently
    pub async fn fetch_all_defi(&self, refresh: bool) {
        if !self.status.try_begin(self.status.section(), refresh) {
            return;
        }

        self.metadata.ensure_loaded().await;
        self.fetch_defi_balances(refresh).await;
        self.status.set_status(Status::PartiallyLoaded);

        join_all(
            Module::LENDING
                .into_iter()
                .map(|module| self.fetch_module_balances(module, refresh)),
        )
        .await;

        self.status.set_status(Status::Loaded);
    }

    // ========================================================================
    // DERIVED
    // ========================================================================

    pub fn overview(&self) -> Vec<DefiProtocolSummary> {
        let all = self.all_protocols.get();
        let modules = self.module_balances.get();
        let section_status = |section: Section| self.status.get_status_of(section);
        let identifier_by_name = |name: &str| self.metadata.get_defi_identifier_by_name(name);

        build_overview(&OverviewSource {
            all_protocols: &all,
            module_balances: &modules,
            overview_status: self.status.get_status(),
            section_status: &section_status,
            identifier_by_name: &identifier_by_name,
        })
    }

    /// Accounts with module positions, limited to `protocols` unless empty
    pub fn defi_accounts(&self, protocols: &[DefiProtocol]) -> Vec<DefiAccount> {
        let mut accounts: BTreeMap<String, Vec<DefiProtocol>> = BTreeMap::new();
        self.module_balances.with(|modules| {
            for (module, balances) in modules {
                let Some(protocol) = module.protocol() else {
                    continue;
                };
                if !protocols.is_empty() && !protocols.contains(&protocol) {
                    continue;
                }
                for address in balances.keys() {
                    accounts.entry(address.clone()).or_default().push(protocol);
                }
            }
        });

        accounts
            .into_iter()
            .map(|(address, protocols)| DefiAccount { address, protocols })
            .collect()
    }

    // ========================================================================
    // RESET
    // ========================================================================

    pub fn reset_module(&self, target: ResetTarget) {
        let modules: Vec<Module> = match target {
            ResetTarget::Module(module) => vec![module],
            ResetTarget::AllModules => Module::ALL.to_vec(),
            ResetTarget::AllDecentralizedExchanges => Module::DECENTRALIZED_EXCHANGES.to_vec(),
        };

        self.module_balances.update(|balances| {
            for module in &modules {
                balances.remove(module);
            }
        });
        for module in modules {
            if let Some(section) = module.section() {
                self.status.reset_status_of(section);
            }
        }
    }

    pub fn reset(&self) {
        logger::info(LogTag::Defi, "Resetting DeFi state");
        self.all_protocols.set(AllDefiProtocols::new());
        self.reset_module(ResetTarget::AllModules);
        self.status.reset_status_of(Section::DefiBalances);
        self.status.reset_status();
    }

    /// Losing premium drops everything fetched so far
    pub fn set_premium(&self, premium: bool) {
        let was = self.premium.swap(premium, Ordering::SeqCst);
        if was && !premium {
            self.reset();
        }
    }

    pub fn is_premium(&self) -> bool {
        self.premium.load(Ordering::SeqCst)
    }
}
