/// DeFi overview rows built from generic positions and module balances
///
/// Positions reported by the generic endpoint are grouped per protocol name.
/// Protocols with a dedicated module are summarized from that module's
/// balances instead, but only once the module section has data.
use super::types::{
    AllDefiProtocols, BalanceType, DefiProtocol, DefiProtocolData, DefiProtocolSummary,
    LendingPosition, Module, ModuleBalances, TokenInfo,
};
use crate::status::{Section, Status};
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;

/// Token name shown when a protocol holds more than one token
pub const MULTIPLE_ASSETS: &str = "Multiple assets";

/// Metadata name the Yearn v2 summary is looked up under
pub const YEARN_V2_NAME: &str = "yearn_finance_vaults_v2";

/// Protocol with a dedicated module and summary rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListedProtocol {
    pub protocol: DefiProtocol,
    pub section: Section,
    pub no_liabilities: bool,
    pub no_deposits: bool,
}

/// Protocol identifier -> summary rule
const LISTED_PROTOCOLS: [(&str, ListedProtocol); 4] = [
    (
        "aave",
        ListedProtocol {
            protocol: DefiProtocol::Aave,
            section: Section::DefiAaveBalances,
            no_liabilities: false,
            no_deposits: false,
        },
    ),
    (
        "compound",
        ListedProtocol {
            protocol: DefiProtocol::Compound,
            section: Section::DefiCompoundBalances,
            no_liabilities: false,
            no_deposits: false,
        },
    ),
    (
        "yearn_finance_vaults",
        ListedProtocol {
            protocol: DefiProtocol::YearnVaults,
            section: Section::DefiYearnVaultsBalances,
            no_liabilities: true,
            no_deposits: false,
        },
    ),
    (
        "liquity",
        ListedProtocol {
            protocol: DefiProtocol::Liquity,
            section: Section::DefiLiquityBalances,
            no_liabilities: false,
            no_deposits: true,
        },
    ),
];

const YEARN_V2: ListedProtocol = ListedProtocol {
    protocol: DefiProtocol::YearnVaultsV2,
    section: Section::DefiYearnVaultsV2Balances,
    no_liabilities: true,
    no_deposits: false,
};

/// How a position's protocol is summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEntry {
    Listed(ListedProtocol),
    Generic,
}

pub fn classify(protocol_id: &str) -> ProtocolEntry {
    LISTED_PROTOCOLS
        .iter()
        .find(|(id, _)| *id == protocol_id)
        .map(|(_, listed)| ProtocolEntry::Listed(*listed))
        .unwrap_or(ProtocolEntry::Generic)
}

/// Everything the overview reads
pub struct OverviewSource<'a> {
    pub all_protocols: &'a AllDefiProtocols,
    pub module_balances: &'a BTreeMap<Module, ModuleBalances>,
    pub overview_status: Status,
    pub section_status: &'a dyn Fn(Section) -> Status,
    pub identifier_by_name: &'a dyn Fn(&str) -> String,
}

impl OverviewSource<'_> {
    fn balances_of(&self, protocol: DefiProtocol) -> Option<&ModuleBalances> {
        Module::ALL
            .into_iter()
            .find(|module| module.protocol() == Some(protocol))
            .and_then(|module| self.module_balances.get(&module))
    }

    /// (total collateral, total debt) in USD
    fn loan_summary(&self, protocol: DefiProtocol) -> (BigDecimal, BigDecimal) {
        let Some(balances) = self.balances_of(protocol) else {
            return (zero(), zero());
        };
        (
            usd_total(balances.values().flat_map(|account| account.collateral.iter())),
            usd_total(balances.values().flat_map(|account| account.debt.iter())),
        )
    }

    fn total_lending_deposit(&self, protocol: DefiProtocol) -> BigDecimal {
        self.balances_of(protocol)
            .map(|balances| usd_total(balances.values().flat_map(|account| account.deposits.iter())))
            .unwrap_or_else(zero)
    }

    /// Summary of a listed protocol, `None` until its section has data
    fn protocol_summary(&self, listed: ListedProtocol, defi_id: &str) -> Option<DefiProtocolSummary> {
        if !(self.section_status)(listed.section).is_settled_or_refreshing() {
            return None;
        }

        let (total_collateral_usd, total_debt_usd) = if listed.no_liabilities {
            (zero(), zero())
        } else {
            self.loan_summary(listed.protocol)
        };

        Some(DefiProtocolSummary {
            protocol: defi_id.to_string(),
            token_info: None,
            assets: Vec::new(),
            deposits: !listed.no_deposits,
            liabilities: !listed.no_liabilities,
            deposits_url: (!listed.no_deposits)
                .then(|| format!("/defi/deposits?protocol={}", listed.protocol)),
            liabilities_url: (!listed.no_liabilities)
                .then(|| format!("/defi/liabilities?protocol={}", listed.protocol)),
            balance_usd: None,
            total_collateral_usd,
            total_debt_usd,
            total_lending_deposit_usd: if listed.no_deposits {
                zero()
            } else {
                self.total_lending_deposit(listed.protocol)
            },
        })
    }

    fn makerdao_summaries(&self) -> [DefiProtocolSummary; 2] {
        let dsr = DefiProtocolSummary {
            protocol: DefiProtocol::MakerdaoDsr.to_string(),
            token_info: None,
            assets: Vec::new(),
            deposits: true,
            liabilities: false,
            deposits_url: Some("/defi/deposits?protocol=makerdao".to_string()),
            liabilities_url: None,
            balance_usd: None,
            total_collateral_usd: zero(),
            total_debt_usd: zero(),
            total_lending_deposit_usd: self.total_lending_deposit(DefiProtocol::MakerdaoDsr),
        };

        let (total_collateral_usd, total_debt_usd) =
            self.loan_summary(DefiProtocol::MakerdaoVaults);
        let vaults = DefiProtocolSummary {
            protocol: DefiProtocol::MakerdaoVaults.to_string(),
            token_info: None,
            assets: Vec::new(),
            deposits: false,
            liabilities: true,
            deposits_url: None,
            liabilities_url: Some("/defi/liabilities?protocol=makerdao".to_string()),
            balance_usd: None,
            total_collateral_usd,
            total_debt_usd,
            total_lending_deposit_usd: zero(),
        };
        [dsr, vaults]
    }
}

/// Fold one generic position into its protocol's row
fn accumulate(row: &mut DefiProtocolSummary, entry: &DefiProtocolData) {
    let base = &entry.base_balance;
    match &mut row.token_info {
        Some(info) if info.token_name != base.token_name => {
            info.token_name = MULTIPLE_ASSETS.to_string();
            info.token_symbol = String::new();
        }
        _ => {}
    }

    if entry.balance_type != BalanceType::Asset {
        return;
    }
    row.balance_usd = Some(row.balance_usd.take().unwrap_or_else(zero) + &base.balance.usd_value);
    match row
        .assets
        .iter_mut()
        .find(|asset| asset.token_address == base.token_address)
    {
        Some(asset) => asset.balance = &asset.balance + &base.balance,
        None => row.assets.push(base.clone()),
    }
}

fn generic_row(protocol_id: String, entry: &DefiProtocolData) -> DefiProtocolSummary {
    DefiProtocolSummary {
        protocol: protocol_id,
        token_info: Some(TokenInfo {
            token_name: entry.base_balance.token_name.clone(),
            token_symbol: entry.base_balance.token_symbol.clone(),
        }),
        assets: Vec::new(),
        deposits: false,
        liabilities: false,
        deposits_url: None,
        liabilities_url: None,
        balance_usd: None,
        total_collateral_usd: zero(),
        total_debt_usd: zero(),
        total_lending_deposit_usd: zero(),
    }
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

fn usd_total<'a>(positions: impl Iterator<Item = &'a LendingPosition>) -> BigDecimal {
    positions.fold(zero(), |total, position| total + &position.balance.usd_value)
}

/// Overview rows sorted by protocol
pub fn build_overview(source: &OverviewSource<'_>) -> Vec<DefiProtocolSummary> {
    let mut rows: BTreeMap<String, DefiProtocolSummary> = BTreeMap::new();

    for entry in source.all_protocols.values().flatten() {
        let name = entry.protocol.name.as_str();
        let protocol_id = (source.identifier_by_name)(name);

        match classify(&protocol_id) {
            ProtocolEntry::Listed(listed) => {
                if let Some(summary) = source
                    .protocol_summary(listed, name)
                    .filter(DefiProtocolSummary::should_show)
                {
                    rows.insert(name.to_string(), summary);
                }
            }
            ProtocolEntry::Generic => match rows.get_mut(name) {
                Some(row) => accumulate(row, entry),
                None => {
                    let mut row = generic_row(protocol_id, entry);
                    accumulate(&mut row, entry);
                    rows.insert(name.to_string(), row);
                }
            },
        }
    }

    if source.overview_status.is_settled_or_refreshing() {
        for summary in source.makerdao_summaries() {
            if summary.should_show() {
                rows.insert(summary.protocol.clone(), summary);
            }
        }

        let yearn_v2_id = (source.identifier_by_name)(YEARN_V2_NAME);
        if let Some(summary) = source
            .protocol_summary(YEARN_V2, &yearn_v2_id)
            .filter(DefiProtocolSummary::should_show)
        {
            rows.insert(DefiProtocol::YearnVaultsV2.to_string(), summary);
        }
    }

    let mut overview: Vec<DefiProtocolSummary> = rows
        .into_values()
        .filter(|row| row.balance_usd.is_some() || row.deposits || row.liabilities)
        .collect();
    overview.sort_by(|a, b| a.protocol.cmp(&b.protocol));
    overview
}
