/// DeFi protocol, module and balance types
use crate::balances::Balance;
use crate::status::Section;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Protocols the overview knows how to summarize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefiProtocol {
    MakerdaoDsr,
    MakerdaoVaults,
    Aave,
    Compound,
    YearnVaults,
    YearnVaultsV2,
    Uniswap,
    Liquity,
}

impl DefiProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefiProtocol::MakerdaoDsr => "makerdao_dsr",
            DefiProtocol::MakerdaoVaults => "makerdao_vaults",
            DefiProtocol::Aave => "aave",
            DefiProtocol::Compound => "compound",
            DefiProtocol::YearnVaults => "yearn_vaults",
            DefiProtocol::YearnVaultsV2 => "yearn_vaults_v2",
            DefiProtocol::Uniswap => "uniswap",
            DefiProtocol::Liquity => "liquity",
        }
    }
}

impl fmt::Display for DefiProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend modules with balances of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    MakerdaoDsr,
    MakerdaoVaults,
    Aave,
    Compound,
    #[serde(rename = "yearn_vaults")]
    Yearn,
    #[serde(rename = "yearn_vaults_v2")]
    YearnV2,
    Uniswap,
    Sushiswap,
    Balancer,
    Liquity,
}

impl Module {
    pub const ALL: [Module; 10] = [
        Module::MakerdaoDsr,
        Module::MakerdaoVaults,
        Module::Aave,
        Module::Compound,
        Module::Yearn,
        Module::YearnV2,
        Module::Uniswap,
        Module::Sushiswap,
        Module::Balancer,
        Module::Liquity,
    ];

    pub const DECENTRALIZED_EXCHANGES: [Module; 3] =
        [Module::Uniswap, Module::Sushiswap, Module::Balancer];

    /// Modules fetched as part of a full DeFi refresh
    pub const LENDING: [Module; 7] = [
        Module::Aave,
        Module::MakerdaoDsr,
        Module::MakerdaoVaults,
        Module::Compound,
        Module::Yearn,
        Module::YearnV2,
        Module::Liquity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::MakerdaoDsr => "makerdao_dsr",
            Module::MakerdaoVaults => "makerdao_vaults",
            Module::Aave => "aave",
            Module::Compound => "compound",
            Module::Yearn => "yearn_vaults",
            Module::YearnV2 => "yearn_vaults_v2",
            Module::Uniswap => "uniswap",
            Module::Sushiswap => "sushiswap",
            Module::Balancer => "balancer",
            Module::Liquity => "liquity",
        }
    }

    pub fn parse(value: &str) -> Option<Module> {
        Module::ALL.into_iter().find(|m| m.as_str() == value)
    }

    /// Endpoint path below `/blockchains/ETH/modules/`
    pub fn balances_path(&self) -> &'static str {
        match self {
            Module::MakerdaoDsr => "makerdao/dsrbalance",
            Module::MakerdaoVaults => "makerdao/vaults",
            Module::Aave => "aave/balances",
            Module::Compound => "compound/balances",
            Module::Yearn => "yearn/vaults/balances",
            Module::YearnV2 => "yearn/vaultsv2/balances",
            Module::Uniswap => "uniswap/v2/balances",
            Module::Sushiswap => "sushiswap/balances",
            Module::Balancer => "balancer/balances",
            Module::Liquity => "liquity/balances",
        }
    }

    pub fn protocol(&self) -> Option<DefiProtocol> {
        match self {
            Module::MakerdaoDsr => Some(DefiProtocol::MakerdaoDsr),
            Module::MakerdaoVaults => Some(DefiProtocol::MakerdaoVaults),
            Module::Aave => Some(DefiProtocol::Aave),
            Module::Compound => Some(DefiProtocol::Compound),
            Module::Yearn => Some(DefiProtocol::YearnVaults),
            Module::YearnV2 => Some(DefiProtocol::YearnVaultsV2),
            Module::Uniswap => Some(DefiProtocol::Uniswap),
            Module::Liquity => Some(DefiProtocol::Liquity),
            Module::Sushiswap | Module::Balancer => None,
        }
    }

    /// Status section tracking this module's balances
    pub fn section(&self) -> Option<Section> {
        match self {
            Module::MakerdaoDsr => Some(Section::DefiDsrBalances),
            Module::MakerdaoVaults => Some(Section::DefiMakerdaoVaults),
            Module::Aave => Some(Section::DefiAaveBalances),
            Module::Compound => Some(Section::DefiCompoundBalances),
            Module::Yearn => Some(Section::DefiYearnVaultsBalances),
            Module::YearnV2 => Some(Section::DefiYearnVaultsV2Balances),
            Module::Liquity => Some(Section::DefiLiquityBalances),
            Module::Uniswap | Module::Sushiswap | Module::Balancer => None,
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a reset applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    Module(Module),
    AllModules,
    AllDecentralizedExchanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum BalanceType {
    Asset,
    Debt,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BaseDefiBalance {
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProtocolInfo {
    pub name: String,
}

/// One position of an address as reported by the generic DeFi endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefiProtocolData {
    pub protocol: ProtocolInfo,
    pub balance_type: BalanceType,
    pub base_balance: BaseDefiBalance,
    #[serde(default)]
    pub underlying_balances: Vec<BaseDefiBalance>,
}

/// address -> positions
pub type AllDefiProtocols = BTreeMap<String, Vec<DefiProtocolData>>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LendingPosition {
    pub asset: String,
    pub balance: Balance,
}

/// Per-address positions of one module, grouped by role
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct AccountPositions {
    #[serde(default)]
    pub deposits: Vec<LendingPosition>,
    #[serde(default)]
    pub collateral: Vec<LendingPosition>,
    #[serde(default)]
    pub debt: Vec<LendingPosition>,
}

/// address -> positions, result of a module balances task
pub type ModuleBalances = BTreeMap<String, AccountPositions>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProtocolMetadata {
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub token_name: String,
    pub token_symbol: String,
}

/// One row of the DeFi overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefiProtocolSummary {
    pub protocol: String,
    pub token_info: Option<TokenInfo>,
    pub assets: Vec<BaseDefiBalance>,
    pub deposits: bool,
    pub liabilities: bool,
    pub deposits_url: Option<String>,
    pub liabilities_url: Option<String>,
    pub balance_usd: Option<BigDecimal>,
    pub total_collateral_usd: BigDecimal,
    pub total_debt_usd: BigDecimal,
    pub total_lending_deposit_usd: BigDecimal,
}

impl DefiProtocolSummary {
    pub fn should_show(&self) -> bool {
        let zero = BigDecimal::from(0);
        self.total_lending_deposit_usd > zero
            || self.total_debt_usd > zero
            || self.balance_usd.as_ref().map_or(false, |b| *b > zero)
            || self.total_collateral_usd > zero
    }
}
