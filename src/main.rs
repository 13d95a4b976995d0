use anyhow::{Context, Result};
use bigdecimal::{BigDecimal, RoundingMode};
use clap::{Parser, Subcommand};
use colored::Colorize;
use folio::{
    config::{load_config_from_path, CONFIG_FILE_PATH},
    history::TransactionRequestPayload,
    logger::{self as logger, LogLevel, LogTag, LoggerConfig},
    notifications::{Notification, Severity},
    session::Session,
    tasks::TaskBackend,
};
use std::path::PathBuf;

/// Command line client for a portfolio-tracking backend
#[derive(Parser, Debug)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Enable debug output for a log tag (`all` for every tag)
    #[arg(long = "debug", global = true, value_name = "TAG")]
    debug_tags: Vec<String>,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Lowest level to print, overriding --verbose
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Append log lines to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a page of EVM transactions
    Transactions {
        /// Query the chains again instead of reading the cache
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show a page of ledger actions
    LedgerActions {
        #[arg(long)]
        refresh: bool,
        /// Only refresh this exchange
        #[arg(long)]
        location: Option<String>,
    },
    /// Show the DeFi overview
    Defi {
        #[arg(long)]
        refresh: bool,
    },
    /// Detect tokens held by addresses on a chain
    DetectTokens {
        #[arg(long)]
        chain: String,
        /// Addresses to scan; every tracked address of the chain when empty
        addresses: Vec<String>,
    },
    /// Print the identicon data URI of an address
    Blockie { address: String },
    /// Delete cached transactions on the backend and fetch them again
    PurgeTransactions,
    /// List backend tasks
    Tasks,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logger_config = LoggerConfig::from_flags(&cli.debug_tags, cli.verbose);
    if let Some(level) = cli.log_level {
        logger_config.min_level = level;
    }
    logger_config.file_path = cli.log_file.clone();
    logger::init(logger_config);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            logger::error(LogTag::System, &format!("{:#}", e));
            1
        }
    };

    logger::flush();
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config_from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let session = Session::new(&config).context("creating session")?;
    session.initialize().await;

    // =========================================================================
    // COMMANDS
    // =========================================================================

    match cli.command {
        Command::Transactions {
            refresh,
            limit,
            offset,
        } => {
            let payload = TransactionRequestPayload {
                limit: limit.unwrap_or(config.history.default_limit),
                offset,
                ..session.transactions.payload()
            };
            if !session.transactions.update_payload(payload).await || refresh {
                session.transactions.fetch_transactions(refresh).await;
            }

            let collection = session.transactions.transactions();
            println!(
                "{} {} of {}",
                "Transactions".bold(),
                collection.data.len(),
                collection.found
            );
            for entry in &collection.data {
                println!(
                    "  {} {:<10} {} {}",
                    entry.timestamp,
                    entry.evm_chain,
                    entry.tx_hash.cyan(),
                    entry.from_address.dimmed()
                );
            }
        }
        Command::LedgerActions { refresh, location } => {
            if let Some(location) = location {
                session.purge.purge_history_location(&location).await;
            }
            session.ledger_actions.fetch_ledger_actions(refresh, None).await;

            let collection = session.ledger_actions.ledger_actions();
            println!(
                "{} {} of {}",
                "Ledger actions".bold(),
                collection.data.len(),
                collection.found
            );
            for entry in &collection.data {
                let action = &entry.action;
                println!(
                    "  #{} {} {:<10} {:<10} {} {}",
                    entry.identifier,
                    action.timestamp,
                    action.location,
                    action.action_type,
                    action.amount,
                    action.asset.yellow()
                );
            }
        }
        Command::Defi { refresh } => {
            session.defi.fetch_all_defi(refresh).await;

            println!("{}", "DeFi overview".bold());
            for row in session.defi.overview() {
                let balance = row
                    .balance_usd
                    .as_ref()
                    .map(usd)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<24} balance {:>14} deposits {:>14} collateral {:>14} debt {:>14}",
                    row.protocol.cyan(),
                    balance,
                    usd(&row.total_lending_deposit_usd),
                    usd(&row.total_collateral_usd),
                    usd(&row.total_debt_usd)
                );
            }
        }
        Command::DetectTokens { chain, addresses } => {
            let detection = session.token_detection(&chain, None);
            if addresses.is_empty() {
                detection.detect_tokens_of_all_addresses().await?;
            } else {
                detection.detect_tokens(&addresses).await?;
            }

            let targets = if addresses.is_empty() {
                session.accounts.addresses(&chain)
            } else {
                addresses
            };
            for address in targets {
                let info = session.tokens.detected_info(&chain, &address);
                println!(
                    "  {} {} tokens: {}",
                    address.cyan(),
                    info.total,
                    info.tokens.join(", ")
                );
            }
        }
        Command::Blockie { address } => match session.blockies.get_async(&address).await {
            Some(blockie) => println!("{}", blockie.data_uri()),
            None => println!("{}", "no identicon for an empty address".dimmed()),
        },
        Command::PurgeTransactions => {
            let client = session
                .client
                .clone()
                .context("purging needs a backend connection")?;
            if client.delete_transactions().await? {
                logger::info(LogTag::Transactions, "Backend transactions deleted");
                session.purge.purge_transactions().await;
            } else {
                logger::warning(LogTag::Transactions, "Backend refused to delete transactions");
            }
        }
        Command::Tasks => {
            let client = session
                .client
                .clone()
                .context("listing tasks needs a backend connection")?;
            let ids = client.task_ids().await?;
            println!("{}", "Tasks".bold());
            for id in &ids.pending {
                println!("  {} {}", id, "pending".yellow());
            }
            for id in &ids.completed {
                println!("  {} {}", id, "completed".green());
            }
        }
    }

    print_notifications(&session.notifications.notifications());
    Ok(())
}

fn usd(value: &BigDecimal) -> String {
    format!("${}", value.with_scale_round(2, RoundingMode::HalfEven))
}

fn print_notifications(notifications: &[Notification]) {
    for notification in notifications {
        let title = match notification.severity {
            Severity::Error => notification.title.red().bold(),
            Severity::Warning => notification.title.yellow().bold(),
            Severity::Info => notification.title.normal(),
        };
        eprintln!("{}: {}", title, notification.message);
    }
}
