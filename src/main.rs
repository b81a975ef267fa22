use accounts::AccountRegistry;
use anyhow::{Context, bail};
use api_client::BitmexClient;
use clap::Parser;
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use configuration::Config;
use core_types::{Account, Action, Credentials, OrderRequest, Payload};
use engine::{CancelHandle, DispatchEngine, DispatchReport, Monitor};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;

mod cli;
mod render;

use cli::{AccountsCommand, Cli, Commands};

/// The main entry point for the tandem multi-account trading client.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials and TANDEM__* overrides may live in a .env file.
    dotenvy::dotenv().ok();

    let Cli {
        config: config_path,
        selected,
        command,
    } = Cli::parse();

    let config = configuration::load_config(config_path.as_deref())
        .context("Failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&config.logging)?;

    let accounts_file = config.registry.accounts_file.clone();
    let mut registry = AccountRegistry::open(&accounts_file)
        .with_context(|| format!("Failed to open {}", accounts_file.display()))?;

    match command {
        Commands::Accounts(command) => handle_accounts(command, &mut registry, &accounts_file),
        command => {
            let targets = select_accounts(&registry, &selected)?;
            handle_trading(command, &config, targets).await
        }
    }
}

// ==============================================================================
// Account Management
// ==============================================================================

fn handle_accounts(
    command: AccountsCommand,
    registry: &mut AccountRegistry,
    accounts_file: &Path,
) -> anyhow::Result<()> {
    match command {
        AccountsCommand::List => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["Account", "API key", "Host"]);
            for account in registry.list_accounts() {
                table.add_row(vec![
                    account.label.as_str(),
                    account.credentials.key.as_str(),
                    account.credentials.host.as_str(),
                ]);
            }
            println!("{table}");
        }
        AccountsCommand::Add {
            label,
            key,
            secret,
            host,
        } => {
            let mut credentials = Credentials::new(key, secret);
            if let Some(host) = host {
                credentials = credentials.with_host(host);
            }
            registry.add(label, credentials)?;
            registry.save(accounts_file)?;
        }
        AccountsCommand::Remove { label } => {
            registry.remove(&label)?;
            registry.save(accounts_file)?;
        }
    }
    Ok(())
}

fn select_accounts(
    registry: &AccountRegistry,
    selected: &[String],
) -> anyhow::Result<Vec<Arc<Account>>> {
    if registry.is_empty() {
        bail!("No accounts registered; add one with `tandem accounts add`");
    }
    if selected.is_empty() {
        Ok(registry.list_accounts().to_vec())
    } else {
        Ok(registry.select(selected)?)
    }
}

// ==============================================================================
// Trading Commands
// ==============================================================================

async fn handle_trading(
    command: Commands,
    config: &Config,
    targets: Vec<Arc<Account>>,
) -> anyhow::Result<()> {
    let client = BitmexClient::new(&config.exchange)?;
    let engine = Arc::new(DispatchEngine::new(Arc::new(client), &config.dispatch));

    // Ctrl-C stops everything that has not been sent yet.
    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling requests not yet sent.");
            on_interrupt.signal();
        }
    });

    let action = match command {
        Commands::Accounts(_) => bail!("account commands do not dispatch to the exchange"),
        Commands::Order(args) => {
            let entry = args.to_action();
            let template = match &entry {
                Action::PlaceOrder(order) => order,
                Action::PlaceRelativeOrder(relative) => &relative.order,
                _ => bail!("order arguments produced a non-order action"),
            };
            let stop = args
                .stop_loss
                .map(|price| template.protective_stop(price, args.stop_loss_trigger.into()));
            // Check the stop before anything is placed; its size comes from each entry.
            if let Some(stop) = &stop {
                stop.validate_terms().context("Invalid stop-loss")?;
            }

            let report = run(&engine, entry, &targets, &cancel).await?;
            if let Some(stop) = stop {
                place_stop_loss(&engine, stop, &report, &cancel).await?;
            }
            return Ok(());
        }
        Commands::Cancel { order_id } => Action::CancelOrder { order_id },
        Commands::CancelAll { symbol } => Action::CancelAllOrders { symbol },
        Commands::Amend(args) => args.into(),
        Commands::Positions => Action::QueryPositions,
        Commands::Orders => Action::QueryOrders,
        Commands::Stops => Action::QueryStops,
        Commands::History { count } => Action::QueryHistory { count },
        Commands::Margin => Action::QueryMargin,
        Commands::Leverage { symbol, leverage } => Action::SetLeverage { symbol, leverage },
        Commands::RiskLimit { symbol, risk_limit } => Action::SetRiskLimit { symbol, risk_limit },
        Commands::TransferMargin { symbol, amount } => Action::TransferMargin { symbol, amount },
        Commands::WatchPositions => return watch_positions(engine, targets, cancel).await,
    };

    run(&engine, action, &targets, &cancel).await?;
    Ok(())
}

/// Validates, dispatches and prints one action.
async fn run(
    engine: &DispatchEngine,
    action: Action,
    targets: &[Arc<Account>],
    cancel: &CancelHandle,
) -> anyhow::Result<DispatchReport> {
    action.validate()?;
    let report = engine.dispatch(&action, targets, cancel).await?;
    println!("{}", render::report_table(&report));
    println!("{}", render::summary(&report));
    Ok(report)
}

/// Mirrors the entry with a reduce-only stop on the accounts whose entry
/// was accepted, each sized like that account's entry.
async fn place_stop_loss(
    engine: &DispatchEngine,
    stop: OrderRequest,
    entry: &DispatchReport,
    cancel: &CancelHandle,
) -> anyhow::Result<()> {
    if !entry.is_complete() {
        tracing::warn!("Entry was cancelled; no stop-loss placed.");
        return Ok(());
    }

    // One dispatch per distinct entry size, in account order.
    let mut groups: Vec<(Decimal, Vec<Arc<Account>>)> = Vec::new();
    for (account, payload) in entry.succeeded() {
        let quantity = match payload {
            Payload::Order(order) => order.quantity,
            _ => stop.quantity,
        };
        match groups.iter_mut().find(|(size, _)| *size == quantity) {
            Some((_, accounts)) => accounts.push(account.clone()),
            None => groups.push((quantity, vec![account.clone()])),
        }
    }
    if groups.is_empty() {
        tracing::warn!("No entry went through; no stop-loss placed.");
        return Ok(());
    }

    for (quantity, accounts) in groups {
        if cancel.is_signalled() {
            tracing::warn!("Cancelled; remaining stop-losses not placed.");
            break;
        }
        let action = Action::PlaceOrder(stop.clone().with_quantity(quantity));
        run(engine, action, &accounts, cancel).await?;
    }
    Ok(())
}

async fn watch_positions(
    engine: Arc<DispatchEngine>,
    targets: Vec<Arc<Account>>,
    cancel: CancelHandle,
) -> anyhow::Result<()> {
    let monitor = Monitor::new(engine, Action::QueryPositions, targets);
    let (mut reports, handle) = monitor.spawn(cancel);

    while reports.changed().await.is_ok() {
        let latest = reports.borrow_and_update().clone();
        if let Some(report) = latest {
            println!("{}", render::report_table(&report));
            println!("{}", render::summary(&report));
        }
    }

    handle.await??;
    Ok(())
}
