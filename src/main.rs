use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info, warn};
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;

use token_launchpad::builder::SeedPoolRequest;
use token_launchpad::config::{self, Config};
use token_launchpad::db::Database;
use token_launchpad::models::{LaunchOptions, MintIntent, MintOrigin};
use token_launchpad::reconcile::{ReconcileReport, ReconcileScheduler, ReconciliationEngine};
use token_launchpad::solana::{self, WalletSigner};
use token_launchpad::submission::Launchpad;
use token_launchpad::utils::{
    format_pubkey, format_signed, pubkey_from_str, sol_to_lamports, ui_to_amount,
    whole_to_amount,
};
use token_launchpad::valuation::{HttpQuoteProvider, PriceCache, PriceSource};
use token_launchpad::Error;

#[derive(Parser)]
#[command(name = "token-launchpad", version, about = "Launch SPL tokens and track the liquidity you seeded")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a token, mint its supply and attach metadata
    Launch {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        /// Off-chain metadata JSON uri
        #[arg(long)]
        uri: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Whole tokens; scaled by the configured decimals
        #[arg(long)]
        supply: u64,
        #[arg(long)]
        revoke_mint: bool,
        #[arg(long)]
        revoke_freeze: bool,
        /// Copy of a trending token; both authorities are revoked
        #[arg(long)]
        copied: bool,
    },
    /// Create a token/SOL pool
    SeedPool {
        #[arg(long)]
        mint: String,
        #[arg(long)]
        symbol: String,
        /// Tokens to deposit, in whole tokens
        #[arg(long)]
        tokens: f64,
        /// SOL to deposit
        #[arg(long)]
        sol: f64,
    },
    /// Show pools this wallet created and still holds liquidity in
    Pools,
    /// Withdraw part of your liquidity from a pool
    Withdraw {
        #[arg(long)]
        pool: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        percent: u8,
    },
    /// Show the cached reference price
    Price {
        /// Fail instead of showing an outdated quote
        #[arg(long)]
        strict: bool,
    },
    /// Keep waiting for a transaction that timed out
    Confirm { signature: String },
    /// Reconcile on an interval until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_logger();

    let cli = Cli::parse();

    let config = config::load_config().context("Failed to load configuration")?;
    info!("Configuration loaded");

    let client = Arc::new(solana::create_client_from_config(&config));

    // Verify connection by getting current slot
    match client.get_slot().await {
        Ok(slot) => info!("Current Solana slot: {} - RPC connection established", slot),
        Err(e) => {
            error!("Failed to connect to Solana RPC: {}", e);
            return Err(anyhow::anyhow!("Could not establish Solana RPC connection"));
        }
    }

    let wallet = Arc::new(
        solana::load_wallet_from_config(&config)
            .with_context(|| format!("Failed to load wallet from {}", config.keypair_path))?,
    );
    let owner = wallet
        .pubkey()
        .context("Wallet has no public key")?;
    info!("Wallet loaded with pubkey: {}", owner);

    let db = Arc::new(
        Database::new(&config.database_url)
            .await
            .context("Failed to open database")?,
    );

    match cli.command {
        Command::Launch {
            name,
            symbol,
            uri,
            description,
            supply,
            revoke_mint,
            revoke_freeze,
            copied,
        } => {
            let initial_supply = whole_to_amount(supply, config.token_decimals)
                .context("Supply overflows at the configured decimals")?;
            let intent = MintIntent {
                name,
                symbol,
                description,
                image_uri: uri,
                initial_supply,
                decimals: config.token_decimals,
                creator: owner,
                origin: if copied { MintOrigin::Copied } else { MintOrigin::Original },
            };
            let options = LaunchOptions {
                revoke_mint_authority: revoke_mint,
                revoke_freeze_authority: revoke_freeze,
            };

            let launchpad = Launchpad::new(client, wallet, db, config);
            let receipt = launchpad.launch(&intent, options).await.map_err(explain)?;
            println!("Mint:      {}", receipt.mint);
            println!("Signature: {}", receipt.signature);
        }

        Command::SeedPool {
            mint,
            symbol,
            tokens,
            sol,
        } => {
            let request = SeedPoolRequest {
                token_mint: pubkey_from_str(&mint)?,
                token_amount: ui_to_amount(tokens, config.token_decimals),
                sol_lamports: sol_to_lamports(sol),
            };
            let launchpad = Launchpad::new(client, wallet, db, config);
            let signature = launchpad.seed_pool(&request, &symbol).await.map_err(explain)?;
            println!("Pool created: {}", signature);
        }

        Command::Pools => {
            let prices = price_cache(&config, db.clone());
            let price = match prices.get_price().await {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!("Showing pools without USD values: {}", e);
                    None
                }
            };
            let engine = ReconciliationEngine::new(client, db);
            let report = engine.reconcile(&owner, price.as_ref()).await?;
            print_report(&report);
        }

        Command::Withdraw { pool, percent } => {
            let pool_id = pubkey_from_str(&pool)?;
            let launchpad = Launchpad::new(client, wallet, db, config);
            let signature = launchpad.withdraw(&pool_id, percent).await.map_err(explain)?;
            println!("Withdrawn: {}", signature);
        }

        Command::Price { strict } => {
            let reading = price_cache(&config, db).get_price().await?;
            let stale = reading.is_stale();
            let quote = if strict { reading.require_fresh()? } else { reading.quote };
            println!(
                "{}: ${:.4} (as of {}){}",
                quote.asset_symbol,
                quote.price_usd,
                quote.captured_at.format("%Y-%m-%d %H:%M UTC"),
                if stale { " [stale]" } else { "" }
            );
        }

        Command::Confirm { signature } => {
            let signature = Signature::from_str(&signature).context("Invalid signature")?;
            let launchpad = Launchpad::new(client, wallet, db, config);
            launchpad.confirm(&signature).await?;
            println!("Confirmed: {}", signature);
        }

        Command::Watch => {
            let prices: Arc<dyn PriceSource> = Arc::new(price_cache(&config, db.clone()));
            let engine = Arc::new(ReconciliationEngine::new(client, db));
            let scheduler =
                ReconcileScheduler::spawn(engine, Some(prices), owner, config.reconcile_interval());
            let mut reports = scheduler.reports();

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                    changed = reports.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let latest = reports.borrow().clone();
                        if let Some(report) = latest {
                            print_report(&report);
                        }
                    }
                }
            }

            scheduler.shutdown().await;
            info!("Shutting down...");
        }
    }

    Ok(())
}

fn price_cache(config: &Config, db: Arc<Database>) -> PriceCache<HttpQuoteProvider, Database> {
    PriceCache::new(
        HttpQuoteProvider::new(&config.price_api_url),
        db,
        &config.price_symbol,
        config.price_freshness(),
    )
}

fn print_report(report: &ReconcileReport) {
    if let Some(price) = &report.price {
        println!(
            "{} ${:.2}{}",
            price.quote.asset_symbol,
            price.quote.price_usd,
            if price.is_stale() { " [stale]" } else { "" }
        );
    }

    if report.views.is_empty() {
        println!("No pools with liquidity");
    }
    for view in &report.views {
        let state = &view.state;
        let pnl = match &view.pnl {
            Some(pnl) => format!(
                "{} {} ({}%){}",
                format_signed(pnl.delta, 4),
                view.baseline.as_ref().map_or("", |b| b.reference_symbol.as_str()),
                format_signed(pnl.percentage, 2),
                pnl.usd_delta
                    .map(|usd| format!(" {} USD", format_signed(usd, 2)))
                    .unwrap_or_default()
            ),
            None => "n/a".to_string(),
        };
        println!(
            "{}/{}  pool {}  lp {}  pnl {}",
            view.candidate.symbol_a,
            view.candidate.symbol_b,
            format_pubkey(&state.pool_id),
            state.caller_lp_balance,
            pnl
        );
    }

    let dropped = report.dropped();
    if dropped > 0 {
        println!("{} pool(s) could not be resolved this pass", dropped);
    }
}

/// Tell the user what to do next for failures they can recover from
fn explain(err: Error) -> anyhow::Error {
    if let Error::ConfirmationTimeout { signature } = err {
        let hint = format!("run `token-launchpad confirm {}` before retrying", signature);
        return anyhow::Error::new(err).context(hint);
    }
    if err.is_recoverable() {
        return anyhow::Error::new(err).context("The attempt can be retried");
    }
    err.into()
}

fn init_logger() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info")
    );
}
