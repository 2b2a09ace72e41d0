use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::MAX_DECIMALS;

/// Configuration for the token launchpad
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Solana RPC URL
    pub rpc_url: String,
    /// Wallet keypair path
    pub keypair_path: String,
    /// sqlx connection string for local state
    pub database_url: String,
    /// Quote endpoint; `{id}` is replaced by the provider's asset id
    pub price_api_url: String,
    /// Asset tracked by the price cache
    pub price_symbol: String,
    /// How long a cached quote is trusted (in minutes)
    pub price_freshness_minutes: i64,
    /// Receives the launch fee
    #[serde(with = "optional_pubkey")]
    pub platform_treasury: Option<Pubkey>,
    /// Receives the withdrawal tip
    #[serde(with = "optional_pubkey")]
    pub tip_treasury: Option<Pubkey>,
    pub platform_fee_lamports: u64,
    pub withdraw_tip_lamports: u64,
    /// Headroom kept on top of fees for network costs
    pub fee_margin_lamports: u64,
    /// Charged by the pool program on `initialize`
    pub pool_creation_fee_lamports: u64,
    pub token_decimals: u8,
    pub confirm_timeout_seconds: u64,
    pub confirm_poll_millis: u64,
    pub reconcile_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            keypair_path: "wallet-keypair.json".to_string(),
            database_url: "sqlite:launchpad.db".to_string(),
            price_api_url: "https://api.coingecko.com/api/v3/simple/price?ids={id}&vs_currencies=usd"
                .to_string(),
            price_symbol: "SOL".to_string(),
            price_freshness_minutes: 30,
            platform_treasury: None,
            tip_treasury: None,
            platform_fee_lamports: 100_000_000, // 0.1 SOL
            withdraw_tip_lamports: 5_000_000,   // 0.005 SOL
            fee_margin_lamports: 10_000_000,
            pool_creation_fee_lamports: 150_000_000,
            token_decimals: 6,
            confirm_timeout_seconds: 60,
            confirm_poll_millis: 1_000,
            reconcile_interval_seconds: 60,
        }
    }
}

/// Fees charged by the launch flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchFees {
    pub treasury: Pubkey,
    pub platform_fee_lamports: u64,
    pub margin_lamports: u64,
}

/// Fees charged by the withdraw flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawFees {
    pub treasury: Pubkey,
    pub tip_lamports: u64,
    pub margin_lamports: u64,
}

/// Costs of creating and seeding a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedFees {
    pub creation_fee_lamports: u64,
    pub margin_lamports: u64,
}

impl Config {
    pub fn launch_fees(&self) -> Result<LaunchFees> {
        let treasury = self
            .platform_treasury
            .ok_or_else(|| Error::Config("PLATFORM_TREASURY is not set".to_string()))?;
        Ok(LaunchFees {
            treasury,
            platform_fee_lamports: self.platform_fee_lamports,
            margin_lamports: self.fee_margin_lamports,
        })
    }

    pub fn withdraw_fees(&self) -> Result<WithdrawFees> {
        let treasury = self
            .tip_treasury
            .ok_or_else(|| Error::Config("TIP_TREASURY is not set".to_string()))?;
        if Some(treasury) == self.platform_treasury {
            return Err(Error::Config(
                "TIP_TREASURY must differ from PLATFORM_TREASURY".to_string(),
            ));
        }
        Ok(WithdrawFees {
            treasury,
            tip_lamports: self.withdraw_tip_lamports,
            margin_lamports: self.fee_margin_lamports,
        })
    }

    pub fn seed_fees(&self) -> SeedFees {
        SeedFees {
            creation_fee_lamports: self.pool_creation_fee_lamports,
            margin_lamports: self.fee_margin_lamports,
        }
    }

    /// Reject values that would break amount scaling later
    pub fn validate(&self) -> Result<()> {
        if self.token_decimals > MAX_DECIMALS {
            return Err(Error::Config(format!(
                "TOKEN_DECIMALS must be at most {}, got {}",
                MAX_DECIMALS, self.token_decimals
            )));
        }
        Ok(())
    }

    pub fn price_freshness(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.price_freshness_minutes)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_seconds)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_millis)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds)
    }
}

/// Loads configuration from environment variables, falling back to default values
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Ok(rpc_url) = env::var("RPC_URL") {
        config.rpc_url = rpc_url;
    }

    if let Ok(keypair_path) = env::var("KEYPAIR_PATH") {
        config.keypair_path = keypair_path;
    }

    if let Ok(database_url) = env::var("DATABASE_URL") {
        config.database_url = database_url;
    }

    if let Ok(price_api_url) = env::var("PRICE_API_URL") {
        config.price_api_url = price_api_url;
    }

    if let Ok(symbol) = env::var("PRICE_SYMBOL") {
        config.price_symbol = symbol.to_uppercase();
    }

    config.platform_treasury = pubkey_var("PLATFORM_TREASURY")?;
    config.tip_treasury = pubkey_var("TIP_TREASURY")?;

    parse_var("PRICE_FRESHNESS_MINUTES", &mut config.price_freshness_minutes);
    parse_var("PLATFORM_FEE_LAMPORTS", &mut config.platform_fee_lamports);
    parse_var("WITHDRAW_TIP_LAMPORTS", &mut config.withdraw_tip_lamports);
    parse_var("FEE_MARGIN_LAMPORTS", &mut config.fee_margin_lamports);
    parse_var("POOL_CREATION_FEE_LAMPORTS", &mut config.pool_creation_fee_lamports);
    parse_var("TOKEN_DECIMALS", &mut config.token_decimals);
    parse_var("CONFIRM_TIMEOUT_SECONDS", &mut config.confirm_timeout_seconds);
    parse_var("CONFIRM_POLL_MILLIS", &mut config.confirm_poll_millis);
    parse_var("RECONCILE_INTERVAL_SECONDS", &mut config.reconcile_interval_seconds);

    config.validate()?;
    Ok(config)
}

/// Overwrite `slot` when the variable is set and parses; otherwise keep the default
fn parse_var<T: FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = env::var(name) {
        if let Ok(value) = raw.trim().parse::<T>() {
            *slot = value;
        }
    }
}

fn pubkey_var(name: &str) -> Result<Option<Pubkey>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => Pubkey::from_str(raw.trim())
            .map(Some)
            .map_err(|e| Error::Config(format!("{} is not a valid address: {}", name, e))),
        _ => Ok(None),
    }
}

mod optional_pubkey {
    use serde::{Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(key) => serializer.serialize_some(&key.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Pubkey>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| Pubkey::from_str(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
