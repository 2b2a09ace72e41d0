use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::utils::amount_to_ui;

/// A pool-creation transaction we submitted, waiting to be matched to its pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolCandidate {
    pub originating_tx: String,
    /// Unset until reconciliation finds it
    pub pool_id: Option<Pubkey>,
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub symbol_a: String,
    pub symbol_b: String,
    pub created_at: DateTime<Utc>,
}

impl PoolCandidate {
    pub fn new(
        originating_tx: String,
        token_a: Pubkey,
        symbol_a: String,
        token_b: Pubkey,
        symbol_b: String,
    ) -> Self {
        Self {
            originating_tx,
            pool_id: None,
            token_a,
            token_b,
            symbol_a,
            symbol_b,
            created_at: Utc::now(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.pool_id.is_some()
    }
}

/// Live view of a pool, rebuilt on every reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub pool_id: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    /// Vault balances net of accrued protocol and fund fees
    pub vault_reserve_a: u64,
    pub vault_reserve_b: u64,
    pub lp_mint: Pubkey,
    pub lp_decimals: u8,
    pub mint_decimals_a: u8,
    pub mint_decimals_b: u8,
    pub lp_supply: u64,
    pub caller_lp_balance: u64,
}

impl PoolState {
    pub fn has_stake(&self) -> bool {
        self.caller_lp_balance > 0
    }

    /// Reserve of `mint` in UI units, if the pool trades it
    pub fn ui_reserve_of(&self, mint: &Pubkey) -> Option<f64> {
        if *mint == self.mint_a {
            Some(amount_to_ui(self.vault_reserve_a, self.mint_decimals_a))
        } else if *mint == self.mint_b {
            Some(amount_to_ui(self.vault_reserve_b, self.mint_decimals_b))
        } else {
            None
        }
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        *mint == self.mint_a || *mint == self.mint_b
    }
}

/// Accounts needed to build instructions against a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolKeys {
    pub pool_id: Pubkey,
    pub program_id: Pubkey,
    pub authority: Pubkey,
    pub amm_config: Pubkey,
    pub vault_a: Pubkey,
    pub vault_b: Pubkey,
    pub token_program_a: Pubkey,
    pub token_program_b: Pubkey,
    pub lp_mint: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
}

/// A pool freshly read from chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivePool {
    pub state: PoolState,
    pub keys: PoolKeys,
}

/// Counter-asset reserve recorded when the pool was created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineAmount {
    /// The launched token
    pub custom_mint: Pubkey,
    /// The side the baseline is denominated in, usually wrapped SOL
    pub reference_mint: Pubkey,
    pub reference_symbol: String,
    pub amount: f64,
    pub captured_at: DateTime<Utc>,
}

impl BaselineAmount {
    /// Whether this baseline describes a pool trading exactly these two mints
    pub fn matches(&self, state: &PoolState) -> bool {
        state.contains(&self.custom_mint)
            && state.contains(&self.reference_mint)
            && self.custom_mint != self.reference_mint
    }
}
