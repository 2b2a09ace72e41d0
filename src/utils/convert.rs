use anyhow::Result;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Convert a string to a Pubkey
pub fn pubkey_from_str(pubkey_str: &str) -> Result<Pubkey> {
    Ok(Pubkey::from_str(pubkey_str.trim())?)
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Convert a raw token amount to UI units
pub fn amount_to_ui(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

/// Convert UI units to a raw token amount, rounding to the nearest unit
pub fn ui_to_amount(ui_amount: f64, decimals: u8) -> u64 {
    (ui_amount * 10f64.powi(decimals as i32)).round() as u64
}

/// Scale whole tokens to a raw amount; `None` when it does not fit in a u64
pub fn whole_to_amount(whole: u64, decimals: u8) -> Option<u64> {
    10u64
        .checked_pow(decimals as u32)
        .and_then(|scale| whole.checked_mul(scale))
}
