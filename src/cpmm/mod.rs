//! Raydium constant-product pool program: account layout, addresses and
//! the two instructions the launchpad issues (`initialize`, `withdraw`).

pub mod instructions;
mod layout;

pub use instructions::{initialize_instruction, withdraw_instruction, InitializeAccounts};
pub use layout::{
    attach_vault_amounts, decode_pool_batch, token_account_amount, vault_keys, DecodedPool,
    PoolBatchEntry, PoolDecode,
};

use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

pub const PROGRAM_ID: Pubkey = pubkey!("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C");

/// Fee tier 0 (0.25%)
pub const DEFAULT_AMM_CONFIG: Pubkey = pubkey!("D4FPEruKEHrG5TenZ2mpDGEfu1iUvTiqBxvpU8HLBvC2");

/// Receives the pool creation fee
pub const CREATE_POOL_FEE_RECEIVER: Pubkey = pubkey!("DNXgeM9EiiaAbaWvwjHj9fQQLAX5ZsfHyvmYUNRAdNC8");

pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
pub const MEMO_PROGRAM_ID: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Size of the pool state account, discriminator included
pub const POOL_STATE_LEN: usize = 637;
pub const POOL_STATE_DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];

const AUTH_SEED: &[u8] = b"vault_and_lp_mint_auth_seed";
const POOL_SEED: &[u8] = b"pool";
const POOL_LP_MINT_SEED: &[u8] = b"pool_lp_mint";
const POOL_VAULT_SEED: &[u8] = b"pool_vault";
const OBSERVATION_SEED: &[u8] = b"observation";

/// Signs for vaults and the LP mint of every pool
pub fn pool_authority() -> Pubkey {
    Pubkey::find_program_address(&[AUTH_SEED], &PROGRAM_ID).0
}

pub fn pool_address(amm_config: &Pubkey, mint_0: &Pubkey, mint_1: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[POOL_SEED, amm_config.as_ref(), mint_0.as_ref(), mint_1.as_ref()],
        &PROGRAM_ID,
    )
    .0
}

pub fn lp_mint_address(pool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[POOL_LP_MINT_SEED, pool.as_ref()], &PROGRAM_ID).0
}

pub fn vault_address(pool: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[POOL_VAULT_SEED, pool.as_ref(), mint.as_ref()], &PROGRAM_ID).0
}

pub fn observation_address(pool: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[OBSERVATION_SEED, pool.as_ref()], &PROGRAM_ID).0
}

/// The program requires `token_0 < token_1` by byte order
pub fn sort_mints(a: Pubkey, b: Pubkey) -> (Pubkey, Pubkey, bool) {
    if a.to_bytes() < b.to_bytes() {
        (a, b, false)
    } else {
        (b, a, true)
    }
}
