use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::config::SeedFees;
use crate::cpmm::{initialize_instruction, sort_mints, InitializeAccounts, DEFAULT_AMM_CONFIG};
use crate::error::{Error, Result};

/// Deposit of a launched token against SOL into a new pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPoolRequest {
    pub token_mint: Pubkey,
    /// Raw token units
    pub token_amount: u64,
    pub sol_lamports: u64,
}

/// Wrap SOL, create the pool with both deposits, then unwrap what is left
pub fn seed_pool_instructions(creator: &Pubkey, request: &SeedPoolRequest) -> Result<Vec<Instruction>> {
    let native = spl_token::native_mint::id();
    if request.token_mint == native {
        return Err(Error::InvalidIntent("cannot pair SOL with itself".to_string()));
    }
    if request.token_amount == 0 || request.sol_lamports == 0 {
        return Err(Error::InvalidIntent("both pool deposits must be positive".to_string()));
    }

    let token_account = get_associated_token_address(creator, &request.token_mint);
    let wsol_account = get_associated_token_address(creator, &native);

    let (mint_0, mint_1, swapped) = sort_mints(request.token_mint, native);
    let (creator_token_0, creator_token_1, amount_0, amount_1) = if swapped {
        (wsol_account, token_account, request.sol_lamports, request.token_amount)
    } else {
        (token_account, wsol_account, request.token_amount, request.sol_lamports)
    };

    let accounts = InitializeAccounts {
        creator: *creator,
        amm_config: DEFAULT_AMM_CONFIG,
        mint_0,
        mint_1,
        creator_token_0,
        creator_token_1,
    };

    Ok(vec![
        create_associated_token_account_idempotent(creator, creator, &native, &spl_token::id()),
        system_instruction::transfer(creator, &wsol_account, request.sol_lamports),
        spl_token::instruction::sync_native(&spl_token::id(), &wsol_account)?,
        initialize_instruction(&accounts, amount_0, amount_1)?,
        spl_token::instruction::close_account(&spl_token::id(), &wsol_account, creator, creator, &[])?,
    ])
}

/// Lamports the creator must hold before seeding a pool
pub fn seed_pool_cost(request: &SeedPoolRequest, fees: &SeedFees) -> u64 {
    request
        .sol_lamports
        .saturating_add(fees.creation_fee_lamports)
        .saturating_add(fees.margin_lamports)
}
