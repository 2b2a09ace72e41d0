use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::config::WithdrawFees;
use crate::cpmm::withdraw_instruction;
use crate::error::{Error, Result};
use crate::models::LivePool;

/// Fixed slippage tolerance for withdrawals, in basis points (1%)
pub const WITHDRAW_SLIPPAGE_BPS: u64 = 100;

/// LP tokens to burn for `percentage` of the caller's balance, rounded down
pub fn redeem_amount(lp_balance: u64, percentage: u8) -> Result<u64> {
    if percentage > 100 {
        return Err(Error::InvalidWithdrawal(format!(
            "percentage {} is outside 0-100",
            percentage
        )));
    }
    Ok((lp_balance as u128 * percentage as u128 / 100) as u64)
}

/// Smallest acceptable output for one side after slippage
pub fn minimum_out(reserve: u64, lp_amount: u64, lp_supply: u64, slippage_bps: u64) -> u64 {
    if lp_supply == 0 {
        return 0;
    }
    let expected = reserve as u128 * lp_amount as u128 / lp_supply as u128;
    let bound = expected * (10_000u128.saturating_sub(slippage_bps as u128)) / 10_000;
    bound as u64
}

/// Instructions for withdrawing `percentage` of the owner's liquidity.
/// `pool` must be freshly fetched and carry the owner's LP balance.
pub fn withdraw_instructions(
    owner: &Pubkey,
    pool: &LivePool,
    percentage: u8,
    fees: &WithdrawFees,
) -> Result<Vec<Instruction>> {
    let state = &pool.state;
    let keys = &pool.keys;

    let lp_amount = redeem_amount(state.caller_lp_balance, percentage)?;

    let minimum_a = minimum_out(state.vault_reserve_a, lp_amount, state.lp_supply, WITHDRAW_SLIPPAGE_BPS);
    let minimum_b = minimum_out(state.vault_reserve_b, lp_amount, state.lp_supply, WITHDRAW_SLIPPAGE_BPS);

    let owner_lp = get_associated_token_address_with_program_id(owner, &keys.lp_mint, &spl_token::id());
    let owner_a = get_associated_token_address_with_program_id(owner, &keys.mint_a, &keys.token_program_a);
    let owner_b = get_associated_token_address_with_program_id(owner, &keys.mint_b, &keys.token_program_b);

    let mut instructions = vec![
        create_associated_token_account_idempotent(owner, owner, &keys.mint_a, &keys.token_program_a),
        create_associated_token_account_idempotent(owner, owner, &keys.mint_b, &keys.token_program_b),
        withdraw_instruction(
            keys, owner, &owner_lp, &owner_a, &owner_b, lp_amount, minimum_a, minimum_b,
        )?,
    ];

    // Unwrap any SOL received
    let native = spl_token::native_mint::id();
    for (mint, account) in [(&keys.mint_a, &owner_a), (&keys.mint_b, &owner_b)] {
        if *mint == native {
            instructions.push(spl_token::instruction::close_account(
                &spl_token::id(),
                account,
                owner,
                owner,
                &[],
            )?);
        }
    }

    instructions.push(system_instruction::transfer(owner, &fees.treasury, fees.tip_lamports));

    Ok(instructions)
}

/// Lamports the owner must hold before a withdrawal is attempted
pub fn withdraw_cost(fees: &WithdrawFees) -> u64 {
    fees.tip_lamports.saturating_add(fees.margin_lamports)
}
