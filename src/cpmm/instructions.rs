use borsh::BorshSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};

use super::{
    lp_mint_address, observation_address, pool_address, pool_authority, vault_address,
    CREATE_POOL_FEE_RECEIVER, MEMO_PROGRAM_ID, PROGRAM_ID, TOKEN_2022_PROGRAM_ID,
};
use crate::error::{Error, Result};
use crate::models::PoolKeys;

const INITIALIZE_DISCRIMINATOR: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
const WITHDRAW_DISCRIMINATOR: [u8; 8] = [183, 18, 70, 156, 148, 109, 161, 34];

#[derive(BorshSerialize)]
struct InitializeArgs {
    init_amount_0: u64,
    init_amount_1: u64,
    open_time: u64,
}

#[derive(BorshSerialize)]
struct WithdrawArgs {
    lp_token_amount: u64,
    minimum_token_0_amount: u64,
    minimum_token_1_amount: u64,
}

fn encode<T: BorshSerialize>(discriminator: [u8; 8], args: &T) -> Result<Vec<u8>> {
    let mut data = discriminator.to_vec();
    let body = borsh::to_vec(args).map_err(|e| Error::Instruction(e.to_string()))?;
    data.extend(body);
    Ok(data)
}

/// Accounts for creating a pool; mints must already be sorted
#[derive(Debug, Clone)]
pub struct InitializeAccounts {
    pub creator: Pubkey,
    pub amm_config: Pubkey,
    pub mint_0: Pubkey,
    pub mint_1: Pubkey,
    pub creator_token_0: Pubkey,
    pub creator_token_1: Pubkey,
}

impl InitializeAccounts {
    pub fn pool(&self) -> Pubkey {
        pool_address(&self.amm_config, &self.mint_0, &self.mint_1)
    }
}

/// Create a pool and deposit the initial reserves
pub fn initialize_instruction(
    accounts: &InitializeAccounts,
    init_amount_0: u64,
    init_amount_1: u64,
) -> Result<Instruction> {
    let pool = accounts.pool();
    let lp_mint = lp_mint_address(&pool);
    let creator_lp = spl_associated_token_account::get_associated_token_address(
        &accounts.creator,
        &lp_mint,
    );

    let metas = vec![
        AccountMeta::new(accounts.creator, true),
        AccountMeta::new_readonly(accounts.amm_config, false),
        AccountMeta::new_readonly(pool_authority(), false),
        AccountMeta::new(pool, false),
        AccountMeta::new_readonly(accounts.mint_0, false),
        AccountMeta::new_readonly(accounts.mint_1, false),
        AccountMeta::new(lp_mint, false),
        AccountMeta::new(accounts.creator_token_0, false),
        AccountMeta::new(accounts.creator_token_1, false),
        AccountMeta::new(creator_lp, false),
        AccountMeta::new(vault_address(&pool, &accounts.mint_0), false),
        AccountMeta::new(vault_address(&pool, &accounts.mint_1), false),
        AccountMeta::new(CREATE_POOL_FEE_RECEIVER, false),
        AccountMeta::new(observation_address(&pool), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
    ];

    let data = encode(
        INITIALIZE_DISCRIMINATOR,
        &InitializeArgs {
            init_amount_0,
            init_amount_1,
            open_time: 0,
        },
    )?;

    Ok(Instruction::new_with_bytes(PROGRAM_ID, &data, metas))
}

/// Burn `lp_amount` LP tokens for at least the given amounts of each side
pub fn withdraw_instruction(
    keys: &PoolKeys,
    owner: &Pubkey,
    owner_lp_token: &Pubkey,
    owner_token_a: &Pubkey,
    owner_token_b: &Pubkey,
    lp_amount: u64,
    minimum_a: u64,
    minimum_b: u64,
) -> Result<Instruction> {
    let metas = vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.pool_id, false),
        AccountMeta::new(*owner_lp_token, false),
        AccountMeta::new(*owner_token_a, false),
        AccountMeta::new(*owner_token_b, false),
        AccountMeta::new(keys.vault_a, false),
        AccountMeta::new(keys.vault_b, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(TOKEN_2022_PROGRAM_ID, false),
        AccountMeta::new_readonly(keys.mint_a, false),
        AccountMeta::new_readonly(keys.mint_b, false),
        AccountMeta::new(keys.lp_mint, false),
        AccountMeta::new_readonly(MEMO_PROGRAM_ID, false),
    ];

    let data = encode(
        WITHDRAW_DISCRIMINATOR,
        &WithdrawArgs {
            lp_token_amount: lp_amount,
            minimum_token_0_amount: minimum_a,
            minimum_token_1_amount: minimum_b,
        },
    )?;

    Ok(Instruction::new_with_bytes(keys.program_id, &data, metas))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraw_data_is_discriminator_then_amounts() {
        let keys = PoolKeys {
            pool_id: Pubkey::new_unique(),
            program_id: PROGRAM_ID,
            authority: pool_authority(),
            amm_config: Pubkey::new_unique(),
            vault_a: Pubkey::new_unique(),
            vault_b: Pubkey::new_unique(),
            token_program_a: spl_token::id(),
            token_program_b: spl_token::id(),
            lp_mint: Pubkey::new_unique(),
            mint_a: Pubkey::new_unique(),
            mint_b: Pubkey::new_unique(),
        };
        let owner = Pubkey::new_unique();
        let ix = withdraw_instruction(
            &keys,
            &owner,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            500,
            7,
            9,
        )
        .unwrap();

        assert_eq!(ix.program_id, PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 14);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(&ix.data[..8], &WITHDRAW_DISCRIMINATOR);
        assert_eq!(u64::from_le_bytes(ix.data[8..16].try_into().unwrap()), 500);
        assert_eq!(u64::from_le_bytes(ix.data[16..24].try_into().unwrap()), 7);
        assert_eq!(u64::from_le_bytes(ix.data[24..32].try_into().unwrap()), 9);
    }

    #[test]
    fn initialize_targets_the_derived_pool() {
        let accounts = InitializeAccounts {
            creator: Pubkey::new_unique(),
            amm_config: super::super::DEFAULT_AMM_CONFIG,
            mint_0: Pubkey::new_unique(),
            mint_1: Pubkey::new_unique(),
            creator_token_0: Pubkey::new_unique(),
            creator_token_1: Pubkey::new_unique(),
        };
        let ix = initialize_instruction(&accounts, 1_000, 2_000).unwrap();

        assert_eq!(ix.accounts.len(), 20);
        assert_eq!(ix.accounts[3].pubkey, accounts.pool());
        assert_eq!(ix.data.len(), 8 + 24);
    }
}
