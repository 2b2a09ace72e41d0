use solana_program::program_pack::Pack;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account;
use spl_token::instruction::{initialize_mint2, mint_to, set_authority, AuthorityType};

use super::metadata::create_metadata_instruction;
use crate::config::LaunchFees;
use crate::error::Result;
use crate::models::{LaunchOptions, MintIntent};

/// Bytes allocated for a mint account
pub const MINT_ACCOUNT_LEN: usize = spl_token::state::Mint::LEN;

/// Every instruction of a launch, in the order the programs require:
/// allocate, initialize, ATA, mint supply, metadata, revocations, fee.
pub fn launch_instructions(
    intent: &MintIntent,
    mint: &Pubkey,
    mint_rent_lamports: u64,
    options: LaunchOptions,
    fees: &LaunchFees,
) -> Result<Vec<Instruction>> {
    let creator = &intent.creator;
    let token_program = spl_token::id();
    let creator_ata = get_associated_token_address(creator, mint);
    let options = options.effective_for(intent.origin);

    let mut instructions = vec![
        system_instruction::create_account(
            creator,
            mint,
            mint_rent_lamports,
            MINT_ACCOUNT_LEN as u64,
            &token_program,
        ),
        initialize_mint2(&token_program, mint, creator, Some(creator), intent.decimals)?,
        create_associated_token_account(creator, creator, mint, &token_program),
        mint_to(&token_program, mint, &creator_ata, creator, &[], intent.initial_supply)?,
        create_metadata_instruction(
            mint,
            creator,
            &intent.name,
            &intent.symbol,
            &intent.image_uri,
        ),
    ];

    // Metadata creation needs the mint authority, so revocation comes after it
    if options.revoke_mint_authority {
        instructions.push(set_authority(
            &token_program,
            mint,
            None,
            AuthorityType::MintTokens,
            creator,
            &[],
        )?);
    }
    if options.revoke_freeze_authority {
        instructions.push(set_authority(
            &token_program,
            mint,
            None,
            AuthorityType::FreezeAccount,
            creator,
            &[],
        )?);
    }

    instructions.push(system_instruction::transfer(
        creator,
        &fees.treasury,
        fees.platform_fee_lamports,
    ));

    Ok(instructions)
}

/// Lamports the creator must hold before a launch is attempted
pub fn launch_cost(mint_rent_lamports: u64, fees: &LaunchFees) -> u64 {
    mint_rent_lamports
        .saturating_add(fees.platform_fee_lamports)
        .saturating_add(fees.margin_lamports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MintOrigin;
    use solana_sdk::system_program;

    fn intent(origin: MintOrigin) -> MintIntent {
        MintIntent {
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            description: "test token".to_string(),
            image_uri: "ipfs://metadata".to_string(),
            initial_supply: 1_000_000 * 10u64.pow(6),
            decimals: 6,
            creator: Pubkey::new_unique(),
            origin,
        }
    }

    fn fees() -> LaunchFees {
        LaunchFees {
            treasury: Pubkey::new_unique(),
            platform_fee_lamports: 100_000_000,
            margin_lamports: 10_000_000,
        }
    }

    #[test]
    fn plain_launch_has_six_ordered_instructions() {
        let intent = intent(MintOrigin::Original);
        let fees = fees();
        let mint = Pubkey::new_unique();
        let ixs = launch_instructions(&intent, &mint, 1_461_600, LaunchOptions::default(), &fees)
            .unwrap();

        let programs: Vec<Pubkey> = ixs.iter().map(|ix| ix.program_id).collect();
        assert_eq!(
            programs,
            vec![
                system_program::id(),
                spl_token::id(),
                spl_associated_token_account::id(),
                spl_token::id(),
                mpl_token_metadata::ID,
                system_program::id(),
            ]
        );
        assert_eq!(ixs[4].accounts[0].pubkey, crate::builder::metadata_address(&mint));

        // The fee transfer goes to the treasury
        let fee = ixs.last().unwrap();
        assert_eq!(fee.accounts[1].pubkey, fees.treasury);
    }

    #[test]
    fn copied_launch_revokes_both_authorities_before_fee() {
        let intent = intent(MintOrigin::Copied);
        let ixs = launch_instructions(
            &intent,
            &Pubkey::new_unique(),
            1_461_600,
            LaunchOptions::default(),
            &fees(),
        )
        .unwrap();

        assert_eq!(ixs.len(), 8);
        assert_eq!(ixs[5].program_id, spl_token::id());
        assert_eq!(ixs[6].program_id, spl_token::id());
        assert_eq!(ixs[7].program_id, system_program::id());
    }

    #[test]
    fn ordering_only_varies_by_mint_address() {
        let intent = intent(MintOrigin::Original);
        let fees = fees();
        let first = launch_instructions(&intent, &Pubkey::new_unique(), 10, LaunchOptions::default(), &fees)
            .unwrap();
        let second = launch_instructions(&intent, &Pubkey::new_unique(), 10, LaunchOptions::default(), &fees)
            .unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.program_id, b.program_id);
            assert_eq!(a.accounts.len(), b.accounts.len());
        }
    }

    #[test]
    fn cost_covers_rent_fee_and_margin() {
        assert_eq!(launch_cost(1_000, &fees()), 110_001_000);
    }
}
