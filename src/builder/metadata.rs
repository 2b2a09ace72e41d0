use mpl_token_metadata::accounts::Metadata;
use mpl_token_metadata::instructions::{CreateMetadataAccountV3, CreateMetadataAccountV3InstructionArgs};
use mpl_token_metadata::types::DataV2;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};

/// Metadata account for `mint`
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Metadata::find_pda(mint).0
}

/// Attach name, symbol and off-chain JSON uri to `mint`.
/// `authority` pays, and holds both the mint and update authority.
pub fn create_metadata_instruction(
    mint: &Pubkey,
    authority: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Instruction {
    let accounts = CreateMetadataAccountV3 {
        metadata: metadata_address(mint),
        mint: *mint,
        mint_authority: *authority,
        payer: *authority,
        update_authority: (*authority, true),
        system_program: system_program::id(),
        rent: Some(sysvar::rent::id()),
    };

    accounts.instruction(CreateMetadataAccountV3InstructionArgs {
        data: DataV2 {
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: uri.to_string(),
            seller_fee_basis_points: 0,
            creators: None,
            collection: None,
            uses: None,
        },
        is_mutable: true,
        collection_details: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_the_mint_metadata_account() {
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ix = create_metadata_instruction(&mint, &authority, "Test", "TST", "ipfs://test");

        assert_eq!(ix.program_id, mpl_token_metadata::ID);
        assert_eq!(ix.accounts[0].pubkey, metadata_address(&mint));
        assert_eq!(ix.accounts[1].pubkey, mint);

        // Mint authority, payer and update authority all sign
        let signers: Vec<Pubkey> = ix
            .accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect();
        assert_eq!(signers, vec![authority, authority, authority]);
        assert!(ix.accounts.iter().any(|meta| meta.pubkey == authority && meta.is_writable));
    }

    #[test]
    fn metadata_address_is_the_standard_pda() {
        let mint = Pubkey::new_unique();
        let (expected, _) = Pubkey::find_program_address(
            &[b"metadata", mpl_token_metadata::ID.as_ref(), mint.as_ref()],
            &mpl_token_metadata::ID,
        );
        assert_eq!(metadata_address(&mint), expected);
        assert_ne!(metadata_address(&mint), mint);
    }
}
