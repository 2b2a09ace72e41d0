use borsh::BorshDeserialize;
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;

use super::{pool_authority, PROGRAM_ID, POOL_STATE_DISCRIMINATOR, POOL_STATE_LEN};
use crate::models::{LivePool, PoolKeys, PoolState};

/// Result of decoding a pool account at the RPC boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolDecode {
    Valid(Box<LivePool>),
    Invalid { pool_id: Pubkey, reason: String },
}

impl PoolDecode {
    pub fn invalid(pool_id: Pubkey, reason: impl Into<String>) -> Self {
        PoolDecode::Invalid {
            pool_id,
            reason: reason.into(),
        }
    }
}

/// Leading fields of the on-chain pool state, after the 8-byte discriminator.
/// Trailing padding is not read.
#[derive(Debug, Clone, BorshDeserialize)]
struct PoolStateLayout {
    amm_config: [u8; 32],
    _pool_creator: [u8; 32],
    token_0_vault: [u8; 32],
    token_1_vault: [u8; 32],
    lp_mint: [u8; 32],
    token_0_mint: [u8; 32],
    token_1_mint: [u8; 32],
    token_0_program: [u8; 32],
    token_1_program: [u8; 32],
    _observation_key: [u8; 32],
    _auth_bump: u8,
    _status: u8,
    lp_mint_decimals: u8,
    mint_0_decimals: u8,
    mint_1_decimals: u8,
    lp_supply: u64,
    protocol_fees_token_0: u64,
    protocol_fees_token_1: u64,
    fund_fees_token_0: u64,
    fund_fees_token_1: u64,
}

/// A decoded pool that still needs its vault balances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPool {
    pub keys: PoolKeys,
    pub lp_decimals: u8,
    pub decimals_a: u8,
    pub decimals_b: u8,
    pub lp_supply: u64,
    /// Protocol plus fund fees sitting in each vault
    pub accrued_fees_a: u64,
    pub accrued_fees_b: u64,
}

impl DecodedPool {
    /// Combine with raw vault token balances into a live pool
    pub fn with_vault_amounts(self, vault_amount_a: u64, vault_amount_b: u64) -> LivePool {
        let state = PoolState {
            pool_id: self.keys.pool_id,
            mint_a: self.keys.mint_a,
            mint_b: self.keys.mint_b,
            vault_reserve_a: vault_amount_a.saturating_sub(self.accrued_fees_a),
            vault_reserve_b: vault_amount_b.saturating_sub(self.accrued_fees_b),
            lp_mint: self.keys.lp_mint,
            lp_decimals: self.lp_decimals,
            mint_decimals_a: self.decimals_a,
            mint_decimals_b: self.decimals_b,
            lp_supply: self.lp_supply,
            caller_lp_balance: 0,
        };
        LivePool {
            state,
            keys: self.keys,
        }
    }
}

/// Validate and decode a pool state account
pub fn decode_pool_account(pool_id: Pubkey, account: &Account) -> Result<DecodedPool, String> {
    if account.owner != PROGRAM_ID {
        return Err(format!("owned by {}, not the pool program", account.owner));
    }
    if account.data.len() < POOL_STATE_LEN {
        return Err(format!(
            "account holds {} bytes, expected {}",
            account.data.len(),
            POOL_STATE_LEN
        ));
    }
    if account.data[..8] != POOL_STATE_DISCRIMINATOR {
        return Err("account is not a pool state".to_string());
    }

    let mut body = &account.data[8..];
    let layout = PoolStateLayout::deserialize(&mut body)
        .map_err(|e| format!("malformed pool state: {}", e))?;

    let keys = PoolKeys {
        pool_id,
        program_id: PROGRAM_ID,
        authority: pool_authority(),
        amm_config: Pubkey::new_from_array(layout.amm_config),
        vault_a: Pubkey::new_from_array(layout.token_0_vault),
        vault_b: Pubkey::new_from_array(layout.token_1_vault),
        token_program_a: Pubkey::new_from_array(layout.token_0_program),
        token_program_b: Pubkey::new_from_array(layout.token_1_program),
        lp_mint: Pubkey::new_from_array(layout.lp_mint),
        mint_a: Pubkey::new_from_array(layout.token_0_mint),
        mint_b: Pubkey::new_from_array(layout.token_1_mint),
    };

    Ok(DecodedPool {
        keys,
        lp_decimals: layout.lp_mint_decimals,
        decimals_a: layout.mint_0_decimals,
        decimals_b: layout.mint_1_decimals,
        lp_supply: layout.lp_supply,
        accrued_fees_a: layout
            .protocol_fees_token_0
            .saturating_add(layout.fund_fees_token_0),
        accrued_fees_b: layout
            .protocol_fees_token_1
            .saturating_add(layout.fund_fees_token_1),
    })
}

/// Raw amount held by an SPL token (or token-2022) account
pub fn token_account_amount(account: &Account) -> Option<u64> {
    // mint (32) + owner (32) precede the amount in both token programs
    let bytes = account.data.get(64..72)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Amount in a vault, only if the account really holds `mint`
fn vault_amount(account: Option<&Account>, mint: &Pubkey) -> Option<u64> {
    let account = account?;
    if account.data.get(..32)? != mint.as_ref() {
        return None;
    }
    token_account_amount(account)
}

/// A decoded pool, or the reason it cannot be used
pub type PoolBatchEntry = Result<DecodedPool, PoolDecode>;

/// Decode pool accounts fetched for `ids`, keeping their order
pub fn decode_pool_batch(ids: &[Pubkey], accounts: Vec<Option<Account>>) -> Vec<PoolBatchEntry> {
    ids.iter()
        .zip(accounts.into_iter().chain(std::iter::repeat(None)))
        .map(|(id, account)| match account {
            None => Err(PoolDecode::invalid(*id, "account not found")),
            Some(account) => {
                decode_pool_account(*id, &account).map_err(|reason| PoolDecode::invalid(*id, reason))
            }
        })
        .collect()
}

/// Vault accounts to fetch next: `[vault_a, vault_b]` for every decoded pool, in batch order
pub fn vault_keys(batch: &[PoolBatchEntry]) -> Vec<Pubkey> {
    batch
        .iter()
        .filter_map(|entry| entry.as_ref().ok())
        .flat_map(|pool| [pool.keys.vault_a, pool.keys.vault_b])
        .collect()
}

/// Combine a batch with the accounts fetched for `vault_keys(&batch)`
pub fn attach_vault_amounts(batch: Vec<PoolBatchEntry>, vault_accounts: Vec<Option<Account>>) -> Vec<PoolDecode> {
    let mut vaults = vault_accounts.into_iter();
    batch
        .into_iter()
        .map(|entry| {
            let pool = match entry {
                Ok(pool) => pool,
                Err(invalid) => return invalid,
            };
            // Consume both slots before deciding so later pools stay aligned
            let vault_a = vaults.next().flatten();
            let vault_b = vaults.next().flatten();
            let amounts = vault_amount(vault_a.as_ref(), &pool.keys.mint_a)
                .zip(vault_amount(vault_b.as_ref(), &pool.keys.mint_b));

            match amounts {
                Some((amount_a, amount_b)) => {
                    PoolDecode::Valid(Box::new(pool.with_vault_amounts(amount_a, amount_b)))
                }
                None => PoolDecode::invalid(pool.keys.pool_id, "vault accounts unreadable"),
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn decodes_keys_and_nets_out_fees() {
        let mut fixture = PoolFixture::new(Pubkey::new_unique(), spl_token::native_mint::id());
        fixture.fees_a = 10;
        fixture.fees_b = 20;
        let id = Pubkey::new_unique();

        let decoded = decode_pool_account(id, &fixture.account()).unwrap();
        assert_eq!(decoded.keys.vault_a, fixture.vault_a);
        assert_eq!(decoded.keys.lp_mint, fixture.lp_mint);
        assert_eq!(decoded.decimals_a, 6);
        assert_eq!(decoded.lp_supply, 1_000);

        let live = decoded.with_vault_amounts(1_000, 15);
        assert_eq!(live.state.pool_id, id);
        assert_eq!(live.state.vault_reserve_a, 990);
        assert_eq!(live.state.vault_reserve_b, 0);
    }

    #[test]
    fn rejects_foreign_or_short_accounts() {
        let fixture = PoolFixture::new(Pubkey::new_unique(), Pubkey::new_unique());

        let mut foreign = fixture.account();
        foreign.owner = Pubkey::new_unique();
        assert!(decode_pool_account(Pubkey::new_unique(), &foreign).is_err());

        let mut short = fixture.account();
        short.data.truncate(100);
        assert!(decode_pool_account(Pubkey::new_unique(), &short).is_err());

        let mut wrong_kind = fixture.account();
        wrong_kind.data[0] ^= 0xff;
        assert!(decode_pool_account(Pubkey::new_unique(), &wrong_kind).is_err());
    }

    #[test]
    fn vault_balances_stay_with_their_pool() {
        let first = PoolFixture::new(Pubkey::new_unique(), spl_token::native_mint::id());
        let last = PoolFixture::new(Pubkey::new_unique(), spl_token::native_mint::id());
        let mut foreign = PoolFixture::new(Pubkey::new_unique(), Pubkey::new_unique()).account();
        foreign.owner = Pubkey::new_unique();

        let ids: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let batch = decode_pool_batch(
            &ids,
            vec![Some(first.account()), None, Some(foreign), Some(last.account())],
        );

        let keys = vault_keys(&batch);
        assert_eq!(keys, vec![first.vault_a, first.vault_b, last.vault_a, last.vault_b]);

        let authority = pool_authority();
        let vault_accounts = vec![
            Some(token_account(&first.mint_a, &authority, 100)),
            Some(token_account(&first.mint_b, &authority, 200)),
            Some(token_account(&last.mint_a, &authority, 300)),
            Some(token_account(&last.mint_b, &authority, 400)),
        ];
        let decoded = attach_vault_amounts(batch, vault_accounts);
        assert_eq!(decoded.len(), 4);

        let reserves = |entry: &PoolDecode| match entry {
            PoolDecode::Valid(pool) => Some((pool.state.pool_id, pool.state.vault_reserve_a, pool.state.vault_reserve_b)),
            PoolDecode::Invalid { .. } => None,
        };
        assert_eq!(reserves(&decoded[0]), Some((ids[0], 100, 200)));
        assert!(matches!(&decoded[1], PoolDecode::Invalid { pool_id, .. } if *pool_id == ids[1]));
        assert!(matches!(&decoded[2], PoolDecode::Invalid { pool_id, .. } if *pool_id == ids[2]));
        assert_eq!(reserves(&decoded[3]), Some((ids[3], 300, 400)));
    }

    #[test]
    fn missing_or_mismatched_vault_invalidates_only_its_pool() {
        let first = PoolFixture::new(Pubkey::new_unique(), spl_token::native_mint::id());
        let second = PoolFixture::new(Pubkey::new_unique(), spl_token::native_mint::id());
        let ids = [Pubkey::new_unique(), Pubkey::new_unique()];
        let batch = decode_pool_batch(&ids, vec![Some(first.account()), Some(second.account())]);

        let owner = pool_authority();
        let decoded = attach_vault_amounts(
            batch,
            vec![
                None,
                Some(token_account(&first.mint_b, &owner, 1)),
                // Swapped sides do not pass for the right vaults
                Some(token_account(&second.mint_b, &owner, 5)),
                Some(token_account(&second.mint_a, &owner, 6)),
            ],
        );

        assert!(matches!(decoded[0], PoolDecode::Invalid { .. }));
        assert!(matches!(decoded[1], PoolDecode::Invalid { .. }));
    }

    #[test]
    fn reads_token_account_amount() {
        let account = token_account(&Pubkey::new_unique(), &Pubkey::new_unique(), 42);
        assert_eq!(token_account_amount(&account), Some(42));
        assert_eq!(
            token_account_amount(&Account { data: vec![0; 10], ..account }),
            None
        );
    }
}
