mod launch;
mod metadata;
mod seed;
mod withdraw;

pub use launch::{launch_cost, launch_instructions, MINT_ACCOUNT_LEN};
pub use metadata::{create_metadata_instruction, metadata_address};
pub use seed::{seed_pool_cost, seed_pool_instructions, SeedPoolRequest};
pub use withdraw::{minimum_out, redeem_amount, withdraw_cost, withdraw_instructions, WITHDRAW_SLIPPAGE_BPS};

use log::{debug, info};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;

use crate::config::{LaunchFees, SeedFees, WithdrawFees};
use crate::error::{Error, Result};
use crate::models::{LaunchOptions, LivePool, MintIntent, PreparedTransaction};
use crate::solana::ChainRpc;

/// A launch transaction plus the address of the mint it creates
#[derive(Debug)]
pub struct PreparedLaunch {
    pub transaction: PreparedTransaction,
    pub mint: Pubkey,
    pub authorities_revoked: bool,
}

/// Assembles launch, seed and withdraw transactions after a balance preflight
pub struct TransactionBuilder<R: ChainRpc> {
    rpc: Arc<R>,
}

impl<R: ChainRpc> TransactionBuilder<R> {
    pub fn new(rpc: Arc<R>) -> Self {
        Self { rpc }
    }

    /// Build a launch with a freshly generated mint keypair.
    /// Every call yields a new mint, so retries never collide with an earlier attempt.
    pub async fn prepare_launch(
        &self,
        intent: &MintIntent,
        options: LaunchOptions,
        fees: &LaunchFees,
    ) -> Result<PreparedLaunch> {
        intent.validate()?;

        let rent = self
            .rpc
            .minimum_balance_for_rent_exemption(MINT_ACCOUNT_LEN)
            .await?;
        self.ensure_funds(&intent.creator, launch_cost(rent, fees))
            .await?;

        let mint = Keypair::new();
        let mint_address = mint.pubkey();
        let effective = options.effective_for(intent.origin);
        let instructions = launch_instructions(intent, &mint_address, rent, options, fees)?;

        info!(
            "Prepared launch of {} ({}) at mint {}",
            intent.name, intent.symbol, mint_address
        );

        Ok(PreparedLaunch {
            transaction: PreparedTransaction::new(instructions, vec![mint], intent.creator),
            mint: mint_address,
            authorities_revoked: effective.revoke_mint_authority && effective.revoke_freeze_authority,
        })
    }

    /// Build a withdrawal of `percentage` of the owner's LP position.
    /// `pool` must come from a fetch made right before this call.
    pub async fn prepare_withdraw(
        &self,
        owner: &Pubkey,
        pool: &LivePool,
        percentage: u8,
        fees: &WithdrawFees,
    ) -> Result<PreparedTransaction> {
        let instructions = withdraw_instructions(owner, pool, percentage, fees)?;
        self.ensure_funds(owner, withdraw_cost(fees)).await?;

        debug!(
            "Prepared withdrawal of {}% from pool {}",
            percentage, pool.state.pool_id
        );

        Ok(PreparedTransaction::new(instructions, Vec::new(), *owner))
    }

    /// Build the creation of a token/SOL pool seeded with both deposits
    pub async fn prepare_seed_pool(
        &self,
        creator: &Pubkey,
        request: &SeedPoolRequest,
        fees: &SeedFees,
    ) -> Result<PreparedTransaction> {
        let instructions = seed_pool_instructions(creator, request)?;
        self.ensure_funds(creator, seed_pool_cost(request, fees))
            .await?;

        debug!("Prepared pool seed for mint {}", request.token_mint);

        Ok(PreparedTransaction::new(instructions, Vec::new(), *creator))
    }

    async fn ensure_funds(&self, payer: &Pubkey, required: u64) -> Result<()> {
        let available = self.rpc.balance(payer).await?;
        if available < required {
            return Err(Error::InsufficientFunds {
                required,
                available,
            });
        }
        Ok(())
    }
}
