use chrono::Utc;
use log::{error, info, warn};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::future::Future;
use std::sync::Arc;

use super::pipeline::{ConfirmPolicy, SubmissionPipeline};
use crate::builder::{SeedPoolRequest, TransactionBuilder};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{Error, Result};
use crate::models::{
    BaselineAmount, LaunchOptions, MintIntent, PoolCandidate, PreparedTransaction, TokenRecord,
};
use crate::reconcile::{fetch_live_pool, Trigger, TriggerHandle};
use crate::solana::{ChainRpc, WalletSigner};
use crate::utils::lamports_to_sol;

/// A blockhash that expires mid-flight gets exactly one rebuild
const MAX_ATTEMPTS: usize = 2;

/// A confirmed launch
#[derive(Debug, Clone)]
pub struct LaunchReceipt {
    pub signature: Signature,
    pub mint: Pubkey,
}

/// Drives builder and pipeline for one wallet and records what landed
pub struct Launchpad<R: ChainRpc, W: WalletSigner, S: Repository> {
    rpc: Arc<R>,
    wallet: Arc<W>,
    store: Arc<S>,
    builder: TransactionBuilder<R>,
    pipeline: SubmissionPipeline<R, W>,
    config: Config,
    reconcile: Option<TriggerHandle>,
}

impl<R: ChainRpc, W: WalletSigner, S: Repository> Launchpad<R, W, S> {
    pub fn new(rpc: Arc<R>, wallet: Arc<W>, store: Arc<S>, config: Config) -> Self {
        Self {
            builder: TransactionBuilder::new(rpc.clone()),
            pipeline: SubmissionPipeline::new(
                rpc.clone(),
                wallet.clone(),
                ConfirmPolicy::from_config(&config),
            ),
            rpc,
            wallet,
            store,
            config,
            reconcile: None,
        }
    }

    /// Request a reconciliation pass after every successful seed
    pub fn with_reconcile_trigger(mut self, handle: TriggerHandle) -> Self {
        self.reconcile = Some(handle);
        self
    }

    fn owner(&self) -> Result<Pubkey> {
        self.wallet.pubkey().ok_or(Error::MissingSigner)
    }

    /// Create, mint and describe a new token, then record it
    pub async fn launch(&self, intent: &MintIntent, options: LaunchOptions) -> Result<LaunchReceipt> {
        let owner = self.owner()?;
        if intent.creator != owner {
            return Err(Error::InvalidIntent(format!(
                "creator {} is not the connected wallet {}",
                intent.creator, owner
            )));
        }
        let fees = self.config.launch_fees()?;

        let ((mint, revoked), signature) = self
            .submit_fresh("launch", move || async move {
                let launch = self.builder.prepare_launch(intent, options, &fees).await?;
                Ok(((launch.mint, launch.authorities_revoked), launch.transaction))
            })
            .await?;

        let record = TokenRecord {
            mint,
            name: intent.name.clone(),
            symbol: intent.symbol.clone(),
            uri: intent.image_uri.clone(),
            decimals: intent.decimals,
            signature: signature.to_string(),
            authorities_revoked: revoked,
            created_at: Utc::now(),
        };
        self.persist(&owner, &record, &signature).await?;

        info!("Launched {} at mint {} ({})", intent.symbol, mint, signature);
        Ok(LaunchReceipt { signature, mint })
    }

    /// Create a token/SOL pool and remember it for reconciliation,
    /// with the SOL deposit as the P&L baseline
    pub async fn seed_pool(&self, request: &SeedPoolRequest, token_symbol: &str) -> Result<Signature> {
        let owner = self.owner()?;
        let fees = self.config.seed_fees();

        let ((), signature) = self
            .submit_fresh("seed pool", move || async move {
                let prepared = self.builder.prepare_seed_pool(&owner, request, &fees).await?;
                Ok(((), prepared))
            })
            .await?;

        self.record_pool(&owner, &signature, request, token_symbol)
            .await?;

        if let Some(handle) = &self.reconcile {
            handle.notify(Trigger::Submitted(signature));
        }
        Ok(signature)
    }

    /// Withdraw `percentage` of the wallet's liquidity from `pool_id`.
    /// The pool is re-read from chain for every attempt.
    pub async fn withdraw(&self, pool_id: &Pubkey, percentage: u8) -> Result<Signature> {
        let owner = self.owner()?;
        let fees = self.config.withdraw_fees()?;

        let ((), signature) = self
            .submit_fresh("withdraw", move || async move {
                let pool = fetch_live_pool(self.rpc.as_ref(), &owner, pool_id).await?;
                let prepared = self
                    .builder
                    .prepare_withdraw(&owner, &pool, percentage, &fees)
                    .await?;
                Ok(((), prepared))
            })
            .await?;

        info!("Withdrew {}% from pool {} ({})", percentage, pool_id, signature);
        Ok(signature)
    }

    /// Resume waiting on a transaction that timed out earlier
    pub async fn confirm(&self, signature: &Signature) -> Result<()> {
        self.pipeline.await_confirmation(signature).await
    }

    /// Prepare and submit, rebuilding from scratch once if the blockhash expired
    async fn submit_fresh<T, F, Fut>(&self, action: &str, mut prepare: F) -> Result<(T, Signature)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, PreparedTransaction)>>,
    {
        let mut attempt = 1;
        loop {
            let (output, prepared) = prepare().await?;
            match self.pipeline.submit(prepared).await {
                Ok(signature) => return Ok((output, signature)),
                Err(Error::BlockhashExpired) if attempt < MAX_ATTEMPTS => {
                    warn!("Blockhash expired during {}, rebuilding", action);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record_pool(
        &self,
        owner: &Pubkey,
        signature: &Signature,
        request: &SeedPoolRequest,
        token_symbol: &str,
    ) -> Result<()> {
        let native = spl_token::native_mint::id();
        let candidate = PoolCandidate::new(
            signature.to_string(),
            request.token_mint,
            token_symbol.to_uppercase(),
            native,
            "SOL".to_string(),
        );
        let baseline = BaselineAmount {
            custom_mint: request.token_mint,
            reference_mint: native,
            reference_symbol: "SOL".to_string(),
            amount: lamports_to_sol(request.sol_lamports),
            captured_at: candidate.created_at,
        };

        self.persist(owner, &candidate, signature).await?;
        self.persist(owner, &baseline, signature).await
    }

    async fn persist<Rec: crate::db::Record>(
        &self,
        owner: &Pubkey,
        record: &Rec,
        signature: &Signature,
    ) -> Result<()> {
        match self.store.append(&owner.to_string(), record).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // The transaction landed; make sure the signature is not lost
                error!("Confirmed {} but failed to record {}: {}", signature, Rec::KIND, e);
                Err(e)
            }
        }
    }
}
