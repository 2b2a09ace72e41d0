use futures::future::join_all;
use log::{debug, info, warn};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use std::collections::HashMap;
use std::sync::Arc;

use super::strategy::ResolutionStrategy;
use crate::cpmm::PoolDecode;
use crate::db::Repository;
use crate::error::{Error, Result};
use crate::models::{BaselineAmount, LivePool, PoolCandidate, PoolState};
use crate::solana::ChainRpc;
use crate::valuation::{profit_loss, PriceReading, ProfitLoss};

/// Where a candidate ended up after one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Displayed,
    /// The wallet holds none of the pool's LP tokens
    Filtered,
    /// A newer candidate already shows the same pool
    Duplicate,
    /// Resolution or a live query failed; retried from scratch next pass
    Dropped(String),
}

/// A pool the wallet has a stake in, ready to render
#[derive(Debug, Clone)]
pub struct PoolView {
    pub candidate: PoolCandidate,
    pub state: PoolState,
    pub baseline: Option<BaselineAmount>,
    pub pnl: Option<ProfitLoss>,
}

/// Result of one reconciliation pass, in candidate (newest first) order
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub views: Vec<PoolView>,
    /// One entry per candidate, keyed by originating transaction
    pub outcomes: Vec<(String, CandidateOutcome)>,
    pub price: Option<PriceReading>,
}

impl ReconcileReport {
    pub fn outcome_of(&self, originating_tx: &str) -> Option<&CandidateOutcome> {
        self.outcomes
            .iter()
            .find(|(tx, _)| tx == originating_tx)
            .map(|(_, outcome)| outcome)
    }

    pub fn dropped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CandidateOutcome::Dropped(_)))
            .count()
    }
}

/// Turns the persisted candidate list into live pool views
pub struct ReconciliationEngine<R: ChainRpc, S: Repository> {
    rpc: Arc<R>,
    store: Arc<S>,
    strategy: ResolutionStrategy,
}

impl<R: ChainRpc, S: Repository> ReconciliationEngine<R, S> {
    pub fn new(rpc: Arc<R>, store: Arc<S>) -> Self {
        Self {
            rpc,
            store,
            strategy: ResolutionStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// One full pass for `wallet`. Only storage failures abort the pass;
    /// everything chain-related is isolated to its candidate.
    pub async fn reconcile(
        &self,
        wallet: &Pubkey,
        price: Option<&PriceReading>,
    ) -> Result<ReconcileReport> {
        let scope = wallet.to_string();
        let candidates: Vec<PoolCandidate> = self.store.get(&scope).await?;
        let baselines: Vec<BaselineAmount> = self.store.get(&scope).await?;

        debug!("Reconciling {} candidates for {}", candidates.len(), wallet);

        let resolutions = join_all(
            candidates
                .iter()
                .map(|candidate| self.resolve(&scope, candidate)),
        )
        .await;

        // Collapse duplicates so each pool is queried once
        let mut pool_ids: Vec<Pubkey> = Vec::new();
        for id in resolutions.iter().filter_map(|r| r.as_ref().ok()) {
            if !pool_ids.contains(id) {
                pool_ids.push(*id);
            }
        }

        let live = self.live_pools(wallet, &pool_ids).await;

        let mut report = ReconcileReport {
            price: price.cloned(),
            ..Default::default()
        };
        let mut shown: Vec<Pubkey> = Vec::new();

        for (candidate, resolution) in candidates.into_iter().zip(resolutions) {
            let tx = candidate.originating_tx.clone();
            let outcome = match resolution {
                Err(e) => {
                    warn!("Dropping candidate {}: {}", tx, e);
                    CandidateOutcome::Dropped(e.to_string())
                }
                Ok(pool_id) => match live.get(&pool_id) {
                    None => CandidateOutcome::Dropped("pool was not queried".to_string()),
                    Some(Err(reason)) => {
                        warn!("Dropping candidate {} (pool {}): {}", tx, pool_id, reason);
                        CandidateOutcome::Dropped(reason.clone())
                    }
                    Some(Ok(state)) if !state.has_stake() => CandidateOutcome::Filtered,
                    Some(Ok(_)) if shown.contains(&pool_id) => CandidateOutcome::Duplicate,
                    Some(Ok(state)) => {
                        shown.push(pool_id);
                        report.views.push(self.view(candidate, state.clone(), &baselines, price));
                        CandidateOutcome::Displayed
                    }
                },
            };
            report.outcomes.push((tx, outcome));
        }

        info!(
            "Reconciled {} pools for {} ({} dropped)",
            report.views.len(),
            wallet,
            report.dropped()
        );
        Ok(report)
    }

    /// Resolve a candidate to its pool id, backfilling newly found ids
    async fn resolve(&self, scope: &str, candidate: &PoolCandidate) -> Result<Pubkey> {
        if let Some(pool_id) = candidate.pool_id {
            return Ok(pool_id);
        }

        let failed = |reason: String| Error::ResolutionFailed {
            signature: candidate.originating_tx.clone(),
            reason,
        };

        let effects = self
            .rpc
            .parsed_transaction(&candidate.originating_tx)
            .await
            .map_err(|e| failed(e.to_string()))?
            .ok_or_else(|| failed("transaction not found".to_string()))?;

        if let Some(err) = &effects.error {
            return Err(failed(format!("transaction failed: {}", err)));
        }
        if !effects.has_inner_effects() {
            return Err(failed("no inner instructions".to_string()));
        }

        let pool_id = self.strategy.locate(&effects).map_err(failed)?;

        let mut resolved = candidate.clone();
        resolved.pool_id = Some(pool_id);
        // Resolution is idempotent, so concurrent passes may both write
        if let Err(e) = self.store.update(scope, &resolved).await {
            warn!("Could not persist pool id for {}: {}", candidate.originating_tx, e);
        }

        debug!("Resolved {} to pool {}", candidate.originating_tx, pool_id);
        Ok(pool_id)
    }

    /// One batched state query, then the wallet's LP balance per valid pool
    async fn live_pools(
        &self,
        wallet: &Pubkey,
        pool_ids: &[Pubkey],
    ) -> HashMap<Pubkey, std::result::Result<PoolState, String>> {
        let mut live = HashMap::new();
        if pool_ids.is_empty() {
            return live;
        }

        let decoded = match self.rpc.pool_states(pool_ids).await {
            Ok(decoded) => decoded,
            Err(e) => {
                let reason = e.to_string();
                for id in pool_ids {
                    live.insert(*id, Err(reason.clone()));
                }
                return live;
            }
        };

        let mut valid: Vec<LivePool> = Vec::new();
        for decode in decoded {
            match decode {
                PoolDecode::Valid(pool) => valid.push(*pool),
                PoolDecode::Invalid { pool_id, reason } => {
                    live.insert(pool_id, Err(reason));
                }
            }
        }

        let balances = join_all(
            valid
                .iter()
                .map(|pool| self.rpc.token_balance_by_owner(wallet, &pool.state.lp_mint)),
        )
        .await;

        for (pool, balance) in valid.into_iter().zip(balances) {
            let entry = balance
                .map(|amount| PoolState {
                    caller_lp_balance: amount,
                    ..pool.state
                })
                .map_err(|e| e.to_string());
            live.insert(pool.keys.pool_id, entry);
        }
        live
    }

    fn view(
        &self,
        candidate: PoolCandidate,
        state: PoolState,
        baselines: &[BaselineAmount],
        price: Option<&PriceReading>,
    ) -> PoolView {
        let baseline = baselines.iter().find(|b| b.matches(&state)).cloned();
        let pnl = baseline.as_ref().and_then(|b| {
            let current = state.ui_reserve_of(&b.reference_mint)?;
            profit_loss(b, current, price)
        });
        PoolView {
            candidate,
            state,
            baseline,
            pnl,
        }
    }
}

/// Fetch one pool fresh from chain with the LP balance of `owner`'s associated account, for building a withdrawal
pub async fn fetch_live_pool<R: ChainRpc + ?Sized>(
    rpc: &R,
    owner: &Pubkey,
    pool_id: &Pubkey,
) -> Result<LivePool> {
    let decoded = rpc
        .pool_states(std::slice::from_ref(pool_id))
        .await?
        .into_iter()
        .next();

    let mut pool = match decoded {
        Some(PoolDecode::Valid(pool)) => *pool,
        Some(PoolDecode::Invalid { reason, .. }) => {
            return Err(Error::InvalidPoolState {
                pool: pool_id.to_string(),
                reason,
            })
        }
        None => {
            return Err(Error::InvalidPoolState {
                pool: pool_id.to_string(),
                reason: "no state returned".to_string(),
            })
        }
    };

    // The withdraw burns from the LP associated account, so only that balance counts
    let lp_account = get_associated_token_address(owner, &pool.state.lp_mint);
    pool.state.caller_lp_balance = rpc.token_account_balance(&lp_account).await?;
    if !pool.state.has_stake() {
        return Err(Error::InvalidWithdrawal(format!(
            "wallet holds no liquidity in pool {}",
            pool_id
        )));
    }
    Ok(pool)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::cpmm::{pool_authority, PROGRAM_ID, POOL_STATE_LEN};
    use crate::models::PoolKeys;
    use crate::solana::{InnerEffect, TransactionEffects};
    use serde_json::json;

    pub fn live_pool(mint_a: Pubkey, mint_b: Pubkey) -> LivePool {
        let pool_id = Pubkey::new_unique();
        let lp_mint = Pubkey::new_unique();
        LivePool {
            state: PoolState {
                pool_id,
                mint_a,
                mint_b,
                vault_reserve_a: 1_000_000_000,
                vault_reserve_b: 165_000_000,
                lp_mint,
                lp_decimals: 9,
                mint_decimals_a: 6,
                mint_decimals_b: 9,
                lp_supply: 10_000,
                caller_lp_balance: 0,
            },
            keys: PoolKeys {
                pool_id,
                program_id: PROGRAM_ID,
                authority: pool_authority(),
                amm_config: Pubkey::new_unique(),
                vault_a: Pubkey::new_unique(),
                vault_b: Pubkey::new_unique(),
                token_program_a: spl_token::id(),
                token_program_b: spl_token::id(),
                lp_mint,
                mint_a,
                mint_b,
            },
        }
    }

    /// A pool creation: two unrelated inner effects, then the pool allocation
    pub fn creation_effects(signature: &str, pool_id: &Pubkey) -> TransactionEffects {
        let effect = |position: usize, parsed: serde_json::Value| InnerEffect {
            outer_index: 3,
            position,
            program_id: solana_sdk::system_program::id().to_string(),
            parsed: Some(parsed),
        };
        TransactionEffects {
            signature: signature.to_string(),
            error: None,
            inner: vec![vec![
                effect(0, json!({"type": "transfer", "info": {"lamports": 1}})),
                effect(1, json!({"type": "createAccount", "info": {
                    "newAccount": Pubkey::new_unique().to_string(),
                    "owner": spl_token::id().to_string(),
                    "space": 165,
                }})),
                effect(2, json!({"type": "createAccount", "info": {
                    "newAccount": pool_id.to_string(),
                    "owner": PROGRAM_ID.to_string(),
                    "space": POOL_STATE_LEN,
                }})),
            ]],
        }
    }

    pub fn candidate(tx: &str, token: Pubkey, age_minutes: i64) -> PoolCandidate {
        let mut candidate = PoolCandidate::new(
            tx.to_string(),
            token,
            "TST".to_string(),
            spl_token::native_mint::id(),
            "SOL".to_string(),
        );
        candidate.created_at = chrono::Utc::now() - chrono::Duration::minutes(age_minutes);
        candidate
    }
}
