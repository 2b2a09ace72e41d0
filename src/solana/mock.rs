//! Scripted `ChainRpc` used by unit tests.

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cpmm::PoolDecode;
use crate::error::{Error, Result};
use crate::models::LivePool;
use crate::solana::rpc::{ChainRpc, ConfirmationStatus, TransactionEffects};

#[derive(Default)]
pub struct MockRpc {
    pub balance: Mutex<u64>,
    pub rent: u64,
    pub transactions: Mutex<HashMap<String, TransactionEffects>>,
    pub pools: Mutex<HashMap<Pubkey, PoolDecode>>,
    /// Totals across all of an owner's accounts, by (owner, mint)
    pub token_balances: Mutex<HashMap<(Pubkey, Pubkey), u64>>,
    /// Single token accounts by address
    pub token_accounts: Mutex<HashMap<Pubkey, u64>>,
    /// Mints whose balance query fails
    pub failing_balances: Mutex<Vec<Pubkey>>,
    /// Statuses returned by successive polls; `Pending` once exhausted
    pub statuses: Mutex<VecDeque<ConfirmationStatus>>,
    /// Errors returned by successive sends; a signature once exhausted
    pub send_errors: Mutex<VecDeque<Error>>,
    pub sent: Mutex<Vec<Transaction>>,
    pub blockhash_calls: AtomicUsize,
    pub transaction_calls: AtomicUsize,
    pub pool_state_calls: Mutex<Vec<Vec<Pubkey>>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(10_000_000_000),
            rent: 1_461_600,
            ..Default::default()
        }
    }

    pub fn set_balance(&self, lamports: u64) {
        *self.balance.lock().unwrap() = lamports;
    }

    pub fn add_transaction(&self, effects: TransactionEffects) {
        self.transactions
            .lock()
            .unwrap()
            .insert(effects.signature.clone(), effects);
    }

    pub fn add_pool(&self, pool: LivePool) {
        self.pools
            .lock()
            .unwrap()
            .insert(pool.state.pool_id, PoolDecode::Valid(Box::new(pool)));
    }

    /// Give `owner` `amount` of `mint`, all of it in the associated token account
    pub fn set_token_balance(&self, owner: Pubkey, mint: Pubkey, amount: u64) {
        self.token_balances.lock().unwrap().insert((owner, mint), amount);
        self.set_ata_balance(owner, mint, amount);
    }

    /// Override only the associated token account, leaving the owner's total as is
    pub fn set_ata_balance(&self, owner: Pubkey, mint: Pubkey, amount: u64) {
        self.token_accounts
            .lock()
            .unwrap()
            .insert(get_associated_token_address(&owner, &mint), amount);
    }

    pub fn push_status(&self, status: ConfirmationStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn push_send_error(&self, error: Error) {
        self.send_errors.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn latest_blockhash(&self) -> Result<Hash> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hash::new_unique())
    }

    async fn balance(&self, _address: &Pubkey) -> Result<u64> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn minimum_balance_for_rent_exemption(&self, _data_len: usize) -> Result<u64> {
        Ok(self.rent)
    }

    async fn parsed_transaction(&self, signature: &str) -> Result<Option<TransactionEffects>> {
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }

    async fn token_balance_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
        if self.failing_balances.lock().unwrap().contains(mint) {
            return Err(Error::Rpc {
                step: "getTokenAccountsByOwner",
                message: "node unavailable".to_string(),
                transient: false,
            });
        }
        Ok(self
            .token_balances
            .lock()
            .unwrap()
            .get(&(*owner, *mint))
            .copied()
            .unwrap_or(0))
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<u64> {
        Ok(self.token_accounts.lock().unwrap().get(account).copied().unwrap_or(0))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        if let Some(error) = self.send_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<ConfirmationStatus> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConfirmationStatus::Pending))
    }

    async fn pool_states(&self, ids: &[Pubkey]) -> Result<Vec<PoolDecode>> {
        self.pool_state_calls.lock().unwrap().push(ids.to_vec());
        let pools = self.pools.lock().unwrap();
        Ok(ids
            .iter()
            .map(|id| {
                pools
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| PoolDecode::invalid(*id, "account not found"))
            })
            .collect())
    }
}
