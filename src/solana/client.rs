use async_trait::async_trait;
use log::{debug, warn};
use solana_client::client_error::ClientErrorKind;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::UiTransactionEncoding;
use std::str::FromStr;
use std::time::Duration;

use crate::cpmm::{attach_vault_amounts, decode_pool_batch, token_account_amount, vault_keys, PoolDecode};
use crate::error::{Error, Result};
use crate::solana::rpc::{ChainRpc, ConfirmationStatus, TransactionEffects};
use crate::solana::rpc_helpers::{parsed_token_amount, rpc_error, with_retry, RetryConfig};

/// `getMultipleAccounts` accepts at most this many keys
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// Wrapper around the Solana RPC client with retry logic and error handling
pub struct SolanaClient {
    rpc_client: RpcClient,
    retry_config: RetryConfig,
}

impl SolanaClient {
    /// Create a new Solana client with the given RPC URL
    pub fn new(rpc_url: &str) -> Self {
        Self::new_with_config(rpc_url, CommitmentConfig::confirmed(), RetryConfig::default())
    }

    pub fn new_with_config(
        rpc_url: &str,
        commitment: CommitmentConfig,
        retry_config: RetryConfig,
    ) -> Self {
        let rpc_client = RpcClient::new_with_timeout_and_commitment(
            rpc_url.to_string(),
            Duration::from_secs(30),
            commitment,
        );

        Self {
            rpc_client,
            retry_config,
        }
    }

    /// Get the current Solana slot
    pub async fn get_slot(&self) -> Result<u64> {
        debug!("Getting current slot");
        with_retry(&self.retry_config, "getSlot", || async {
            self.rpc_client
                .get_slot()
                .await
                .map_err(|e| rpc_error("getSlot", e))
        })
        .await
    }

    /// Get multiple accounts, chunked to the RPC limit; missing accounts are `None`
    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        let mut accounts = Vec::with_capacity(pubkeys.len());
        for chunk in pubkeys.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let fetched = with_retry(&self.retry_config, "getMultipleAccounts", || async {
                self.rpc_client
                    .get_multiple_accounts(chunk)
                    .await
                    .map_err(|e| rpc_error("getMultipleAccounts", e))
            })
            .await?;
            accounts.extend(fetched);
        }
        Ok(accounts)
    }
}

#[async_trait]
impl ChainRpc for SolanaClient {
    async fn latest_blockhash(&self) -> Result<Hash> {
        with_retry(&self.retry_config, "getLatestBlockhash", || async {
            self.rpc_client
                .get_latest_blockhash()
                .await
                .map_err(|e| rpc_error("getLatestBlockhash", e))
        })
        .await
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64> {
        with_retry(&self.retry_config, "getBalance", || async {
            self.rpc_client
                .get_balance(address)
                .await
                .map_err(|e| rpc_error("getBalance", e))
        })
        .await
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        with_retry(&self.retry_config, "getMinimumBalanceForRentExemption", || async {
            self.rpc_client
                .get_minimum_balance_for_rent_exemption(data_len)
                .await
                .map_err(|e| rpc_error("getMinimumBalanceForRentExemption", e))
        })
        .await
    }

    async fn parsed_transaction(&self, signature: &str) -> Result<Option<TransactionEffects>> {
        let parsed_signature = Signature::from_str(signature).map_err(|e| Error::Rpc {
            step: "getTransaction",
            message: format!("invalid signature '{}': {}", signature, e),
            transient: false,
        })?;

        let fetched = with_retry(&self.retry_config, "getTransaction", || async {
            let config = RpcTransactionConfig {
                encoding: Some(UiTransactionEncoding::JsonParsed),
                commitment: Some(CommitmentConfig::confirmed()),
                max_supported_transaction_version: Some(0),
            };
            match self
                .rpc_client
                .get_transaction_with_config(&parsed_signature, config)
                .await
            {
                Ok(tx) => Ok(Some(tx)),
                // The node answers `null` for unknown signatures
                Err(e) if matches!(e.kind(), ClientErrorKind::SerdeJson(_)) => Ok(None),
                Err(e) => Err(rpc_error("getTransaction", e)),
            }
        })
        .await?;

        Ok(fetched.map(|tx| TransactionEffects::from_encoded(signature, &tx)))
    }

    async fn token_balance_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64> {
        let accounts = with_retry(&self.retry_config, "getTokenAccountsByOwner", || async {
            self.rpc_client
                .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
                .await
                .map_err(|e| rpc_error("getTokenAccountsByOwner", e))
        })
        .await?;

        let mut total: u64 = 0;
        for keyed in accounts {
            let value = serde_json::to_value(&keyed.account)?;
            match parsed_token_amount(&value) {
                Some(amount) => total = total.saturating_add(amount),
                None => warn!("Token account {} has no parsed amount", keyed.pubkey),
            }
        }
        Ok(total)
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<u64> {
        let fetched = self.get_multiple_accounts(std::slice::from_ref(account)).await?;
        match fetched.into_iter().next().flatten() {
            Some(data) => token_account_amount(&data).ok_or_else(|| Error::Rpc {
                step: "getMultipleAccounts",
                message: format!("{} is not a token account", account),
                transient: false,
            }),
            None => Ok(0),
        }
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        // Not retried: a resend of a landed transaction would be rejected anyway,
        // and the caller owns the resubmission decision
        self.rpc_client
            .send_transaction(transaction)
            .await
            .map_err(|e| rpc_error("sendTransaction", e))
    }

    async fn signature_status(&self, signature: &Signature) -> Result<ConfirmationStatus> {
        let status = with_retry(&self.retry_config, "getSignatureStatus", || async {
            self.rpc_client
                .get_signature_status_with_commitment(signature, CommitmentConfig::confirmed())
                .await
                .map_err(|e| rpc_error("getSignatureStatus", e))
        })
        .await?;

        Ok(match status {
            None => ConfirmationStatus::Pending,
            Some(Ok(())) => ConfirmationStatus::Confirmed,
            Some(Err(e)) => ConfirmationStatus::Failed(e.to_string()),
        })
    }

    async fn pool_states(&self, ids: &[Pubkey]) -> Result<Vec<PoolDecode>> {
        let accounts = self.get_multiple_accounts(ids).await?;
        let batch = decode_pool_batch(ids, accounts);

        let vault_accounts = self.get_multiple_accounts(&vault_keys(&batch)).await?;
        let results = attach_vault_amounts(batch, vault_accounts);

        debug!("Decoded {} pool states", results.len());
        Ok(results)
    }
}
