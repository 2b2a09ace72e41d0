use log::{debug, info, warn};
use solana_sdk::signature::Signature;
use solana_sdk::signer::SignerError;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::PreparedTransaction;
use crate::solana::{ChainRpc, ConfirmationStatus, WalletSigner};

/// Bounded wait for a broadcast transaction to confirm
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    /// Soft deadline; the transaction may still land afterwards
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ConfirmPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.confirm_timeout(),
            poll_interval: config.confirm_poll_interval(),
        }
    }
}

/// Signs, broadcasts and confirms prepared transactions. Never persists anything.
pub struct SubmissionPipeline<R: ChainRpc, W: WalletSigner> {
    rpc: Arc<R>,
    wallet: Arc<W>,
    policy: ConfirmPolicy,
}

impl<R: ChainRpc, W: WalletSigner> SubmissionPipeline<R, W> {
    pub fn new(rpc: Arc<R>, wallet: Arc<W>, policy: ConfirmPolicy) -> Self {
        Self { rpc, wallet, policy }
    }

    /// Sign and broadcast `prepared`, then wait for confirmation
    pub async fn submit(&self, prepared: PreparedTransaction) -> Result<Signature> {
        let signed = self.sign(prepared).await?;
        let signature = self.rpc.send_transaction(&signed).await?;
        info!("Broadcast transaction {}", signature);

        self.await_confirmation(&signature).await?;
        Ok(signature)
    }

    /// Attach a fresh blockhash, then collect the wallet's signature
    /// before any generated keypair signs
    pub async fn sign(&self, mut prepared: PreparedTransaction) -> Result<Transaction> {
        let payer = self.wallet.pubkey().ok_or(Error::MissingSigner)?;
        prepared.fee_payer = payer;

        let blockhash = self.rpc.latest_blockhash().await?;
        prepared.recent_blockhash = Some(blockhash);

        let mut transaction = Transaction::new_with_payer(&prepared.instructions, Some(&payer));
        transaction.message.recent_blockhash = blockhash;

        let mut transaction = self.wallet.sign_transaction(transaction).await?;

        for signer in &prepared.signers {
            transaction
                .try_partial_sign(&[signer], blockhash)
                .map_err(|e| match e {
                    SignerError::KeypairPubkeyMismatch => Error::Instruction(
                        "generated keypair is not a signer of this transaction".to_string(),
                    ),
                    other => Error::Instruction(other.to_string()),
                })?;
        }

        if !transaction.is_signed() {
            return Err(Error::MissingSigner);
        }

        debug!(
            "Signed transaction with {} instructions, {} co-signers",
            prepared.instructions.len(),
            prepared.signers.len()
        );
        Ok(transaction)
    }

    /// Poll an already broadcast signature until it confirms, fails or the deadline passes.
    /// Recovering from `ConfirmationTimeout` means calling this again, never resubmitting.
    pub async fn await_confirmation(&self, signature: &Signature) -> Result<()> {
        let deadline = Instant::now() + self.policy.timeout;

        loop {
            match self.rpc.signature_status(signature).await {
                Ok(ConfirmationStatus::Confirmed) => {
                    info!("Transaction {} confirmed", signature);
                    return Ok(());
                }
                Ok(ConfirmationStatus::Failed(reason)) => {
                    return Err(Error::TransactionFailed {
                        signature: *signature,
                        reason,
                    });
                }
                Ok(ConfirmationStatus::Pending) => {}
                // A failed poll says nothing about the transaction itself
                Err(e) => warn!("Status poll for {} failed: {}", signature, e),
            }

            if Instant::now() >= deadline {
                return Err(Error::ConfirmationTimeout {
                    signature: *signature,
                });
            }
            sleep(self.policy.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::mock::MockRpc;
    use crate::solana::Wallet;
    use async_trait::async_trait;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::{Keypair, Signer};
    use solana_sdk::system_instruction;
    use std::sync::Mutex;

    fn policy() -> ConfirmPolicy {
        ConfirmPolicy {
            timeout: Duration::from_millis(40),
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Records how many signatures were already present when asked to sign
    struct RecordingWallet {
        inner: Wallet,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl WalletSigner for RecordingWallet {
        fn pubkey(&self) -> Option<Pubkey> {
            self.inner.pubkey()
        }

        async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction> {
            let present = transaction
                .signatures
                .iter()
                .filter(|s| **s != Signature::default())
                .count();
            self.seen.lock().unwrap().push(present);
            self.inner.sign_transaction(transaction).await
        }
    }

    struct RejectingWallet(Pubkey);

    #[async_trait]
    impl WalletSigner for RejectingWallet {
        fn pubkey(&self) -> Option<Pubkey> {
            Some(self.0)
        }

        async fn sign_transaction(&self, _transaction: Transaction) -> Result<Transaction> {
            Err(Error::UserRejectedSignature)
        }
    }

    struct Disconnected;

    #[async_trait]
    impl WalletSigner for Disconnected {
        fn pubkey(&self) -> Option<Pubkey> {
            None
        }

        async fn sign_transaction(&self, _transaction: Transaction) -> Result<Transaction> {
            Err(Error::MissingSigner)
        }
    }

    fn prepared_with_cosigner(payer: Pubkey) -> PreparedTransaction {
        let mint = Keypair::new();
        let ix = system_instruction::create_account(&payer, &mint.pubkey(), 1, 82, &spl_token::id());
        PreparedTransaction::new(vec![ix], vec![mint], Pubkey::default())
    }

    #[tokio::test]
    async fn wallet_signs_before_generated_keypair() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_status(ConfirmationStatus::Confirmed);
        let wallet = Arc::new(RecordingWallet {
            inner: Wallet::from_keypair(Keypair::new()),
            seen: Mutex::new(Vec::new()),
        });
        let payer = wallet.pubkey().unwrap();
        let pipeline = SubmissionPipeline::new(rpc.clone(), wallet.clone(), policy());

        let signature = pipeline.submit(prepared_with_cosigner(payer)).await.unwrap();

        assert_eq!(*wallet.seen.lock().unwrap(), vec![0]);
        let sent = rpc.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_signed());
        assert_eq!(sent[0].message.account_keys[0], payer);
        assert_eq!(sent[0].signatures[0], signature);
        assert_eq!(rpc.blockhash_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pending_past_deadline_is_a_timeout_not_a_failure() {
        let rpc = Arc::new(MockRpc::new());
        let wallet = Arc::new(Wallet::from_keypair(Keypair::new()));
        let payer = wallet.pubkey().unwrap();
        let pipeline = SubmissionPipeline::new(rpc.clone(), wallet, policy());

        let err = pipeline.submit(prepared_with_cosigner(payer)).await.unwrap_err();
        let signature = match err {
            Error::ConfirmationTimeout { signature } => signature,
            other => panic!("unexpected error: {other:?}"),
        };

        // Re-polling the same signature recovers without a second broadcast
        rpc.push_status(ConfirmationStatus::Confirmed);
        pipeline.await_confirmation(&signature).await.unwrap();
        assert_eq!(rpc.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn on_chain_failure_is_reported() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_status(ConfirmationStatus::Pending);
        rpc.push_status(ConfirmationStatus::Failed("custom program error: 0x1".to_string()));
        let wallet = Arc::new(Wallet::from_keypair(Keypair::new()));
        let payer = wallet.pubkey().unwrap();
        let pipeline = SubmissionPipeline::new(rpc, wallet, policy());

        let err = pipeline.submit(prepared_with_cosigner(payer)).await.unwrap_err();
        assert!(matches!(err, Error::TransactionFailed { .. }));
    }

    #[tokio::test]
    async fn rejection_and_missing_wallet_never_broadcast() {
        let rpc = Arc::new(MockRpc::new());
        let payer = Pubkey::new_unique();

        let rejecting = SubmissionPipeline::new(rpc.clone(), Arc::new(RejectingWallet(payer)), policy());
        let err = rejecting.submit(prepared_with_cosigner(payer)).await.unwrap_err();
        assert!(matches!(err, Error::UserRejectedSignature));

        let disconnected = SubmissionPipeline::new(rpc.clone(), Arc::new(Disconnected), policy());
        let err = disconnected.submit(prepared_with_cosigner(payer)).await.unwrap_err();
        assert!(matches!(err, Error::MissingSigner));

        assert!(rpc.sent.lock().unwrap().is_empty());
    }
}
