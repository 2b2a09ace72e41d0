use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Signs on behalf of the user; the launchpad never sees key material
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// `None` when no wallet is connected
    fn pubkey(&self) -> Option<Pubkey>;

    /// Add the wallet's signature, keeping any signatures already present
    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction>;

    async fn sign_all_transactions(&self, transactions: Vec<Transaction>) -> Result<Vec<Transaction>> {
        let mut signed = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            signed.push(self.sign_transaction(transaction).await?);
        }
        Ok(signed)
    }
}

/// Handles wallet operations and transaction signing
pub struct Wallet {
    keypair: Keypair,
}

impl Wallet {
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a wallet from a keypair file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|e| Error::Config(format!("failed to read keypair file {:?}: {}", path, e)))?;

        Self::from_bytes(&bytes)
            .ok_or_else(|| Error::Config(format!("failed to parse keypair file {:?}", path)))
    }

    /// Accepts a JSON byte array (solana-keygen format) or a base58 string
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if let Ok(keypair_bytes) = serde_json::from_slice::<Vec<u8>>(bytes) {
            if let Ok(keypair) = Keypair::from_bytes(&keypair_bytes) {
                return Some(Self { keypair });
            }
        }

        let bytes_str = String::from_utf8_lossy(bytes).trim().to_string();
        let decoded = bs58::decode(&bytes_str).into_vec().ok()?;
        Keypair::from_bytes(&decoded).ok().map(|keypair| Self { keypair })
    }
}

#[async_trait]
impl WalletSigner for Wallet {
    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut transaction: Transaction) -> Result<Transaction> {
        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| match e {
                solana_sdk::signer::SignerError::KeypairPubkeyMismatch => Error::MissingSigner,
                other => Error::Instruction(other.to_string()),
            })?;
        Ok(transaction)
    }
}
