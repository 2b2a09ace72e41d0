use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, UiInstruction, UiParsedInstruction,
};

use crate::cpmm::PoolDecode;
use crate::error::Result;

/// Outcome of polling a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Not yet seen at the requested commitment
    Pending,
    Confirmed,
    /// Landed but the program returned an error
    Failed(String),
}

/// One instruction executed by a program invoked from a top-level instruction
#[derive(Debug, Clone, PartialEq)]
pub struct InnerEffect {
    /// Index of the top-level instruction that caused it
    pub outer_index: u8,
    /// Position inside that instruction's inner list
    pub position: usize,
    pub program_id: String,
    /// `{"type": .., "info": {..}}` when the RPC node could parse the instruction
    pub parsed: Option<Value>,
}

impl InnerEffect {
    pub fn kind(&self) -> Option<&str> {
        self.parsed.as_ref()?.get("type")?.as_str()
    }

    pub fn info(&self) -> Option<&Value> {
        self.parsed.as_ref()?.get("info")
    }
}

/// What a confirmed transaction did, reduced to what pool resolution needs
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEffects {
    pub signature: String,
    /// Set when the transaction landed with an error
    pub error: Option<String>,
    /// Inner instructions grouped by top-level instruction, in execution order
    pub inner: Vec<Vec<InnerEffect>>,
}

impl TransactionEffects {
    /// Reduce a `jsonParsed` transaction to its inner instruction effects
    pub fn from_encoded(signature: &str, tx: &EncodedConfirmedTransactionWithStatusMeta) -> Self {
        let meta = tx.transaction.meta.as_ref();
        let error = meta.and_then(|m| m.err.as_ref()).map(|e| e.to_string());

        let groups = match meta.map(|m| &m.inner_instructions) {
            Some(OptionSerializer::Some(groups)) => groups.as_slice(),
            _ => &[],
        };

        let inner = groups
            .iter()
            .map(|group| {
                group
                    .instructions
                    .iter()
                    .enumerate()
                    .map(|(position, ix)| inner_effect(group.index, position, ix))
                    .collect()
            })
            .collect();

        Self {
            signature: signature.to_string(),
            error,
            inner,
        }
    }

    pub fn has_inner_effects(&self) -> bool {
        self.inner.iter().any(|group| !group.is_empty())
    }

    pub fn all_inner(&self) -> impl Iterator<Item = &InnerEffect> {
        self.inner.iter().flatten()
    }
}

fn inner_effect(outer_index: u8, position: usize, ix: &UiInstruction) -> InnerEffect {
    let (program_id, parsed) = match ix {
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => {
            (parsed.program_id.clone(), Some(parsed.parsed.clone()))
        }
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(decoded)) => {
            (decoded.program_id.clone(), None)
        }
        // Compiled instructions only carry an account index
        UiInstruction::Compiled(_) => (String::new(), None),
    };

    InnerEffect {
        outer_index,
        position,
        program_id,
        parsed,
    }
}

/// The RPC surface the launchpad needs from a Solana node
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash>;

    /// Native balance in lamports
    async fn balance(&self, address: &Pubkey) -> Result<u64>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64>;

    /// `None` when the node has no record of the transaction
    async fn parsed_transaction(&self, signature: &str) -> Result<Option<TransactionEffects>>;

    /// Sum of `owner`'s token accounts for `mint`, in raw units
    async fn token_balance_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64>;

    /// Raw amount in one token account; 0 when the account does not exist
    async fn token_account_balance(&self, account: &Pubkey) -> Result<u64>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature>;

    async fn signature_status(&self, signature: &Signature) -> Result<ConfirmationStatus>;

    /// One decode per id, in input order; ids that no longer exist come back `Invalid`
    async fn pool_states(&self, ids: &[Pubkey]) -> Result<Vec<PoolDecode>>;
}
