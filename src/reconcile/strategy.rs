use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use std::str::FromStr;

use crate::cpmm::{POOL_STATE_LEN, PROGRAM_ID};
use crate::solana::{InnerEffect, TransactionEffects};

/// How to find the pool allocation among a creation transaction's inner instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionStrategy {
    /// The system `createAccount` whose owner is the pool program and whose
    /// size is a pool state account
    #[default]
    ByProgram,
    /// A fixed inner instruction: `outer` top-level index, `inner` position within it
    ByPosition { outer: u8, inner: usize },
}

impl ResolutionStrategy {
    pub fn locate(&self, effects: &TransactionEffects) -> Result<Pubkey, String> {
        match *self {
            ResolutionStrategy::ByProgram => effects
                .all_inner()
                .find(|effect| is_pool_allocation(effect))
                .ok_or_else(|| "no pool account allocation found".to_string())
                .and_then(new_account),
            ResolutionStrategy::ByPosition { outer, inner } => effects
                .all_inner()
                .find(|effect| effect.outer_index == outer && effect.position == inner)
                .ok_or_else(|| format!("no inner instruction at {}:{}", outer, inner))
                .and_then(new_account),
        }
    }
}

fn is_pool_allocation(effect: &InnerEffect) -> bool {
    if effect.program_id != system_program::id().to_string() || effect.kind() != Some("createAccount") {
        return false;
    }
    let Some(info) = effect.info() else {
        return false;
    };
    info.get("owner").and_then(Value::as_str) == Some(PROGRAM_ID.to_string().as_str())
        && info.get("space").and_then(Value::as_u64) == Some(POOL_STATE_LEN as u64)
}

fn new_account(effect: &InnerEffect) -> Result<Pubkey, String> {
    let raw = effect
        .info()
        .and_then(|info| info.get("newAccount"))
        .and_then(Value::as_str)
        .ok_or_else(|| "allocation has no newAccount field".to_string())?;
    Pubkey::from_str(raw).map_err(|e| format!("malformed newAccount '{}': {}", raw, e))
}
