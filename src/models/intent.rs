use regex::Regex;
use serde::{Deserialize, Serialize};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::Keypair;
use std::sync::OnceLock;

use crate::error::{Error, Result};

// Metaplex metadata account limits
pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_SYMBOL_LENGTH: usize = 10;
pub const MAX_URI_LENGTH: usize = 200;
/// Keeps whole-token supplies representable in a u64
pub const MAX_DECIMALS: u8 = 9;

/// Where a mint intent came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintOrigin {
    /// Entered by the user
    Original,
    /// Copied from a trending token; authorities are always revoked
    Copied,
}

/// A request to create a new token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintIntent {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image_uri: String,
    /// Total supply, already scaled by `10^decimals`
    pub initial_supply: u64,
    pub decimals: u8,
    pub creator: Pubkey,
    pub origin: MintOrigin,
}

impl MintIntent {
    /// Check the intent against the metadata program's limits
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.name.len() > MAX_NAME_LENGTH {
            return Err(Error::InvalidIntent(format!(
                "name must be 1-{} bytes",
                MAX_NAME_LENGTH
            )));
        }
        if !symbol_pattern().is_match(&self.symbol) {
            return Err(Error::InvalidIntent(format!(
                "symbol '{}' must be 1-{} alphanumeric characters",
                self.symbol, MAX_SYMBOL_LENGTH
            )));
        }
        if self.image_uri.len() > MAX_URI_LENGTH {
            return Err(Error::InvalidIntent(format!(
                "uri must be at most {} bytes",
                MAX_URI_LENGTH
            )));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(Error::InvalidIntent(format!(
                "decimals must be at most {}",
                MAX_DECIMALS
            )));
        }
        if self.initial_supply == 0 {
            return Err(Error::InvalidIntent("initial supply must be positive".to_string()));
        }
        Ok(())
    }
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{1,10}$").expect("static regex"))
}

/// Authority handling for a launch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub revoke_mint_authority: bool,
    pub revoke_freeze_authority: bool,
}

impl LaunchOptions {
    /// Copied tokens always ship with a fixed supply and no freeze authority
    pub fn effective_for(self, origin: MintOrigin) -> Self {
        match origin {
            MintOrigin::Copied => Self {
                revoke_mint_authority: true,
                revoke_freeze_authority: true,
            },
            MintOrigin::Original => self,
        }
    }
}

/// An ordered instruction list ready for the submission pipeline
pub struct PreparedTransaction {
    pub instructions: Vec<Instruction>,
    /// Keypairs generated for this attempt that must co-sign
    pub signers: Vec<Keypair>,
    pub fee_payer: Pubkey,
    /// Attached by the pipeline right before signing
    pub recent_blockhash: Option<Hash>,
}

impl PreparedTransaction {
    pub fn new(instructions: Vec<Instruction>, signers: Vec<Keypair>, fee_payer: Pubkey) -> Self {
        Self {
            instructions,
            signers,
            fee_payer,
            recent_blockhash: None,
        }
    }

    /// Program ids in instruction order
    pub fn program_ids(&self) -> Vec<Pubkey> {
        self.instructions.iter().map(|ix| ix.program_id).collect()
    }
}

impl std::fmt::Debug for PreparedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use solana_sdk::signer::Signer;
        f.debug_struct("PreparedTransaction")
            .field("instructions", &self.instructions.len())
            .field("signers", &self.signers.iter().map(|k| k.pubkey()).collect::<Vec<_>>())
            .field("fee_payer", &self.fee_payer)
            .field("recent_blockhash", &self.recent_blockhash)
            .finish()
    }
}
