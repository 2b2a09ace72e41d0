use solana_sdk::signature::Signature;
use thiserror::Error;

/// Errors surfaced by the launchpad library
#[derive(Debug, Error)]
pub enum Error {
    /// Preflight balance check failed; the wallet must be topped up
    #[error("insufficient funds: need {required} lamports, wallet holds {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// No wallet is connected, or it cannot sign
    #[error("no wallet signer available")]
    MissingSigner,

    #[error("wallet declined to sign the transaction")]
    UserRejectedSignature,

    /// Broadcast succeeded but confirmation was not observed in time.
    /// Poll again with the same signature; never resubmit.
    #[error("confirmation timed out for {signature}; the transaction may still land")]
    ConfirmationTimeout { signature: Signature },

    #[error("could not resolve pool for transaction {signature}: {reason}")]
    ResolutionFailed { signature: String, reason: String },

    #[error("price quote for {symbol} is stale")]
    StaleQuote { symbol: String },

    #[error("price fetch for {symbol} failed: {reason}")]
    PriceFetchFailed { symbol: String, reason: String },

    /// The blockhash expired before the transaction was accepted; rebuild and retry
    #[error("blockhash expired before the transaction was accepted")]
    BlockhashExpired,

    #[error("transaction {signature} failed on chain: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    #[error("rpc call '{step}' failed: {message}")]
    Rpc {
        step: &'static str,
        message: String,
        transient: bool,
    },

    #[error("invalid mint intent: {0}")]
    InvalidIntent(String),

    #[error("invalid withdrawal: {0}")]
    InvalidWithdrawal(String),

    #[error("pool {pool} is not usable: {reason}")]
    InvalidPoolState { pool: String, reason: String },

    #[error("failed to build instruction: {0}")]
    Instruction(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure is worth one automatic retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Rpc { transient: true, .. })
    }

    /// Whether the caller may retry the same intent (possibly after user action)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UserRejectedSignature
                | Error::ConfirmationTimeout { .. }
                | Error::BlockhashExpired
                | Error::Rpc { transient: true, .. }
        )
    }
}

impl From<solana_sdk::program_error::ProgramError> for Error {
    fn from(err: solana_sdk::program_error::ProgramError) -> Self {
        Error::Instruction(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_rpc_errors_are_retried() {
        let transient = Error::Rpc { step: "getBalance", message: "timeout".into(), transient: true };
        let permanent = Error::Rpc { step: "getBalance", message: "bad param".into(), transient: false };

        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert!(!Error::MissingSigner.is_transient());
    }

    #[test]
    fn timeout_is_recoverable_but_missing_signer_is_not() {
        let timeout = Error::ConfirmationTimeout { signature: Signature::default() };
        assert!(timeout.is_recoverable());
        assert!(!Error::MissingSigner.is_recoverable());
        assert!(!Error::InsufficientFunds { required: 2, available: 1 }.is_recoverable());
    }
}
