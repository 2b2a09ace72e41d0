pub mod client;
pub mod rpc;
pub mod rpc_helpers;
pub mod wallet;

#[cfg(test)]
pub(crate) mod mock;

pub use client::SolanaClient;
pub use rpc::ChainRpc;
pub use rpc::ConfirmationStatus;
pub use rpc::InnerEffect;
pub use rpc::TransactionEffects;
pub use rpc_helpers::RetryConfig;
pub use wallet::Wallet;
pub use wallet::WalletSigner;

use crate::config::Config;
use crate::error::Result;

/// Create a Solana client from the application configuration
pub fn create_client_from_config(config: &Config) -> SolanaClient {
    SolanaClient::new(&config.rpc_url)
}

/// Load the signing wallet named by the application configuration
pub fn load_wallet_from_config(config: &Config) -> Result<Wallet> {
    Wallet::from_file(&config.keypair_path)
}
