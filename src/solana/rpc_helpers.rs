use log::warn;
use serde_json::Value;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_sdk::transaction::TransactionError;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;

use crate::error::{Error, Result};

/// How often transient RPC failures are retried
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(300),
        }
    }
}

/// Run `action`, retrying transient failures according to `config`
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, step: &'static str, action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let strategy = FixedInterval::new(config.delay).take(config.max_retries);
    RetryIf::spawn(strategy, action, |err: &Error| {
        let retry = err.is_transient();
        if retry {
            warn!("Transient failure in {}, retrying: {}", step, err);
        }
        retry
    })
    .await
}

/// Map a client error onto the crate taxonomy, remembering which step failed
pub fn rpc_error(step: &'static str, err: ClientError) -> Error {
    if let Some(TransactionError::BlockhashNotFound) = err.get_transaction_error() {
        return Error::BlockhashExpired;
    }

    let transient = match err.kind() {
        ClientErrorKind::Io(_) => true,
        ClientErrorKind::Reqwest(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status().map_or(false, |status| status.is_server_error())
        }
        _ => false,
    };

    Error::Rpc {
        step,
        message: err.to_string(),
        transient,
    }
}

/// Raw amount from a `jsonParsed` token account
pub fn parsed_token_amount(account: &Value) -> Option<u64> {
    account
        .pointer("/data/parsed/info/tokenAmount/amount")?
        .as_str()?
        .parse()
        .ok()
}
