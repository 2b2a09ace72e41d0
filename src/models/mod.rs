pub mod intent;
pub mod pool;
mod price;
mod token;

pub use intent::LaunchOptions;
pub use intent::MintIntent;
pub use intent::MintOrigin;
pub use intent::PreparedTransaction;
pub use intent::MAX_DECIMALS;
pub use pool::BaselineAmount;
pub use pool::LivePool;
pub use pool::PoolCandidate;
pub use pool::PoolKeys;
pub use pool::PoolState;
pub use price::PriceQuote;
pub use token::TokenRecord;
