mod types;

pub use types::load_config;
pub use types::Config;
pub use types::LaunchFees;
pub use types::SeedFees;
pub use types::WithdrawFees;
