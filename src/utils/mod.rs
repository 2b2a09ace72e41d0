mod convert;
mod format;

pub use convert::amount_to_ui;
pub use convert::lamports_to_sol;
pub use convert::pubkey_from_str;
pub use convert::sol_to_lamports;
pub use convert::ui_to_amount;
pub use convert::whole_to_amount;
pub use format::format_pubkey;
pub use format::format_signed;
