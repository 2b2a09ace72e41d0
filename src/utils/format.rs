use solana_sdk::pubkey::Pubkey;

/// Format a pubkey for display (shortened)
pub fn format_pubkey(pubkey: &Pubkey) -> String {
    let pubkey_str = pubkey.to_string();
    let len = pubkey_str.len();
    format!("{}...{}", &pubkey_str[0..4], &pubkey_str[len - 4..len])
}

/// Format a signed amount with an explicit sign
pub fn format_signed(value: f64, precision: usize) -> String {
    if value >= 0.0 {
        format!("+{:.*}", precision, value)
    } else {
        format!("{:.*}", precision, value)
    }
}
