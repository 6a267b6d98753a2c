use ethers::types::U256;
use ethers::utils::{self, ConversionError};

pub const GWEI_DECIMALS: u32 = 9;

/// Format an integer amount with `decimals` fractional digits.
///
/// ethers pads the fraction to the full decimal count; trailing zeros are
/// dropped here but one digit is always kept, so whole amounts render as
/// `20.0` and zero renders as `0.0`.
pub fn format_units(amount: U256, decimals: u32) -> Result<String, ConversionError> {
    utils::format_units(amount, decimals).map(trim_fraction)
}

pub fn format_ether(wei: U256) -> String {
    trim_fraction(utils::format_ether(wei))
}

pub fn format_gwei(wei: U256) -> Result<String, ConversionError> {
    format_units(wei, GWEI_DECIMALS)
}

fn trim_fraction(formatted: String) -> String {
    if !formatted.contains('.') {
        return format!("{}.0", formatted);
    }
    let mut trimmed = formatted.trim_end_matches('0').to_string();
    if trimmed.ends_with('.') {
        trimmed.push('0');
    }
    trimmed
}
