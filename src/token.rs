//! ERC-20 unit arithmetic and call encoding for the canonical tip token.

use anyhow::{Result, anyhow};

use crate::address::{sanitize_wallet_address, strip_hex_prefix};

/// `balanceOf(address)` function selector
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

/// `transfer(address,uint256)` function selector
pub const TRANSFER_SELECTOR: &str = "a9059cbb";

const MAX_TOKEN_DECIMALS: u32 = 36;

fn pow10(decimals: u32) -> u128 {
    assert!(
        decimals <= MAX_TOKEN_DECIMALS,
        "Token decimals exceed defensive limit"
    );
    10u128.pow(decimals)
}

/// Convert a human-scale decimal string ("100", "2.50") to base units.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<u128> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Amount cannot be empty"));
    }
    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(anyhow!("Amount {trimmed:?} has no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("Amount {trimmed:?} is not an unsigned decimal"));
    }
    if frac.len() > decimals as usize {
        return Err(anyhow!(
            "Amount {trimmed:?} has more than {decimals} fractional digits"
        ));
    }

    let whole_part: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| anyhow!("Amount {trimmed:?} integer part overflows"))?
    };
    let frac_part: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded
            .parse()
            .map_err(|_| anyhow!("Amount {trimmed:?} fractional part overflows"))?
    };

    whole_part
        .checked_mul(pow10(decimals))
        .and_then(|scaled| scaled.checked_add(frac_part))
        .ok_or_else(|| anyhow!("Amount {trimmed:?} overflows base-unit arithmetic"))
}

/// Whole-token units, truncated. Used for shortfall messages.
pub fn whole_units(base_units: u128, decimals: u32) -> u128 {
    base_units / pow10(decimals)
}

/// Format base units as a human-readable token amount.
pub fn format_token(base_units: u128, decimals: u32, symbol: &str) -> String {
    let scale = pow10(decimals);
    let whole = base_units / scale;
    let frac = base_units % scale;
    if frac == 0 {
        format!("{whole} {symbol}")
    } else {
        let frac_str = format!("{frac:0>width$}", width = decimals as usize);
        let trimmed = frac_str.trim_end_matches('0');
        format!("{whole}.{trimmed} {symbol}")
    }
}

/// Calldata for `balanceOf(owner)`.
pub fn balance_of_calldata(owner: &str) -> Result<String> {
    let owner = sanitize_wallet_address(owner)?;
    Ok(format!(
        "0x{BALANCE_OF_SELECTOR}{}",
        pad_address_word(&owner)
    ))
}

/// Calldata for `transfer(recipient, amount)`.
pub fn transfer_calldata(recipient: &str, amount_base_units: u128) -> Result<String> {
    let recipient = sanitize_wallet_address(recipient)?;
    Ok(format!(
        "0x{TRANSFER_SELECTOR}{}{}",
        pad_address_word(&recipient),
        pad_quantity_word(amount_base_units)
    ))
}

/// Parse a JSON-RPC hex quantity (`"0x..."`) into base units.
pub fn parse_hex_quantity(value: &str) -> Result<u128> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Err(anyhow!("Hex quantity cannot be empty"));
    }
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 32 {
        return Err(anyhow!("Hex quantity {value:?} exceeds 128-bit bounds"));
    }
    u128::from_str_radix(significant, 16)
        .map_err(|err| anyhow!("Failed to parse hex quantity {value:?}: {err}"))
}

fn pad_address_word(address: &str) -> String {
    format!("{:0>64}", strip_hex_prefix(address))
}

fn pad_quantity_word(value: u128) -> String {
    format!("{value:064x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_unit_scaling() {
        assert_eq!(to_base_units("100", 6).unwrap(), 100_000_000);
        assert_eq!(to_base_units("2.50", 6).unwrap(), 2_500_000);
        assert_eq!(to_base_units("0.000001", 6).unwrap(), 1);
        assert_eq!(to_base_units("7", 0).unwrap(), 7);
        assert!(to_base_units("0.0000001", 6).is_err());
        assert!(to_base_units("-1", 6).is_err());
        assert!(to_base_units("1.2.3", 6).is_err());
        assert!(to_base_units("", 6).is_err());
    }

    #[test]
    fn token_formatting() {
        assert_eq!(format_token(0, 6, "USDC"), "0 USDC");
        assert_eq!(format_token(100_000_000, 6, "USDC"), "100 USDC");
        assert_eq!(format_token(2_500_000, 6, "USDC"), "2.5 USDC");
        assert_eq!(format_token(123_456, 6, "USDC"), "0.123456 USDC");
        assert_eq!(whole_units(99_900_000, 6), 99);
    }

    #[test]
    fn balance_of_encoding() {
        let data = balance_of_calldata("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        assert_eq!(
            data,
            format!(
                "0x70a08231{}abcdef0123456789abcdef0123456789abcdef01",
                "0".repeat(24)
            )
        );
        assert_eq!(data.len(), 2 + 8 + 64);
    }

    #[test]
    fn transfer_encoding() {
        let data =
            transfer_calldata("0xabcdef0123456789abcdef0123456789abcdef01", 100_000_000).unwrap();
        assert!(data.starts_with("0xa9059cbb"));
        assert_eq!(data.len(), 2 + 8 + 64 + 64);
        assert!(data.ends_with(&format!("{:064x}", 100_000_000u128)));
    }

    #[test]
    fn hex_quantity_parsing() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x5f5e100").unwrap(), 100_000_000);
        let word = format!("0x{:064x}", 250_000_000u128);
        assert_eq!(parse_hex_quantity(&word).unwrap(), 250_000_000);
        assert!(parse_hex_quantity("0x").is_err());
        assert!(parse_hex_quantity(&format!("0x1{}", "0".repeat(32))).is_err());
    }
}
