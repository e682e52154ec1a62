use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

pub const WALLET_ADDRESS_HEX_CHARS: usize = 40;
pub const TX_HASH_HEX_CHARS: usize = 64;
pub const MAX_RECIPIENT_ID_LEN: usize = 64;
pub const MAX_PROOF_SIGNATURE_LEN: usize = 4096;

const _: [(); 16_384 - MAX_PROOF_SIGNATURE_LEN] = [(); 16_384 - MAX_PROOF_SIGNATURE_LEN];

/// Normalize a wallet account address to lowercase `0x` + 40 hex chars.
///
/// Validity is exactly this lexical shape; checksum casing and key ownership
/// are not verified here.
pub fn sanitize_wallet_address(value: &str) -> Result<String> {
    sanitize_hex_identifier(value, WALLET_ADDRESS_HEX_CHARS, "wallet address")
}

/// Normalize a transaction hash to lowercase `0x` + 64 hex chars.
///
/// Claims are deduplicated on the normalized form so case-variant
/// resubmissions of the same transaction collide on the unique index.
pub fn sanitize_tx_hash(value: &str) -> Result<String> {
    sanitize_hex_identifier(value, TX_HASH_HEX_CHARS, "transaction hash")
}

fn sanitize_hex_identifier(value: &str, hex_chars: usize, label: &str) -> Result<String> {
    assert!(hex_chars > 0, "Expected length must be > 0");
    assert!(hex_chars <= 128, "Expected length exceeds defensive bound");
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{label} cannot be empty"));
    }
    let digits = strip_hex_prefix(trimmed);
    if digits.len() != hex_chars {
        return Err(anyhow!(
            "{label} must be 0x followed by {hex_chars} hex characters, got {} characters",
            digits.len()
        ));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("{label} contains non-hex characters"));
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

pub fn sanitize_recipient_id(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Recipient id cannot be empty"));
    }
    if trimmed.len() > MAX_RECIPIENT_ID_LEN {
        return Err(anyhow!(
            "Recipient id exceeds {MAX_RECIPIENT_ID_LEN} character limit"
        ));
    }
    Ok(trimmed.to_string())
}

/// Decode proof-of-control material supplied as hex or base64.
pub fn decode_proof_signature(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Proof signature cannot be empty"));
    }

    match hex::decode(strip_hex_prefix(trimmed)) {
        Ok(bytes) if !bytes.is_empty() => {
            if bytes.len() > MAX_PROOF_SIGNATURE_LEN {
                return Err(anyhow!(
                    "Proof signature exceeds {MAX_PROOF_SIGNATURE_LEN} byte defensive limit"
                ));
            }
            return Ok(bytes);
        }
        Ok(_) => {}
        Err(_) => {}
    }

    let decoded = BASE64_STANDARD
        .decode(trimmed)
        .map_err(|err| anyhow!("Failed to decode proof signature as hex or base64: {err}"))?;
    if decoded.len() > MAX_PROOF_SIGNATURE_LEN {
        return Err(anyhow!(
            "Proof signature exceeds {MAX_PROOF_SIGNATURE_LEN} byte defensive limit"
        ));
    }
    Ok(decoded)
}

pub fn strip_hex_prefix(value: &str) -> &str {
    if value.starts_with("0x") || value.starts_with("0X") {
        &value[2..]
    } else {
        value
    }
}
