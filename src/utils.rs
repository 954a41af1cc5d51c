//! Utility functions for id generation and string normalization

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique entity id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Trimmed, lowercased form used for every name/email/department comparison.
/// Assignment values are stored as display names, so lookups must agree on
/// one normal form.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Dr.Sasikala.R  "), "dr.sasikala.r");
        assert_eq!(normalize(""), "");
    }
}
