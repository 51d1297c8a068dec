//! Asset naming: the `AssetId` ⇄ `AssetName` bijection and sub-asset
//! resolution.
//!
//! IDs 0 and 1 are reserved for BTC and XCP. Alphabetic names are 4-12
//! characters of base-26 (`B..` first letter, since a leading `A` marks the
//! numeric namespace); numeric assets are `A<id>` with the id strictly
//! above the alphabetic range.

use crate::config::{BTC, MAX_ALPHA_ASSET_ID, MIN_ALPHA_ASSET_ID, XCP};
use crate::errors::{AppResult, LedgerError};
use rusqlite::{params, Connection, OptionalExtension};

const B26_DIGITS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Numeric ID for an asset name.
pub fn generate_asset_id(asset_name: &str) -> Result<u64, LedgerError> {
    match asset_name {
        BTC => return Ok(0),
        XCP => return Ok(1),
        _ => {}
    }

    if asset_name.len() < 4 {
        return Err(LedgerError::AssetName(format!(
            "too short: {asset_name}"
        )));
    }

    if let Some(numeric_part) = asset_name.strip_prefix('A') {
        // Numeric asset: A<id>, above the alphabetic namespace
        let asset_id: u64 = numeric_part
            .parse()
            .map_err(|_| LedgerError::AssetName(format!("non-numeric suffix: {asset_name}")))?;
        if asset_id <= MAX_ALPHA_ASSET_ID {
            return Err(LedgerError::AssetName(format!(
                "numeric asset id below range: {asset_name}"
            )));
        }
        return Ok(asset_id);
    }

    if asset_name.len() > 12 {
        return Err(LedgerError::AssetName(format!("too long: {asset_name}")));
    }

    let mut asset_id: u64 = 0;
    for c in asset_name.bytes() {
        if !c.is_ascii_uppercase() {
            return Err(LedgerError::AssetName(format!(
                "invalid character: {asset_name}"
            )));
        }
        asset_id = asset_id * 26 + u64::from(c - b'A');
    }

    if asset_id < MIN_ALPHA_ASSET_ID {
        return Err(LedgerError::AssetName(format!("too short: {asset_name}")));
    }
    Ok(asset_id)
}

/// Canonical name for an asset ID.
pub fn generate_asset_name(asset_id: u64) -> Result<String, LedgerError> {
    match asset_id {
        0 => return Ok(BTC.to_string()),
        1 => return Ok(XCP.to_string()),
        _ => {}
    }

    if asset_id > MAX_ALPHA_ASSET_ID {
        return Ok(format!("A{asset_id}"));
    }
    if asset_id < MIN_ALPHA_ASSET_ID {
        return Err(LedgerError::AssetId(asset_id));
    }

    let mut digits = Vec::new();
    let mut n = asset_id;
    while n > 0 {
        digits.push(B26_DIGITS[(n % 26) as usize]);
        n /= 26;
    }
    digits.reverse();
    // digits are ASCII by construction
    Ok(String::from_utf8(digits).unwrap_or_default())
}

/// Resolve a sub-asset longname (`PARENT.child`) to its registered short
/// name; names without a dot, and unregistered longnames, pass through.
pub fn resolve_subasset_longname(db: &Connection, asset_name: &str) -> AppResult<String> {
    if !asset_name.contains('.') {
        return Ok(asset_name.to_string());
    }

    let resolved: Option<String> = db
        .query_row(
            "SELECT asset_name FROM assets WHERE asset_longname = ?1",
            params![asset_name],
            |row| row.get(0),
        )
        .optional()?;

    Ok(resolved.unwrap_or_else(|| asset_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn test_reserved_ids() {
        assert_eq!(generate_asset_id("BTC").unwrap(), 0);
        assert_eq!(generate_asset_id("XCP").unwrap(), 1);
        assert_eq!(generate_asset_name(0).unwrap(), "BTC");
        assert_eq!(generate_asset_name(1).unwrap(), "XCP");
    }

    #[test]
    fn test_alphabetic_round_trip() {
        for name in ["BAAA", "TESTASSET", "ZZZZZZZZZZZZ"] {
            let id = generate_asset_id(name).unwrap();
            assert_eq!(generate_asset_name(id).unwrap(), name);
        }
    }

    #[test]
    fn test_numeric_round_trip() {
        let id = MAX_ALPHA_ASSET_ID + 42;
        let name = generate_asset_name(id).unwrap();
        assert_eq!(name, format!("A{id}"));
        assert_eq!(generate_asset_id(&name).unwrap(), id);
    }

    #[test]
    fn test_invalid_names() {
        assert!(generate_asset_id("ABC").is_err()); // too short
        assert!(generate_asset_id("AAAA").is_err()); // numeric namespace, bad suffix
        assert!(generate_asset_id("A100").is_err()); // numeric id below range
        assert!(generate_asset_id("lower").is_err());
        assert!(generate_asset_id("WAYTOOLONGASSETNAME").is_err());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(generate_asset_name(2).is_err());
        assert!(generate_asset_name(MIN_ALPHA_ASSET_ID - 1).is_err());
    }

    #[test]
    fn test_resolve_subasset_longname() {
        let db = Database::in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO assets (asset_name, asset_id, asset_longname, block_index) \
                 VALUES ('A95428956661683176', 95428956661683176, 'PARENT.child', 100)",
                [],
            )
            .unwrap();

        assert_eq!(
            resolve_subasset_longname(db.connection(), "PARENT.child").unwrap(),
            "A95428956661683176"
        );
        assert_eq!(
            resolve_subasset_longname(db.connection(), "PARENT.other").unwrap(),
            "PARENT.other"
        );
        assert_eq!(
            resolve_subasset_longname(db.connection(), "PLAIN").unwrap(),
            "PLAIN"
        );
    }
}
