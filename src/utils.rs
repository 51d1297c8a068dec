//! Numeric and content helpers shared by the engines.

pub mod content;
pub mod math;

/// Canonical identifier of a bet match: the two member hashes joined.
pub fn make_id(tx0_hash: &str, tx1_hash: &str) -> String {
    format!("{}_{}", tx0_hash, tx1_hash)
}

/// True when `options` only uses bits defined in `allowed`.
pub fn active_options(allowed: i64, options: i64) -> bool {
    options & allowed == options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id() {
        assert_eq!(make_id("aa", "bb"), "aa_bb");
    }

    #[test]
    fn test_active_options() {
        assert!(active_options(0b11, 0b01));
        assert!(active_options(0b11, 0b11));
        assert!(!active_options(0b01, 0b10));
        assert!(active_options(0b01, 0));
    }
}
