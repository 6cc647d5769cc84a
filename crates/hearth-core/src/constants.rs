//! TigerStyle constants for Hearth
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Transaction Limits
// =============================================================================

/// Minimum transaction timeout in milliseconds (1 sec)
pub const TXN_TIMEOUT_MS_MIN: u64 = 1_000;

/// Default transaction timeout in milliseconds (30 sec)
///
/// Applied when a client requests a timeout of zero (commonly "let the
/// device decide").
pub const TXN_TIMEOUT_MS_DEFAULT: u64 = 30_000;

/// Maximum transaction timeout in milliseconds (5 min)
pub const TXN_TIMEOUT_MS_MAX: u64 = 300_000;

/// Minimum inactivity sub-timeout in milliseconds, when one is configured
pub const TXN_IDLE_TIMEOUT_MS_MIN: u64 = 500;

/// Maximum number of attributes governed by a single transaction
pub const TXN_ATTRS_COUNT_MAX: usize = 16;

// =============================================================================
// Attribute Limits
// =============================================================================

/// Maximum number of records in a single governed attribute value
pub const RECORDS_PER_ATTRIBUTE_COUNT_MAX: usize = 255;

/// Maximum length of an owner (client/session) identifier in bytes
pub const OWNER_ID_LENGTH_BYTES_MAX: usize = 128;

// =============================================================================
// Timeout Sweeper
// =============================================================================

/// Default sweep interval in milliseconds
///
/// Upper bound on how long an expired transaction can linger before the
/// background sweeper reclaims it; the lazy expiry check on each operation
/// keeps the externally visible behavior exact regardless.
pub const SWEEP_INTERVAL_MS_DEFAULT: u64 = 250;

/// Minimum sweep interval in milliseconds
pub const SWEEP_INTERVAL_MS_MIN: u64 = 10;

/// Maximum sweep interval in milliseconds (1 min)
pub const SWEEP_INTERVAL_MS_MAX: u64 = 60_000;

// Compile-time assertions for constant validity
const _: () = {
    assert!(TXN_TIMEOUT_MS_MIN <= TXN_TIMEOUT_MS_DEFAULT);
    assert!(TXN_TIMEOUT_MS_DEFAULT <= TXN_TIMEOUT_MS_MAX);
    assert!(TXN_IDLE_TIMEOUT_MS_MIN < TXN_TIMEOUT_MS_MIN);
    assert!(TXN_ATTRS_COUNT_MAX >= 1);
    assert!(RECORDS_PER_ATTRIBUTE_COUNT_MAX >= 1);
    assert!(SWEEP_INTERVAL_MS_MIN <= SWEEP_INTERVAL_MS_DEFAULT);
    assert!(SWEEP_INTERVAL_MS_DEFAULT <= SWEEP_INTERVAL_MS_MAX);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_bounds_are_ordered() {
        assert!(TXN_TIMEOUT_MS_MIN <= TXN_TIMEOUT_MS_DEFAULT);
        assert!(TXN_TIMEOUT_MS_DEFAULT <= TXN_TIMEOUT_MS_MAX);
    }

    #[test]
    fn test_limits_have_units_in_names() {
        // This test documents the naming convention
        // All time limits end in _MS_
        // All count limits end in _COUNT_ / _BYTES_
        let _: u64 = TXN_TIMEOUT_MS_MAX;
        let _: usize = TXN_ATTRS_COUNT_MAX;
        let _: usize = OWNER_ID_LENGTH_BYTES_MAX;
    }
}
