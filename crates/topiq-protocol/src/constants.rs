// ============================================================================
// Ledger constants
// ============================================================================

// --- Staking ----------------------------------------------------------------

/// Denomination the initial registration stake is paid in.
pub const DEFAULT_STAKE_DENOM: &str = "uallo";

/// Page size used when listing account balances before first registration.
pub const BALANCE_PAGE_LIMIT: u64 = 100;

// --- Fixed-point decimals ---------------------------------------------------

/// Fractional digits carried by [`crate::Dec`].
pub const DEC_PRECISION: u32 = 18;

/// 10^DEC_PRECISION.
pub const DEC_SCALE: i128 = 1_000_000_000_000_000_000;

// --- Submission -------------------------------------------------------------

/// Retries after the first attempt for every ledger-bound transaction.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Lower bound of the randomized base backoff (seconds).
pub const DEFAULT_MIN_DELAY_SECS: u64 = 0;

/// Upper bound of the randomized base backoff (seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 2;
