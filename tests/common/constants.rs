//! Shared constants for end-to-end tests

// ============================================================================
// Observers
// ============================================================================

/// Observer of the reference scenario
pub const OBSERVER_A: &str = "a@x.com";

/// Second observer
pub const OBSERVER_B: &str = "b@x.com";

// ============================================================================
// Source records
// ============================================================================

/// Record ID used by most scenarios
pub const SOURCE_1_ID: &str = "REC1";

/// Second record ID
pub const SOURCE_2_ID: &str = "REC2";

/// Sub-part of a multi-part record
pub const SUB_ID: &str = "LOG_0003";

// ============================================================================
// Timing
// ============================================================================

/// TTL of the reference scenario
pub const SCENARIO_TTL_MS: i64 = 60_000;

/// Timeout for the fake task manager to accept connections
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// HTTP timeout given to the task manager client under test
pub const CLIENT_TIMEOUT_SEC: u64 = 5;

/// Task manager's answer to a duplicate submission
pub const ALREADY_QUEUED: &str = "Job already in DB, not adding it!";
