//! # Primitives Module
//!
//! Tuning constants for the Trellis CORE.
//!
//! All completion arithmetic is integer basis points. These constants are
//! the single source of truth for thresholds and boundary limits; nothing
//! else in the engine hardcodes them.

/// One whole stage expressed in basis points.
///
/// 10,000 bp = 100%. Completion percentages are carried as basis points
/// end to end so that 37.5% is exactly 3,750 with no floating point.
pub const FULL_COMPLETION_BP: u16 = 10_000;

/// Magic bytes identifying the Trellis snapshot format.
pub const MAGIC_BYTES: [u8; 4] = *b"TRLS";

/// Current snapshot format version.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum length of a field name in bytes.
///
/// Field names are short snake_case identifiers. Anything longer is a
/// malformed client.
pub const MAX_FIELD_NAME_LENGTH: usize = 256;

/// Maximum length of a text field value in bytes.
pub const MAX_TEXT_VALUE_LENGTH: usize = 65_536;

/// Maximum number of entries in a list-valued field.
pub const MAX_LIST_VALUES: usize = 1_000;

/// Maximum number of required fields a single sub-form may declare.
pub const MAX_REQUIRED_FIELDS: usize = 256;

/// Maximum number of rows in a collateral asset schedule.
pub const MAX_SCHEDULE_ROWS: usize = 200;

/// Maximum number of authorised signatories on one application.
pub const MAX_SIGNATORIES: usize = 50;

/// Exact length of an ISIN code.
pub const ISIN_LENGTH: usize = 12;

/// Maximum size of a serialized application snapshot in bytes (16 MB).
///
/// Checked before deserialization to bound memory use on corrupt or
/// hostile input.
pub const MAX_SNAPSHOT_SIZE: usize = 16 * 1024 * 1024;

/// Minimum size of a serialized application snapshot in bytes.
///
/// Magic bytes (4) + version (1). Anything smaller cannot carry a header.
pub const MIN_SNAPSHOT_SIZE: usize = 5;
