//! # Canonical Export Module
//!
//! > **The "Redb Compromise":**
//! > - Runtime: CORE uses `redb` for durability and ACID transactions.
//! > - Verification: `redb` files are NOT guaranteed bit-identical across runs.
//! > - Mandate: `export_canonical()` serializes one application to a bit-exact
//! >   `postcard` stream. **This export is the Source of Truth for audits and
//! >   cross-system transfer.**
//!
//! Determinism comes for free from the snapshot layout: every collection in
//! `WizardSnapshot` is a `BTreeMap`, so postcard emits entries in a single
//! canonical order.

use crate::primitives::MAX_SNAPSHOT_SIZE;
use crate::session::WizardSnapshot;
use crate::types::{ApplicationId, TrellisError};
use serde::{Deserialize, Serialize};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for canonical export format.
pub const CANONICAL_MAGIC: [u8; 4] = *b"TREX"; // Trellis Export

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Maximum committed stage payloads a canonical import may claim.
///
/// The wizard has a fixed number of stages, so anything larger is corrupt
/// or hostile and is rejected before the data section is deserialized.
pub const MAX_IMPORT_COMMITTED_COUNT: u64 = crate::stage::SEQUENCE.len() as u64;

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    /// Magic bytes to identify the format.
    pub magic: [u8; 4],

    /// Format version for compatibility.
    pub version: u8,

    /// The application this export belongs to.
    pub application: u64,

    /// Number of committed stage payloads in the snapshot.
    pub committed_count: u64,

    /// Checksum of the data section (simple XOR-based for determinism).
    pub checksum: u64,
}

impl CanonicalHeader {
    /// Create a new header for the given application.
    #[must_use]
    pub fn new(application: ApplicationId, committed_count: u64, checksum: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            application: application.0,
            committed_count,
            checksum,
        }
    }

    /// Validate the header.
    ///
    /// # Security Note
    ///
    /// Error messages are intentionally generic to avoid leaking format details
    /// to potential attackers.
    pub fn validate(&self) -> Result<(), TrellisError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(TrellisError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(TrellisError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// CHECKSUM
// =============================================================================

/// Compute a deterministic checksum of a byte section.
///
/// Uses XOR-based hashing for simplicity and determinism.
/// No floating point, no randomness.
///
/// # Security Note
///
/// This is **NOT** a cryptographic hash. It is designed for:
/// - Detecting accidental data corruption
/// - Verifying export/import integrity
/// - Quick equality checks
///
/// It is **NOT** designed for:
/// - Detecting intentional tampering
/// - Collision resistance
///
/// For security-sensitive use cases, compute an additional cryptographic
/// hash (e.g., BLAKE3 via the `crypto-hash` feature) on the exported bytes.
#[must_use]
pub fn canonical_checksum(data: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    for (index, byte) in data.iter().enumerate() {
        hash ^= u64::from(*byte).rotate_left((index % 61) as u32);
    }
    hash ^= (data.len() as u64).rotate_left(3);
    hash
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export one application's snapshot to canonical postcard format.
///
/// Format:
/// ```text
/// [header_len: u32 LE] [CanonicalHeader (postcard)] [WizardSnapshot (postcard)]
/// ```
///
/// # Errors
///
/// Returns `TrellisError::SerializationError` if serialization fails.
pub fn export_canonical(
    application: ApplicationId,
    snapshot: &WizardSnapshot,
) -> Result<Vec<u8>, TrellisError> {
    // Serialize data first so the header can carry its checksum.
    let data_bytes = postcard::to_stdvec(snapshot)
        .map_err(|e| TrellisError::SerializationError(format!("Data: {}", e)))?;

    let header = CanonicalHeader::new(
        application,
        snapshot.committed.len() as u64,
        canonical_checksum(&data_bytes),
    );
    let header_bytes = postcard::to_stdvec(&header)
        .map_err(|e| TrellisError::SerializationError(format!("Header: {}", e)))?;

    // Combine: [header_len: u32] [header] [data]
    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);

    Ok(result)
}

/// Import an application snapshot from canonical postcard format.
///
/// # Errors
///
/// Returns `TrellisError::SerializationError` if the framing or header is
/// invalid, and `TrellisError::DeserializationError` if validated framing
/// wraps a data section that does not decode.
pub fn import_canonical(data: &[u8]) -> Result<(ApplicationId, WizardSnapshot), TrellisError> {
    if data.len() < 4 {
        return Err(TrellisError::SerializationError(
            "Data too short".to_string(),
        ));
    }

    // Read header length
    let header_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if data.len() < 4 + header_len {
        return Err(TrellisError::SerializationError(
            "Data too short for header".to_string(),
        ));
    }

    // Deserialize header
    let header: CanonicalHeader = postcard::from_bytes(&data[4..4 + header_len])
        .map_err(|e| TrellisError::SerializationError(format!("Header: {}", e)))?;

    header.validate()?;

    // Validate size limits BEFORE deserializing the snapshot to prevent DoS
    if header.committed_count > MAX_IMPORT_COMMITTED_COUNT {
        return Err(TrellisError::SerializationError(format!(
            "Committed count {} exceeds maximum allowed {}",
            header.committed_count, MAX_IMPORT_COMMITTED_COUNT
        )));
    }
    let data_section = &data[4 + header_len..];
    if data_section.len() > MAX_SNAPSHOT_SIZE {
        return Err(TrellisError::SerializationError(format!(
            "Data section {} bytes exceeds maximum allowed {}",
            data_section.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    // Verify checksum before decoding
    let computed_checksum = canonical_checksum(data_section);
    if computed_checksum != header.checksum {
        return Err(TrellisError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed_checksum
        )));
    }

    let snapshot: WizardSnapshot = postcard::from_bytes(data_section)
        .map_err(|e| TrellisError::DeserializationError(format!("Data: {}", e)))?;

    // Verify counts
    if snapshot.committed.len() as u64 != header.committed_count {
        return Err(TrellisError::SerializationError(
            "Committed count mismatch".to_string(),
        ));
    }

    Ok((ApplicationId(header.application), snapshot))
}

/// Verify a snapshot against its canonical export.
///
/// This is used to verify `redb` data against the canonical format.
pub fn verify_canonical(
    application: ApplicationId,
    snapshot: &WizardSnapshot,
    canonical_data: &[u8],
) -> Result<bool, TrellisError> {
    let (imported_id, imported) = import_canonical(canonical_data)?;
    Ok(imported_id == application && imported == *snapshot)
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// Compute a BLAKE3 cryptographic hash of the canonical export.
///
/// This provides a collision-resistant hash for audit trails, complementing
/// the faster XOR-based checksum used for integrity checking.
///
/// Returns the hash as a hex string (64 characters). A snapshot that
/// fails to export yields the error, never a hash over partial data.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
/// Add `trellis-core = { version = "...", features = ["crypto-hash"] }` to enable.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(
    application: ApplicationId,
    snapshot: &WizardSnapshot,
) -> Result<String, TrellisError> {
    let data = export_canonical(application, snapshot)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

/// Verify a snapshot against a BLAKE3 hash.
///
/// Returns `true` if the snapshot's canonical export matches the provided hash.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn verify_crypto_hash(
    application: ApplicationId,
    snapshot: &WizardSnapshot,
    expected_hash: &str,
) -> Result<bool, TrellisError> {
    let actual_hash = canonical_crypto_hash(application, snapshot)?;
    // Constant-time comparison would be ideal here for security,
    // but for integrity verification (not authentication), timing attacks
    // are not a concern.
    Ok(actual_hash == expected_hash)
}

/// Compute a BLAKE3 hash of raw bytes.
///
/// Utility function for hashing arbitrary data.
///
/// # Requires
///
/// This function is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
