//! # Snapshot Format
//!
//! Binary serialization for wizard snapshots.
//!
//! Format: Header (5 bytes) + postcard-serialized snapshot data.
//! - 4 bytes: Magic ("TRLS")
//! - 1 byte: Version
//!
//! ## Security
//!
//! Size bounds are validated BEFORE deserialization to prevent
//! allocation exhaustion from corrupted or hostile input.

use crate::primitives::{
    FORMAT_VERSION, MAGIC_BYTES, MAX_SNAPSHOT_SIZE, MIN_SNAPSHOT_SIZE,
};
use crate::session::WizardSnapshot;
use crate::types::TrellisError;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all snapshot data.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            magic: MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), TrellisError> {
        if self.magic != MAGIC_BYTES {
            return Err(TrellisError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(TrellisError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrellisError> {
        if bytes.len() < 5 {
            return Err(TrellisError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn snapshot_to_bytes(snapshot: &WizardSnapshot) -> Result<Vec<u8>, TrellisError> {
    let header = SnapshotHeader::new();
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| TrellisError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(5 + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a snapshot from bytes.
///
/// Validates, in order and before touching the payload:
/// 1. Minimum size (header must be present)
/// 2. Maximum size (prevents memory exhaustion)
/// 3. Header magic bytes and version
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<WizardSnapshot, TrellisError> {
    if bytes.len() < MIN_SNAPSHOT_SIZE {
        return Err(TrellisError::DeserializationError(format!(
            "Data too short: minimum {MIN_SNAPSHOT_SIZE} bytes required"
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(TrellisError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[5..];
    let snapshot: WizardSnapshot = postcard::from_bytes(payload).map_err(|e| {
        TrellisError::DeserializationError(format!("Failed to deserialize snapshot: {}", e))
    })?;

    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::WizardSession;
    use crate::stage::Stage;
    use crate::types::{FieldName, FieldValue, SubFormId};

    fn sample_snapshot() -> WizardSnapshot {
        let mut session = WizardSession::new();
        session
            .set_field(
                Stage::FundPosition,
                &SubFormId::new("fund_position"),
                FieldName::new("fund_name"),
                FieldValue::text("Meridian"),
            )
            .expect("set field");
        session.snapshot()
    }

    #[test]
    fn header_roundtrip() {
        let header = SnapshotHeader::new();
        let bytes = header.to_bytes();
        let restored = SnapshotHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored.magic, MAGIC_BYTES);
        assert_eq!(restored.version, FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let snapshot = sample_snapshot();

        let bytes1 = snapshot_to_bytes(&snapshot).expect("first serialize");
        let restored = snapshot_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = snapshot_to_bytes(&restored).expect("second serialize");

        assert_eq!(restored, snapshot);
        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let snapshot = sample_snapshot();
        let mut bytes = snapshot_to_bytes(&snapshot).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");

        let result = snapshot_from_bytes(&bytes);
        assert!(matches!(
            result,
            Err(TrellisError::SerializationError(_))
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let snapshot = sample_snapshot();
        let mut bytes = snapshot_to_bytes(&snapshot).expect("serialize");
        bytes[4] = FORMAT_VERSION + 1;

        let result = snapshot_from_bytes(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        let snapshot = sample_snapshot();
        let bytes = snapshot_to_bytes(&snapshot).expect("serialize");

        let result = snapshot_from_bytes(&bytes[..3]);
        assert!(matches!(
            result,
            Err(TrellisError::DeserializationError(_))
        ));

        let result = snapshot_from_bytes(&bytes[..bytes.len() / 2]);
        assert!(result.is_err(), "half a payload must not parse");
    }

    #[test]
    fn empty_input_rejected() {
        assert!(snapshot_from_bytes(&[]).is_err());
    }
}
