//! Binary layout of the `.grove` format: header, checksums, and codec.
//!
//! # Format Structure
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Header (32 bytes)                       │
//! ├────────────────────────────────────────────────────────────┤
//! │              Postcard payload (variable)                   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The header is fixed-layout little-endian so foreign tooling can read
//! the model shape without decoding the payload.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::model::ModelValidationError;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying a grove model file.
pub const MAGIC: &[u8; 4] = b"GROV";

/// Current format version (major). Readers reject anything newer.
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Format Flags
// ============================================================================

/// Bitfield flags for format features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Model contains categorical splits and value tables.
    pub const HAS_CATEGORICAL: u16 = 1 << 0;

    /// Create empty flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create flags from raw bits.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check whether a flag is set.
    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    /// Set a flag.
    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

// ============================================================================
// Format Header
// ============================================================================

/// 32-byte header for the `.grove` format.
///
/// # Layout
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     Magic ("GROV")
/// 4       1     Version major
/// 5       1     Version minor
/// 6       2     Flags (bitfield)
/// 8       4     Payload size (bytes)
/// 12      4     CRC32 checksum of payload
/// 16      4     Numeric feature count
/// 20      4     Categorical feature count
/// 24      4     Output group count
/// 28      4     Tree count
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: FormatFlags,
    pub payload_size: u32,
    pub checksum: u32,
    pub n_numeric_features: u32,
    pub n_categorical_features: u32,
    pub n_groups: u32,
    pub n_trees: u32,
}

impl FormatHeader {
    /// New current-version header for a model of the given shape.
    pub fn new(
        n_numeric_features: u32,
        n_categorical_features: u32,
        n_groups: u32,
        n_trees: u32,
    ) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            flags: FormatFlags::empty(),
            payload_size: 0,
            checksum: 0,
            n_numeric_features,
            n_categorical_features,
            n_groups,
            n_trees,
        }
    }

    /// Serialize to the fixed 32-byte layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf[16..20].copy_from_slice(&self.n_numeric_features.to_le_bytes());
        buf[20..24].copy_from_slice(&self.n_categorical_features.to_le_bytes());
        buf[24..28].copy_from_slice(&self.n_groups.to_le_bytes());
        buf[28..32].copy_from_slice(&self.n_trees.to_le_bytes());
        buf
    }

    /// Parse from the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, FormatError> {
        if &buf[0..4] != MAGIC {
            return Err(FormatError::BadMagic);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(FormatError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let le_u32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            version_major,
            version_minor,
            flags: FormatFlags::from_bits(u16::from_le_bytes([buf[6], buf[7]])),
            payload_size: le_u32(8),
            checksum: le_u32(12),
            n_numeric_features: le_u32(16),
            n_categorical_features: le_u32(20),
            n_groups: le_u32(24),
            n_trees: le_u32(28),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while serializing a model.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Postcard encoding error.
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] postcard::Error),

    /// I/O error while writing the model file.
    #[error("failed to write model file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while parsing model bytes.
///
/// Every variant means the input produces no model at all; there is no
/// partially usable result.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The bytes are not a grove model (wrong magic).
    #[error("not a grove model file")]
    BadMagic,

    /// The model was written by a newer, incompatible format revision.
    #[error("model requires format version {major}.{minor}, reader supports {supported}.x",
            supported = CURRENT_VERSION_MAJOR)]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The input ends before the declared payload does.
    #[error("model data truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The payload checksum does not match the header.
    #[error("payload checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Postcard decoding error.
    #[error("payload decoding failed: {0}")]
    Decoding(#[from] postcard::Error),

    /// A header shape field disagrees with the decoded payload.
    #[error("header declares {field} = {header}, payload carries {payload}")]
    HeaderPayloadMismatch {
        field: &'static str,
        header: u64,
        payload: u64,
    },

    /// The payload decoded but violates a structural invariant.
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
}

/// Errors raised by path-based loading.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read at all.
    #[error("failed to read model file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a valid model.
    #[error(transparent)]
    Format(#[from] FormatError),
}

// ============================================================================
// Codec
// ============================================================================

/// Serialize `payload` behind `header`, filling in size and checksum.
pub fn encode<T: Serialize>(mut header: FormatHeader, payload: &T) -> Result<Vec<u8>, SerializeError> {
    let payload_bytes = postcard::to_allocvec(payload)?;
    header.payload_size = payload_bytes.len() as u32;
    header.checksum = crc32fast::hash(&payload_bytes);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Parse a header + payload from `bytes`, verifying length and checksum.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(FormatHeader, T), FormatError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FormatError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut header_buf = [0u8; HEADER_SIZE];
    header_buf.copy_from_slice(&bytes[..HEADER_SIZE]);
    let header = FormatHeader::from_bytes(&header_buf)?;

    let expected = HEADER_SIZE + header.payload_size as usize;
    if bytes.len() < expected {
        return Err(FormatError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    let payload_bytes = &bytes[HEADER_SIZE..expected];

    let actual_checksum = crc32fast::hash(payload_bytes);
    if actual_checksum != header.checksum {
        return Err(FormatError::ChecksumMismatch {
            expected: header.checksum,
            actual: actual_checksum,
        });
    }

    let payload = postcard::from_bytes(payload_bytes)?;
    Ok((header, payload))
}

// ============================================================================
// Tests
// ============================================================================
