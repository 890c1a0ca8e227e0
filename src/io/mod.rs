//! Model storage: the `.grove` binary format.
//!
//! A model file is a 32-byte header followed by a Postcard-encoded payload.
//! The header carries the format version, a CRC32 of the payload, and the
//! model shape; the payload mirrors the runtime types. See [`format`] for
//! the byte layout and [`convert`] for the parse/validate pipeline.

pub mod convert;
pub mod format;
pub mod payload;

pub use format::{
    decode, encode, FormatError, FormatFlags, FormatHeader, LoadError, SerializeError,
    CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, HEADER_SIZE, MAGIC,
};

pub use payload::{CatTablePayload, MetaPayload, Payload, PayloadV1, TreePayload};
