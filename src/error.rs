// src/error.rs
//! Error types for tag inspection.
//!
//! None of these are fatal: the dump turns them into report lines.

use thiserror::Error;

use crate::tag::TechnologyTag;

/// Failure to read one technology's parameters off a tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("{0} is not present on this tag")]
    NotPresent(TechnologyTag),

    #[error("{0} has no extras")]
    MissingExtras(TechnologyTag),

    #[error("{tech} extras lack \"{key}\"")]
    MissingField { tech: TechnologyTag, key: &'static str },

    #[error("{tech} extra \"{key}\" has the wrong type")]
    WrongType { tech: TechnologyTag, key: &'static str },

    /// The recognized descriptor defect; the dump repairs and retries once.
    #[error("{0}")]
    MalformedDescriptor(String),
}

impl AccessError {
    pub fn is_malformed_descriptor(&self) -> bool {
        matches!(self, AccessError::MalformedDescriptor(_))
    }
}

/// A descriptor that cannot be turned into a tag handle, or repaired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("unsupported descriptor version {0}")]
    UnsupportedVersion(u32),

    #[error("descriptor has no identifier")]
    MissingIdentifier,

    #[error("descriptor lists {codes} technologies but {extras} extras")]
    LengthMismatch { codes: usize, extras: usize },

    #[error("unknown technology code {0}")]
    UnknownTechnology(i32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NdefError {
    #[error("NDEF message is empty")]
    Empty,

    #[error("NDEF record truncated at offset {0}")]
    Truncated(usize),

    #[error("chunked NDEF records are not supported")]
    Chunked,

    #[error("no NDEF TLV found")]
    NoTlv,

    #[error("invalid type name format {0}")]
    InvalidTnf(u8),

    #[error("NDEF {field} is {len} bytes, at most {max} fit")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("nothing scanned yet")]
    Empty,
}

pub type AccessResult<T> = Result<T, AccessError>;
