use std::io;

use thiserror::Error;

/// Errors raised while decoding a serialized bitmap.
///
/// Decoding is all or nothing, no partially decoded bitmap is ever returned
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// The header does not start with a known cookie
    #[error("invalid cookie {0:#x}")]
    InvalidCookie(u32),

    /// The header declares more containers than a bitmap can hold
    #[error("invalid container count {0}")]
    InvalidContainerCount(u32),

    /// The input ended before the declared content
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        needed: usize,
        remaining: usize
    },

    /// Container keys are not strictly increasing
    #[error("container keys are not strictly increasing")]
    UnsortedKeys,

    /// A container payload is inconsistent with its descriptor or malformed
    #[error("invalid container with key {key}: {reason}")]
    InvalidContainer {
        key: u16,
        reason: &'static str
    },

    /// A frozen container has an unknown type code
    #[error("invalid container type code {0}")]
    InvalidTypeCode(u8),

    /// A frozen buffer is not suitably aligned to be viewed in place
    #[error("buffer is not aligned to 8 bytes")]
    Misaligned,

    /// A frozen buffer is not exactly as long as its content
    #[error("length mismatch: expected {expected} bytes, found {found}")]
    LengthMismatch {
        expected: usize,
        found: usize
    },

    /// The underlying reader failed
    #[error("failed to read serialized bitmap")]
    Io(#[from] io::Error)
}

/// Errors raised while serializing a bitmap
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The destination is smaller than the serialized size. Nothing was written
    #[error("insufficient buffer: {required} bytes required, {available} available")]
    InsufficientBuffer {
        required: usize,
        available: usize
    },

    /// The underlying writer failed
    #[error("failed to write serialized bitmap")]
    Io(#[from] io::Error)
}
