//! NAS error types

use thiserror::Error;

/// NAS error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NasError {
    /// Buffer too short for decoding
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    /// Invalid message type
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    /// Message type is valid but not handled by this codec
    #[error("Unsupported 5GMM message type: 0x{0:02x}")]
    UnsupportedMessageType(u8),

    /// Invalid protocol discriminator
    #[error("Invalid protocol discriminator: {0}")]
    InvalidProtocolDiscriminator(u8),

    /// Invalid security header type
    #[error("Invalid security header type: {0}")]
    InvalidSecurityHeaderType(u8),

    /// Security protected PDU handed to the plain message decoder
    #[error("Security protected message (header type {0}) must be unprotected first")]
    SecurityProtected(u8),
}

/// NAS result type
pub type NasResult<T> = Result<T, NasError>;
