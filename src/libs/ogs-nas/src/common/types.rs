//! Common NAS types
//!
//! Based on 3GPP TS 24.007 and TS 24.501

use crate::error::{NasError, NasResult};

/// Extended protocol discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolDiscriminator {
    /// 5GS Mobility Management (5GMM)
    FiveGsMobilityManagement = 0x7e,
    /// 5GS Session Management (5GSM)
    FiveGsSessionManagement = 0x2e,
}

impl TryFrom<u8> for ProtocolDiscriminator {
    type Error = NasError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x7e => Ok(Self::FiveGsMobilityManagement),
            0x2e => Ok(Self::FiveGsSessionManagement),
            _ => Err(NasError::InvalidProtocolDiscriminator(value)),
        }
    }
}

/// Security header type (TS 24.501 Section 9.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    /// Plain NAS message, not security protected
    #[default]
    PlainNas = 0,
    /// Integrity protected
    IntegrityProtected = 1,
    /// Integrity protected and ciphered
    IntegrityProtectedAndCiphered = 2,
    /// Integrity protected with new 5G NAS security context
    IntegrityProtectedWithNew5gNasSecurityContext = 3,
    /// Integrity protected and ciphered with new 5G NAS security context
    IntegrityProtectedAndCipheredWithNew5gNasSecurityContext = 4,
}

impl TryFrom<u8> for SecurityHeaderType {
    type Error = NasError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::PlainNas),
            1 => Ok(Self::IntegrityProtected),
            2 => Ok(Self::IntegrityProtectedAndCiphered),
            3 => Ok(Self::IntegrityProtectedWithNew5gNasSecurityContext),
            4 => Ok(Self::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext),
            _ => Err(NasError::InvalidSecurityHeaderType(value)),
        }
    }
}

impl SecurityHeaderType {
    /// Pick the header type for a downlink message
    pub fn for_protection(ciphered: bool, new_context: bool) -> Self {
        match (ciphered, new_context) {
            (false, false) => Self::IntegrityProtected,
            (true, false) => Self::IntegrityProtectedAndCiphered,
            (false, true) => Self::IntegrityProtectedWithNew5gNasSecurityContext,
            (true, true) => Self::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext,
        }
    }

    pub fn is_protected(&self) -> bool {
        *self != Self::PlainNas
    }

    pub fn is_ciphered(&self) -> bool {
        matches!(
            self,
            Self::IntegrityProtectedAndCiphered
                | Self::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext
        )
    }

    pub fn is_new_context(&self) -> bool {
        matches!(
            self,
            Self::IntegrityProtectedWithNew5gNasSecurityContext
                | Self::IntegrityProtectedAndCipheredWithNew5gNasSecurityContext
        )
    }

    /// Decode from the low nibble of the second octet
    pub fn decode(byte: u8) -> NasResult<Self> {
        Self::try_from(byte & 0x0f)
    }
}

/// NAS key set identifier (TS 24.501 Section 9.11.3.32)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySetIdentifier {
    /// TSC (Type of Security Context): 0 = native, 1 = mapped
    pub tsc: u8,
    /// NAS Key Set Identifier value (0-6, 7 = no key available)
    pub value: u8,
}

impl Default for KeySetIdentifier {
    fn default() -> Self {
        Self { tsc: 0, value: Self::NO_KEY_AVAILABLE }
    }
}

impl KeySetIdentifier {
    /// No key available
    pub const NO_KEY_AVAILABLE: u8 = 7;

    /// Create a new key set identifier
    pub fn new(tsc: u8, value: u8) -> Self {
        Self {
            tsc: tsc & 0x01,
            value: value & 0x07,
        }
    }

    /// Encode to half-byte (4 bits)
    pub fn encode(&self) -> u8 {
        ((self.tsc & 0x01) << 3) | (self.value & 0x07)
    }

    /// Decode from half-byte
    pub fn decode(byte: u8) -> Self {
        Self {
            tsc: (byte >> 3) & 0x01,
            value: byte & 0x07,
        }
    }

    pub fn is_key_available(&self) -> bool {
        self.value != Self::NO_KEY_AVAILABLE
    }
}
