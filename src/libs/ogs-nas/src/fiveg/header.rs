//! 5GS NAS message header
//!
//! Based on 3GPP TS 24.501 Section 9.1

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::error::{NasError, NasResult};
use crate::common::types::{ProtocolDiscriminator, SecurityHeaderType};

/// 5GMM plain header length (EPD, security header type, message type)
pub const FIVEG_NAS_HEADER_LEN: usize = 3;

/// 5GS NAS security header length
pub const FIVEG_NAS_SECURITY_HEADER_LEN: usize = 7;

/// 5GMM message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FiveGmmMessageType {
    RegistrationRequest = 0x41,
    RegistrationAccept = 0x42,
    RegistrationComplete = 0x43,
    RegistrationReject = 0x44,
    DeregistrationRequestFromUe = 0x45,
    DeregistrationAcceptFromUe = 0x46,
    DeregistrationRequestToUe = 0x47,
    DeregistrationAcceptToUe = 0x48,
    ServiceRequest = 0x4C,
    ServiceReject = 0x4D,
    ServiceAccept = 0x4E,
    ConfigurationUpdateCommand = 0x54,
    ConfigurationUpdateComplete = 0x55,
    AuthenticationRequest = 0x56,
    AuthenticationResponse = 0x57,
    AuthenticationReject = 0x58,
    AuthenticationFailure = 0x59,
    AuthenticationResult = 0x5A,
    IdentityRequest = 0x5B,
    IdentityResponse = 0x5C,
    SecurityModeCommand = 0x5D,
    SecurityModeComplete = 0x5E,
    SecurityModeReject = 0x5F,
    FiveGmmStatus = 0x64,
    Notification = 0x65,
    NotificationResponse = 0x66,
    UlNasTransport = 0x67,
    DlNasTransport = 0x68,
}

impl TryFrom<u8> for FiveGmmMessageType {
    type Error = NasError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x41 => Ok(Self::RegistrationRequest),
            0x42 => Ok(Self::RegistrationAccept),
            0x43 => Ok(Self::RegistrationComplete),
            0x44 => Ok(Self::RegistrationReject),
            0x45 => Ok(Self::DeregistrationRequestFromUe),
            0x46 => Ok(Self::DeregistrationAcceptFromUe),
            0x47 => Ok(Self::DeregistrationRequestToUe),
            0x48 => Ok(Self::DeregistrationAcceptToUe),
            0x4C => Ok(Self::ServiceRequest),
            0x4D => Ok(Self::ServiceReject),
            0x4E => Ok(Self::ServiceAccept),
            0x54 => Ok(Self::ConfigurationUpdateCommand),
            0x55 => Ok(Self::ConfigurationUpdateComplete),
            0x56 => Ok(Self::AuthenticationRequest),
            0x57 => Ok(Self::AuthenticationResponse),
            0x58 => Ok(Self::AuthenticationReject),
            0x59 => Ok(Self::AuthenticationFailure),
            0x5A => Ok(Self::AuthenticationResult),
            0x5B => Ok(Self::IdentityRequest),
            0x5C => Ok(Self::IdentityResponse),
            0x5D => Ok(Self::SecurityModeCommand),
            0x5E => Ok(Self::SecurityModeComplete),
            0x5F => Ok(Self::SecurityModeReject),
            0x64 => Ok(Self::FiveGmmStatus),
            0x65 => Ok(Self::Notification),
            0x66 => Ok(Self::NotificationResponse),
            0x67 => Ok(Self::UlNasTransport),
            0x68 => Ok(Self::DlNasTransport),
            _ => Err(NasError::InvalidMessageType(value)),
        }
    }
}

/// 5GMM plain NAS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiveGsNasHeader {
    /// Extended protocol discriminator
    pub extended_protocol_discriminator: u8,
    /// Security header type
    pub security_header_type: SecurityHeaderType,
    /// Message type
    pub message_type: u8,
}

impl FiveGsNasHeader {
    /// Create a new 5GMM header
    pub fn new_gmm(message_type: FiveGmmMessageType) -> Self {
        Self {
            extended_protocol_discriminator: ProtocolDiscriminator::FiveGsMobilityManagement as u8,
            security_header_type: SecurityHeaderType::PlainNas,
            message_type: message_type as u8,
        }
    }

    /// Encode header to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.extended_protocol_discriminator);
        buf.put_u8(self.security_header_type as u8);
        buf.put_u8(self.message_type);
    }

    /// Decode header from bytes
    pub fn decode(buf: &mut Bytes) -> NasResult<Self> {
        if buf.remaining() < FIVEG_NAS_HEADER_LEN {
            return Err(NasError::BufferTooShort { expected: FIVEG_NAS_HEADER_LEN, actual: buf.remaining() });
        }

        let extended_protocol_discriminator = buf.get_u8();
        let security_header_type = SecurityHeaderType::decode(buf.get_u8())?;
        let message_type = buf.get_u8();

        Ok(Self {
            extended_protocol_discriminator,
            security_header_type,
            message_type,
        })
    }
}

/// 5GS NAS security header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FiveGsNasSecurityHeader {
    /// Extended protocol discriminator
    pub extended_protocol_discriminator: u8,
    /// Security header type
    pub security_header_type: SecurityHeaderType,
    /// Message authentication code
    pub message_authentication_code: [u8; 4],
    /// Sequence number
    pub sequence_number: u8,
}

impl FiveGsNasSecurityHeader {
    /// Encode security header to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.extended_protocol_discriminator);
        buf.put_u8(self.security_header_type as u8);
        buf.put_slice(&self.message_authentication_code);
        buf.put_u8(self.sequence_number);
    }

    /// Decode security header from bytes
    pub fn decode(buf: &mut Bytes) -> NasResult<Self> {
        if buf.remaining() < FIVEG_NAS_SECURITY_HEADER_LEN {
            return Err(NasError::BufferTooShort {
                expected: FIVEG_NAS_SECURITY_HEADER_LEN,
                actual: buf.remaining(),
            });
        }

        let extended_protocol_discriminator = buf.get_u8();
        let security_header_type = SecurityHeaderType::decode(buf.get_u8())?;
        let mut message_authentication_code = [0u8; 4];
        buf.copy_to_slice(&mut message_authentication_code);
        let sequence_number = buf.get_u8();

        Ok(Self {
            extended_protocol_discriminator,
            security_header_type,
            message_authentication_code,
            sequence_number,
        })
    }
}

/// Read the security header type of a 5GMM PDU without consuming it
pub fn peek_security_header_type(pdu: &[u8]) -> NasResult<SecurityHeaderType> {
    if pdu.len() < 2 {
        return Err(NasError::BufferTooShort { expected: 2, actual: pdu.len() });
    }
    let epd = ProtocolDiscriminator::try_from(pdu[0])?;
    if epd != ProtocolDiscriminator::FiveGsMobilityManagement {
        return Err(NasError::InvalidProtocolDiscriminator(pdu[0]));
    }
    SecurityHeaderType::decode(pdu[1])
}
