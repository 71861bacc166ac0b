//! 5GMM information elements
//!
//! Based on 3GPP TS 24.501 Section 9.11.3

/// Access type (TS 24.501 Section 9.11.3.20)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessType {
    ThreeGppAccess = 1,
    Non3gppAccess = 2,
    ThreeGppAndNon3gppAccess = 3,
}

impl TryFrom<u8> for AccessType {
    type Error = u8;

    /// Fails with the offending code
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ThreeGppAccess),
            2 => Ok(Self::Non3gppAccess),
            3 => Ok(Self::ThreeGppAndNon3gppAccess),
            other => Err(other),
        }
    }
}

/// De-registration type (TS 24.501 Section 9.11.3.20)
///
/// The access type is kept as the raw code received on the wire. Code 0 is
/// reserved and has to be rejected by the procedure, not by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeRegistrationType {
    /// Switch off
    pub switch_off: bool,
    /// Re-registration required
    pub re_registration_required: bool,
    /// Access type code
    pub access_type: u8,
}

impl Default for DeRegistrationType {
    fn default() -> Self {
        Self {
            switch_off: false,
            re_registration_required: false,
            access_type: AccessType::ThreeGppAccess as u8,
        }
    }
}

impl DeRegistrationType {
    pub fn new(switch_off: bool, re_registration_required: bool, access_type: u8) -> Self {
        Self { switch_off, re_registration_required, access_type }
    }

    /// Encode to half-byte
    pub fn encode(&self) -> u8 {
        let switch_off_bit = if self.switch_off { 0x08 } else { 0 };
        let re_reg_bit = if self.re_registration_required { 0x04 } else { 0 };
        switch_off_bit | re_reg_bit | (self.access_type & 0x03)
    }

    /// Decode from half-byte
    pub fn decode(byte: u8) -> Self {
        Self {
            switch_off: (byte & 0x08) != 0,
            re_registration_required: (byte & 0x04) != 0,
            access_type: byte & 0x03,
        }
    }

    /// Typed access type, `None` for a reserved code
    pub fn access_type(&self) -> Option<AccessType> {
        AccessType::try_from(self.access_type).ok()
    }
}

/// Type of identity (TS 24.501 Section 9.11.3.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MobileIdentityType {
    NoIdentity = 0,
    Suci = 1,
    FiveGGuti = 2,
    Imei = 3,
    FiveGSTmsi = 4,
    Imeisv = 5,
    MacAddress = 6,
    Eui64 = 7,
}

impl From<u8> for MobileIdentityType {
    /// Only the low three bits carry the type of identity
    fn from(value: u8) -> Self {
        match value & 0x07 {
            0 => Self::NoIdentity,
            1 => Self::Suci,
            2 => Self::FiveGGuti,
            3 => Self::Imei,
            4 => Self::FiveGSTmsi,
            5 => Self::Imeisv,
            6 => Self::MacAddress,
            _ => Self::Eui64,
        }
    }
}
