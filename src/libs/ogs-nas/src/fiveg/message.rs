//! 5GS NAS messages
//!
//! Based on 3GPP TS 24.501 Sections 8.2.12 and 8.2.13

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::error::{NasError, NasResult};
use crate::common::types::*;
use super::types::*;
use super::header::*;

/// 5GMM message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiveGmmMessage {
    DeregistrationRequestFromUe(DeregistrationRequestFromUe),
    DeregistrationAcceptFromUe,
}

impl FiveGmmMessage {
    pub fn message_type(&self) -> FiveGmmMessageType {
        match self {
            Self::DeregistrationRequestFromUe(_) => FiveGmmMessageType::DeregistrationRequestFromUe,
            Self::DeregistrationAcceptFromUe => FiveGmmMessageType::DeregistrationAcceptFromUe,
        }
    }
}

/// 5GS mobile identity (TS 24.501 Section 9.11.3.4)
///
/// Contents of the LV-E element are kept undecoded; the de-registration
/// procedure never looks past the identity type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MobileIdentity {
    pub contents: Bytes,
}

impl MobileIdentity {
    pub fn no_identity() -> Self {
        Self { contents: Bytes::from_static(&[MobileIdentityType::NoIdentity as u8]) }
    }

    pub fn identity_type(&self) -> MobileIdentityType {
        self.contents
            .first()
            .map_or(MobileIdentityType::NoIdentity, |&b| MobileIdentityType::from(b))
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.contents.len() as u16);
        buf.put_slice(&self.contents);
    }

    pub fn decode(buf: &mut Bytes) -> NasResult<Self> {
        if buf.remaining() < 2 {
            return Err(NasError::BufferTooShort { expected: 2, actual: buf.remaining() });
        }
        let length = buf.get_u16() as usize;
        if buf.remaining() < length {
            return Err(NasError::BufferTooShort { expected: length, actual: buf.remaining() });
        }
        Ok(Self { contents: buf.split_to(length) })
    }
}

/// Deregistration Request from UE (TS 24.501 Section 8.2.12)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeregistrationRequestFromUe {
    /// De-registration type
    pub de_registration_type: DeRegistrationType,
    /// ngKSI
    pub ngksi: KeySetIdentifier,
    /// 5GS mobile identity
    pub mobile_identity: MobileIdentity,
}

impl DeregistrationRequestFromUe {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8((self.ngksi.encode() << 4) | self.de_registration_type.encode());
        self.mobile_identity.encode(buf);
    }

    pub fn decode(buf: &mut Bytes) -> NasResult<Self> {
        if buf.remaining() < 1 {
            return Err(NasError::BufferTooShort { expected: 1, actual: buf.remaining() });
        }
        let first_byte = buf.get_u8();
        let de_registration_type = DeRegistrationType::decode(first_byte & 0x0F);
        let ngksi = KeySetIdentifier::decode((first_byte >> 4) & 0x0F);
        let mobile_identity = MobileIdentity::decode(buf)?;
        Ok(Self { de_registration_type, ngksi, mobile_identity })
    }
}

/// Build a plain 5GMM message
pub fn build_5gmm_message(msg: &FiveGmmMessage) -> Bytes {
    let mut buf = BytesMut::new();

    FiveGsNasHeader::new_gmm(msg.message_type()).encode(&mut buf);

    match msg {
        FiveGmmMessage::DeregistrationRequestFromUe(m) => m.encode(&mut buf),
        // Deregistration Accept (UE originating) has no body
        FiveGmmMessage::DeregistrationAcceptFromUe => {}
    }

    buf.freeze()
}

/// Decode a plain 5GMM message
///
/// Security protected PDUs are refused; strip the security header first.
pub fn decode_5gmm_message(pdu: &[u8]) -> NasResult<FiveGmmMessage> {
    let security_header_type = peek_security_header_type(pdu)?;
    if security_header_type.is_protected() {
        return Err(NasError::SecurityProtected(security_header_type as u8));
    }

    let mut buf = Bytes::copy_from_slice(pdu);
    let header = FiveGsNasHeader::decode(&mut buf)?;
    let message_type = FiveGmmMessageType::try_from(header.message_type)?;

    match message_type {
        FiveGmmMessageType::DeregistrationRequestFromUe => Ok(
            FiveGmmMessage::DeregistrationRequestFromUe(DeregistrationRequestFromUe::decode(&mut buf)?),
        ),
        FiveGmmMessageType::DeregistrationAcceptFromUe => Ok(FiveGmmMessage::DeregistrationAcceptFromUe),
        other => Err(NasError::UnsupportedMessageType(other as u8)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deregistration_request_wire_format() {
        // switch off, 3GPP access, ngKSI 2, SUCI identity
        let pdu = [0x7e, 0x00, 0x45, 0x29, 0x00, 0x03, 0x01, 0x02, 0xf8];
        let msg = decode_5gmm_message(&pdu).unwrap();
        let FiveGmmMessage::DeregistrationRequestFromUe(req) = &msg else {
            panic!("unexpected message {:?}", msg);
        };
        assert!(req.de_registration_type.switch_off);
        assert_eq!(req.de_registration_type.access_type, 1);
        assert_eq!(req.ngksi.value, 2);
        assert_eq!(req.mobile_identity.identity_type(), MobileIdentityType::Suci);

        assert_eq!(&build_5gmm_message(&msg)[..], &pdu[..]);
    }

    #[test]
    fn test_mobile_identity_decode_any_type_octet() {
        // 5G-S-TMSI with spare high bits set, and an empty identity
        let mut buf = Bytes::from_static(&[0x00, 0x02, 0xfc, 0x01]);
        let identity = MobileIdentity::decode(&mut buf).unwrap();
        assert_eq!(identity.identity_type(), MobileIdentityType::FiveGSTmsi);

        let mut buf = Bytes::from_static(&[0x00, 0x00]);
        let identity = MobileIdentity::decode(&mut buf).unwrap();
        assert_eq!(identity.identity_type(), MobileIdentityType::NoIdentity);
    }

    #[test]
    fn test_deregistration_accept_has_no_body() {
        let buf = build_5gmm_message(&FiveGmmMessage::DeregistrationAcceptFromUe);
        assert_eq!(&buf[..], &[0x7e, 0x00, 0x46]);
        assert_eq!(decode_5gmm_message(&buf).unwrap(), FiveGmmMessage::DeregistrationAcceptFromUe);
    }

    #[test]
    fn test_decode_refuses_protected() {
        let pdu = [0x7e, 0x02, 0x11, 0x22, 0x33, 0x44, 0x05, 0x7e, 0x00, 0x45];
        assert_eq!(decode_5gmm_message(&pdu), Err(NasError::SecurityProtected(2)));
    }

    #[test]
    fn test_decode_unsupported_and_invalid() {
        assert_eq!(
            decode_5gmm_message(&[0x7e, 0x00, 0x41]),
            Err(NasError::UnsupportedMessageType(0x41))
        );
        assert_eq!(decode_5gmm_message(&[0x7e, 0x00, 0x01]), Err(NasError::InvalidMessageType(0x01)));
    }

    #[test]
    fn test_decode_truncated_identity() {
        let pdu = [0x7e, 0x00, 0x45, 0x01, 0x00, 0x05, 0x01];
        assert_eq!(
            decode_5gmm_message(&pdu),
            Err(NasError::BufferTooShort { expected: 5, actual: 1 })
        );
    }
}
