//! NAS Security Functions
//!
//! 5GS NAS security protection (TS 33.501 Section 6.4) for the null and
//! AES based algorithms. Keystream and MAC inputs follow TS 33.401
//! Annex B: `COUNT || BEARER || DIRECTION || 0...`.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use bytes::{BufMut, Bytes, BytesMut};
use cmac::{Cmac, Mac};
use thiserror::Error;

use ogs_nas::common::types::{KeySetIdentifier, ProtocolDiscriminator, SecurityHeaderType};
use ogs_nas::fiveg::{peek_security_header_type, FiveGsNasSecurityHeader, FIVEG_NAS_SECURITY_HEADER_LEN};
use ogs_nas::NasError;

use crate::context::{NasSecurityContext, OGS_KEY_LEN};

// ============================================================================
// Error Types
// ============================================================================

/// NAS security error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NasSecurityError {
    /// Message too short for security header
    #[error("Message too short for the NAS security header")]
    MessageTooShort,
    /// Empty payload after the security header
    #[error("Empty NAS payload")]
    EmptyPayload,
    /// Ciphered message received without a security context
    #[error("Ciphered NAS message without a security context")]
    NoSecurityContext,
    /// Ciphering algorithm not implemented
    #[error("Unsupported ciphering algorithm: {0}")]
    UnsupportedCipheringAlgorithm(u8),
    /// Integrity algorithm not implemented
    #[error("Unsupported integrity algorithm: {0}")]
    UnsupportedIntegrityAlgorithm(u8),
    /// Key material rejected by the cipher
    #[error("Invalid NAS key")]
    InvalidKey,
    /// Header could not be parsed
    #[error("NAS header: {0}")]
    Nas(#[from] NasError),
}

// ============================================================================
// Constants
// ============================================================================

/// NAS security MAC size
pub const NAS_SECURITY_MAC_SIZE: usize = 4;

/// Security direction
pub mod direction {
    pub const UPLINK: u8 = 0;
    pub const DOWNLINK: u8 = 1;
}

/// 5G NAS security algorithm identifiers (TS 33.501 Section 5.11.1)
pub mod algorithm {
    pub const NEA0: u8 = 0;
    pub const NEA1: u8 = 1;
    pub const NEA2: u8 = 2;
    pub const NEA3: u8 = 3;
    pub const NIA0: u8 = 0;
    pub const NIA1: u8 = 1;
    pub const NIA2: u8 = 2;
    pub const NIA3: u8 = 3;
}

const AES_BLOCK_SIZE: usize = 16;

pub fn encryption_algorithm_name(algo: u8) -> &'static str {
    match algo {
        algorithm::NEA0 => "NEA0",
        algorithm::NEA1 => "128-NEA1",
        algorithm::NEA2 => "128-NEA2",
        algorithm::NEA3 => "128-NEA3",
        _ => "unknown",
    }
}

pub fn integrity_algorithm_name(algo: u8) -> &'static str {
    match algo {
        algorithm::NIA0 => "NIA0",
        algorithm::NIA1 => "128-NIA1",
        algorithm::NIA2 => "128-NIA2",
        algorithm::NIA3 => "128-NIA3",
        _ => "unknown",
    }
}

// ============================================================================
// Security snapshot and decode status
// ============================================================================

/// Snapshot of the NAS security context used to protect one downlink
/// message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityData {
    pub ksi: KeySetIdentifier,
    pub dl_count: u32,
    pub selected_int_algorithm: u8,
    pub selected_enc_algorithm: u8,
    pub knas_int: [u8; OGS_KEY_LEN],
    pub knas_enc: [u8; OGS_KEY_LEN],
    pub access_type: u8,
    pub new_context: bool,
    pub integrity_protected: bool,
    pub ciphered: bool,
}

impl SecurityData {
    /// Take a snapshot; ciphering follows the selected 5G-EA
    pub fn from_context(sec: &NasSecurityContext, new_context: bool, integrity_protected: bool) -> Self {
        Self {
            ksi: sec.ksi,
            dl_count: sec.dl_count,
            selected_int_algorithm: sec.selected_int_algorithm,
            selected_enc_algorithm: sec.selected_enc_algorithm,
            knas_int: sec.knas_int,
            knas_enc: sec.knas_enc,
            access_type: sec.access_type,
            new_context,
            integrity_protected,
            ciphered: sec.selected_enc_algorithm != algorithm::NEA0,
        }
    }

    /// NAS sequence number, the low octet of the downlink COUNT
    pub fn sqn(&self) -> u8 {
        (self.dl_count & 0xff) as u8
    }
}

/// What the security layer learned about an uplink NAS message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NasDecodeStatus {
    pub integrity_protected_message: bool,
    pub ciphered_message: bool,
    pub mac_matched: bool,
    pub security_context_available: bool,
}

// ============================================================================
// NAS Security Functions
// ============================================================================

/// Protect a downlink plain 5GMM message with the snapshot's COUNT
pub fn nas_5gs_security_encode(sctx: &SecurityData, message: &[u8]) -> Result<Bytes, NasSecurityError> {
    nas_protect(sctx, sctx.dl_count, direction::DOWNLINK, message)
}

/// Build a security protected NAS message for an explicit COUNT and
/// direction
pub fn nas_protect(
    sctx: &SecurityData,
    count: u32,
    dir: u8,
    message: &[u8],
) -> Result<Bytes, NasSecurityError> {
    // Plain NAS message - no security
    if !sctx.integrity_protected && !sctx.ciphered {
        return Ok(Bytes::copy_from_slice(message));
    }

    let sequence_number = (count & 0xff) as u8;

    let mut payload = message.to_vec();
    if sctx.ciphered {
        nas_encrypt(sctx.selected_enc_algorithm, &sctx.knas_enc, count, sctx.access_type, dir, &mut payload)?;
    }

    let mut message_authentication_code = [0u8; NAS_SECURITY_MAC_SIZE];
    if sctx.integrity_protected {
        let mut mac_data = Vec::with_capacity(1 + payload.len());
        mac_data.push(sequence_number);
        mac_data.extend_from_slice(&payload);
        message_authentication_code = nas_mac_calculate(
            sctx.selected_int_algorithm,
            &sctx.knas_int,
            count,
            sctx.access_type,
            dir,
            &mac_data,
        )?;
    }

    let header = FiveGsNasSecurityHeader {
        extended_protocol_discriminator: ProtocolDiscriminator::FiveGsMobilityManagement as u8,
        security_header_type: SecurityHeaderType::for_protection(sctx.ciphered, sctx.new_context),
        message_authentication_code,
        sequence_number,
    };

    let mut buf = BytesMut::with_capacity(FIVEG_NAS_SECURITY_HEADER_LEN + payload.len());
    header.encode(&mut buf);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Verify and decipher an uplink 5GMM message
///
/// A MAC mismatch is reported through the status and `mac_failed`, not as
/// an error; the procedure layer decides what to do with it.
pub fn nas_5gs_security_decode(
    sec: Option<&mut NasSecurityContext>,
    message: &[u8],
) -> Result<(Bytes, NasDecodeStatus), NasSecurityError> {
    let security_header_type = peek_security_header_type(message)?;

    let mut status = NasDecodeStatus {
        security_context_available: sec.is_some(),
        ..Default::default()
    };

    if !security_header_type.is_protected() {
        return Ok((Bytes::copy_from_slice(message), status));
    }

    let mut buf = Bytes::copy_from_slice(message);
    let header = FiveGsNasSecurityHeader::decode(&mut buf).map_err(|_| NasSecurityError::MessageTooShort)?;
    let mut payload = buf;
    if payload.is_empty() {
        return Err(NasSecurityError::EmptyPayload);
    }

    status.integrity_protected_message = true;
    status.ciphered_message = security_header_type.is_ciphered();

    let Some(sec) = sec else {
        if status.ciphered_message {
            return Err(NasSecurityError::NoSecurityContext);
        }
        return Ok((payload, status));
    };

    // Reset counters for new security context
    if security_header_type.is_new_context() {
        sec.ul_count = 0;
    }

    // Update UL count based on sequence number
    let sqn = header.sequence_number;
    let current_sqn = (sec.ul_count & 0xff) as u8;
    if current_sqn > sqn {
        sec.ul_count = (((sec.ul_count & 0xffff00) + 0x100) | sqn as u32) & 0xffffff;
    } else {
        sec.ul_count = (sec.ul_count & 0xffff00) | sqn as u32;
    }

    let mut mac_data = Vec::with_capacity(1 + payload.len());
    mac_data.push(sqn);
    mac_data.extend_from_slice(&payload);
    let calculated_mac = nas_mac_calculate(
        sec.selected_int_algorithm,
        &sec.knas_int,
        sec.ul_count,
        sec.access_type,
        direction::UPLINK,
        &mac_data,
    )?;

    status.mac_matched = calculated_mac == header.message_authentication_code;
    if !status.mac_matched {
        log::warn!(
            "NAS MAC verification failed: expected {:02x?}, got {:02x?}",
            calculated_mac,
            header.message_authentication_code
        );
        sec.mac_failed = true;
    }

    if status.ciphered_message {
        let mut deciphered = payload.to_vec();
        nas_encrypt(
            sec.selected_enc_algorithm,
            &sec.knas_enc,
            sec.ul_count,
            sec.access_type,
            direction::UPLINK,
            &mut deciphered,
        )?;
        payload = Bytes::from(deciphered);
    }

    Ok((payload, status))
}

// ============================================================================
// Crypto Helper Functions
// ============================================================================

/// NAS connection identifier used as BEARER (0 for 3GPP, 1 for non-3GPP)
fn nas_bearer(access_type: u8) -> u8 {
    match access_type {
        2 => 1,
        _ => 0,
    }
}

/// COUNT || BEARER || DIRECTION || 0^26
fn nas_crypto_prefix(count: u32, access_type: u8, dir: u8) -> [u8; 8] {
    let mut prefix = [0u8; 8];
    prefix[0..4].copy_from_slice(&count.to_be_bytes());
    prefix[4] = (nas_bearer(access_type) << 3) | ((dir & 0x01) << 2);
    prefix
}

fn ctr128_inc(counter: &mut [u8; 16]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

fn aes_ctr128_apply(key: &[u8; OGS_KEY_LEN], mut ivec: [u8; 16], data: &mut [u8]) {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
        let mut keystream = GenericArray::clone_from_slice(&ivec);
        cipher.encrypt_block(&mut keystream);
        ctr128_inc(&mut ivec);
        for (b, k) in chunk.iter_mut().zip(keystream.iter()) {
            *b ^= k;
        }
    }
}

fn aes_cmac(key: &[u8; OGS_KEY_LEN], msg: &[u8]) -> Result<[u8; 16], NasSecurityError> {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key).map_err(|_| NasSecurityError::InvalidKey)?;
    mac.update(msg);
    let mut cmac = [0u8; 16];
    cmac.copy_from_slice(&mac.finalize().into_bytes());
    Ok(cmac)
}

/// Encrypt/decrypt NAS message in place
pub fn nas_encrypt(
    algo: u8,
    key: &[u8; OGS_KEY_LEN],
    count: u32,
    access_type: u8,
    dir: u8,
    message: &mut [u8],
) -> Result<(), NasSecurityError> {
    match algo {
        algorithm::NEA0 => Ok(()),
        algorithm::NEA2 => {
            let mut ivec = [0u8; 16];
            ivec[..8].copy_from_slice(&nas_crypto_prefix(count, access_type, dir));
            aes_ctr128_apply(key, ivec, message);
            Ok(())
        }
        other => Err(NasSecurityError::UnsupportedCipheringAlgorithm(other)),
    }
}

/// Calculate NAS MAC (Message Authentication Code)
pub fn nas_mac_calculate(
    algo: u8,
    key: &[u8; OGS_KEY_LEN],
    count: u32,
    access_type: u8,
    dir: u8,
    message: &[u8],
) -> Result<[u8; NAS_SECURITY_MAC_SIZE], NasSecurityError> {
    match algo {
        algorithm::NIA0 => Ok([0u8; NAS_SECURITY_MAC_SIZE]),
        algorithm::NIA2 => {
            let mut input = Vec::with_capacity(8 + message.len());
            input.extend_from_slice(&nas_crypto_prefix(count, access_type, dir));
            input.extend_from_slice(message);

            let mac_full = aes_cmac(key, &input)?;
            let mut mac = [0u8; NAS_SECURITY_MAC_SIZE];
            mac.copy_from_slice(&mac_full[..NAS_SECURITY_MAC_SIZE]);
            Ok(mac)
        }
        other => Err(NasSecurityError::UnsupportedIntegrityAlgorithm(other)),
    }
}

// ============================================================================
// Tests
// ============================================================================
