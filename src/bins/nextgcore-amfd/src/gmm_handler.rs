//! GMM Message Handlers
//!
//! Normalizes the IEs of an uplink Deregistration Request (UE originating).

use ogs_nas::fiveg::{AccessType, DeregistrationRequestFromUe};

use crate::error::ParseError;
use crate::metrics::{self, CounterSink};
use crate::nas_security::NasDecodeStatus;

/// De-registration type as seen by the procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregistrationType {
    /// UE is switching off, no accept is sent
    SwitchOff,
    Normal,
}

/// Access the UE de-registers from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregAccessType {
    ThreeGpp,
    NonThreeGpp,
    Both,
}

impl From<AccessType> for DeregAccessType {
    fn from(access_type: AccessType) -> Self {
        match access_type {
            AccessType::ThreeGppAccess => DeregAccessType::ThreeGpp,
            AccessType::Non3gppAccess => DeregAccessType::NonThreeGpp,
            AccessType::ThreeGppAndNon3gppAccess => DeregAccessType::Both,
        }
    }
}

/// Normalized Deregistration Request IEs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeregistrationIes {
    pub de_reg_type: DeregistrationType,
    pub access_type: DeregAccessType,
    /// ngKSI value, echoed as received
    pub ksi: u8,
}

/// Parse a Deregistration Request (UE originating)
///
/// Counts the request as UE initiated once it is known to be well formed.
pub fn parse_deregistration_request(
    amf_ue_ngap_id: u64,
    msg: &DeregistrationRequestFromUe,
    decode_status: &NasDecodeStatus,
    counters: &dyn CounterSink,
) -> Result<DeregistrationIes, ParseError> {
    let dt = &msg.de_registration_type;

    let access_type = AccessType::try_from(dt.access_type).map_err(|code| {
        log::error!("[amf_ue_ngap_id={}] Invalid access type [{}]", amf_ue_ngap_id, code);
        ParseError::InvalidAccessType(code)
    })?;

    let de_reg_type = if dt.switch_off {
        DeregistrationType::SwitchOff
    } else {
        DeregistrationType::Normal
    };

    log::debug!(
        "[amf_ue_ngap_id={}] Deregistration request: {:?} access={:?} ksi={} status={:?}",
        amf_ue_ngap_id,
        de_reg_type,
        access_type,
        msg.ngksi.value,
        decode_status
    );

    counters.increment(
        metrics::UE_DEREGISTRATION,
        1,
        &[(metrics::LABEL_AMF_CAUSE, metrics::CAUSE_UE_INITIATED)],
    );

    Ok(DeregistrationIes {
        de_reg_type,
        access_type: access_type.into(),
        ksi: msg.ngksi.value,
    })
}
